/// A `ParamGen` generates the initial state of the learnable angles.
pub trait ParamGen {
    /// Samples `n` angles, all of them in `[0, 2π)`.
    ///
    /// # Arguments
    /// * `n` - The amount of angles to generate.
    fn sample(&mut self, n: usize) -> Vec<f64>;
}
