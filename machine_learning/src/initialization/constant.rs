use super::ParamGen;
use crate::angle::wrap_angle;

/// A parameter generator that always generates the same angle.
pub struct ConstParamGen {
    value: f64,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `value` - The angle to always generate, reduced modulo `2π`.
    ///
    /// # Returns
    /// A new `ConstParamGen` instance.
    pub fn new(value: f64) -> Self {
        Self {
            value: wrap_angle(value),
        }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Vec<f64> {
        vec![self.value; n]
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use super::*;

    #[test]
    fn exact() {
        let mut param_gen = ConstParamGen::new(1.);
        assert_eq!(param_gen.sample(11), vec![1.; 11]);
    }

    #[test]
    fn wrapped() {
        let mut param_gen = ConstParamGen::new(TAU);
        assert_eq!(param_gen.sample(2), vec![0.; 2]);
    }
}
