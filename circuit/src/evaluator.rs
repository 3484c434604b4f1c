use ndarray::ArrayView1;

use crate::Result;

/// An opaque scalar function of an edge's encoded features and the shared parameters.
///
/// Implementations are called concurrently from every shard of a batch, so each call
/// must be independent of the others. Whether the returned value is a probability in
/// `[0, 1]` or an expectation value in `[-1, 1]` is a property of the backend that the
/// caller has to configure, the trait makes no assumption about it.
pub trait Evaluator: Send + Sync {
    /// Evaluates the circuit for a single edge.
    ///
    /// # Arguments
    /// * `features` - The angle-encoded features of the edge.
    /// * `params` - A full snapshot of the learnable angles.
    ///
    /// # Returns
    /// The scalar readout of the circuit or an `EvalErr` if the backend failed.
    fn evaluate(&self, features: ArrayView1<'_, f64>, params: &[f64]) -> Result<f64>;

    /// The amount of learnable angles this evaluator expects, if it is fixed.
    fn num_params(&self) -> Option<usize> {
        None
    }
}
