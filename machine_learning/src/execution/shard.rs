use circuit::Evaluator;
use ndarray::ArrayView2;

use super::probe::{Fault, Probe};
use crate::{balance::ClassWeights, gradient::parameter_shift};

/// A fault together with the shard-local index of the sample that caused it.
pub(super) type ShardFault = (usize, Fault);

/// One sample's class-weighted contribution to a backward pass.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct GradientTerm {
    pub loss: f64,
    pub gradient: Vec<f64>,
    pub update: Vec<f64>,
}

/// One sample's class-weighted contribution to a forward pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct ScoreTerm {
    pub loss: f64,
    pub correct: bool,
}

/// Computes the class-weighted squared error, its parameter-shift gradient and the
/// error-scaled update of every sample of a shard, in order.
///
/// The terms are returned unsummed so the caller can add them in global sample order, which
/// keeps the batch result independent of how the batch was split.
///
/// `params` is the shard's own copy of the parameter snapshot, shifted in place while
/// estimating each sample's gradient.
pub(super) fn backward<E: Evaluator + ?Sized>(
    probe: &Probe<'_, E>,
    features: ArrayView2<'_, f64>,
    labels: &[u8],
    weights: ClassWeights,
    mut params: Vec<f64>,
) -> Result<Vec<GradientTerm>, ShardFault> {
    let weights = weights.as_array();
    let mut terms = Vec::with_capacity(labels.len());

    for (i, (x, &y)) in features.rows().into_iter().zip(labels).enumerate() {
        let w = weights[usize::from(y)];

        let out = probe.value(x, &params).map_err(|fault| (i, fault))?;
        let error = out - f64::from(y);

        let grad = parameter_shift(|p| probe.value(x, p), &mut params).map_err(|fault| (i, fault))?;
        let gradient: Vec<f64> = grad.into_iter().map(|g| g * w).collect();
        let update = gradient.iter().map(|g| 2. * error * g).collect();

        terms.push(GradientTerm {
            loss: error.powi(2) * w,
            gradient,
            update,
        });
    }

    Ok(terms)
}

/// Computes the class-weighted squared error and whether the prediction is right for every
/// sample of a shard, an output of at least `0.5` predicts a real edge.
pub(super) fn forward<E: Evaluator + ?Sized>(
    probe: &Probe<'_, E>,
    features: ArrayView2<'_, f64>,
    labels: &[u8],
    weights: ClassWeights,
    params: &[f64],
) -> Result<Vec<ScoreTerm>, ShardFault> {
    let weights = weights.as_array();

    features
        .rows()
        .into_iter()
        .zip(labels)
        .enumerate()
        .map(|(i, (x, &y))| {
            let out = probe.value(x, params).map_err(|fault| (i, fault))?;

            Ok(ScoreTerm {
                loss: (out - f64::from(y)).powi(2) * weights[usize::from(y)],
                correct: u8::from(out >= 0.5) == y,
            })
        })
        .collect()
}
