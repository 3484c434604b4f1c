use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use circuit::Evaluator;
use log::warn;
use ndarray::ArrayView1;

use crate::{convention::OutputConvention, error::EvalFault};

/// Why a shard stopped before finishing.
#[derive(Debug)]
pub(super) enum Fault {
    Eval(EvalFault),
    Timeout,
    /// Another shard of the same batch already failed.
    Aborted,
}

/// The shared, read-only view every shard of a batch has of the evaluator.
///
/// It turns raw evaluator outputs into validated probabilities, retries failed calls a
/// bounded amount of times, and checks the batch deadline and the abort flag before every
/// call.
pub(super) struct Probe<'a, E: ?Sized> {
    evaluator: &'a E,
    convention: OutputConvention,
    retries: usize,
    deadline: Option<Instant>,
    abort: &'a AtomicBool,
}

impl<'a, E: Evaluator + ?Sized> Probe<'a, E> {
    pub fn new(
        evaluator: &'a E,
        convention: OutputConvention,
        retries: usize,
        deadline: Option<Instant>,
        abort: &'a AtomicBool,
    ) -> Self {
        Self {
            evaluator,
            convention,
            retries,
            deadline,
            abort,
        }
    }

    /// Evaluates an edge and returns its output on the `[0, 1]` scale.
    pub fn value(&self, features: ArrayView1<'_, f64>, params: &[f64]) -> Result<f64, Fault> {
        let mut attempt = 0;

        loop {
            self.checkpoint()?;

            let fault = match self.evaluator.evaluate(features, params) {
                Ok(raw) => match self.convention.to_probability(raw) {
                    Ok(value) => return Ok(value),
                    Err(fault) => fault,
                },
                Err(e) => EvalFault::Backend(e),
            };

            if attempt == self.retries {
                return Err(Fault::Eval(fault));
            }

            attempt += 1;
            warn!(attempt = attempt, retries = self.retries; "retrying evaluator: {fault}");
        }
    }

    fn checkpoint(&self) -> Result<(), Fault> {
        if self.abort.load(Ordering::Relaxed) {
            return Err(Fault::Aborted);
        }

        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Fault::Timeout);
        }

        Ok(())
    }
}
