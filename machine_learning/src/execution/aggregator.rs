use std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use circuit::Evaluator;
use log::debug;
use ndarray::ArrayView2;
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use super::{
    partition::shard_ranges,
    probe::{Fault, Probe},
    shard::{self, ShardFault},
};
use crate::{
    MlErr, Result,
    balance::{ClassWeights, validate_labels},
    convention::OutputConvention,
    dataset::EdgeBatch,
};

/// The averaged result of a batch's backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGradient {
    /// The class-weighted mean squared error.
    pub loss: f64,
    /// The class-weighted mean parameter-shift gradient of the output.
    pub gradient: Vec<f64>,
    /// The class-weighted mean of `2 * error * gradient`, the gradient of the loss itself.
    pub update: Vec<f64>,
    pub samples: usize,
}

/// The averaged result of a batch's forward pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchScore {
    /// The class-weighted mean squared error.
    pub loss: f64,
    /// The fraction of correctly classified edges.
    pub accuracy: f64,
    pub samples: usize,
}

impl BatchScore {
    /// Combines two scores into the score of the union of their samples.
    pub fn merge(self, other: Self) -> Self {
        let samples = self.samples + other.samples;
        if samples == 0 {
            return self;
        }

        let n = samples as f64;
        let (a, b) = (self.samples as f64, other.samples as f64);

        Self {
            loss: (self.loss * a + other.loss * b) / n,
            accuracy: (self.accuracy * a + other.accuracy * b) / n,
            samples,
        }
    }
}

/// How a shard ended, before the reduction decides what the batch reports.
enum ShardErr {
    Failed(MlErr),
    Aborted,
}

/// Evaluates batches of edges across a fixed amount of parallel shards.
///
/// Each batch is split into `workers` contiguous shards that run on a thread pool which is
/// reused for the whole training run. Shards own a copy of the parameter snapshot and return
/// their per-sample terms by value; the caller blocks until every shard has joined and only
/// then adds them up in sample order, so the result is bitwise the same for any amount of
/// workers. If any shard fails, the whole batch fails and every term is dropped.
pub struct BatchAggregator {
    pool: ThreadPool,
    workers: NonZeroUsize,
    convention: OutputConvention,
    eval_retries: usize,
    timeout: Option<Duration>,
}

impl BatchAggregator {
    /// Creates a new `BatchAggregator`.
    ///
    /// # Arguments
    /// * `workers` - The amount of shards every batch is split into.
    /// * `threads` - The size of the thread pool, defaults to the amount of logical CPUs.
    /// * `convention` - The output range convention of the evaluators this aggregator will run.
    ///
    /// # Returns
    /// A new `BatchAggregator` or an `MlErr::ThreadPool` if the pool couldn't be built.
    pub fn new(
        workers: NonZeroUsize,
        threads: Option<NonZeroUsize>,
        convention: OutputConvention,
    ) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.map_or(0, NonZeroUsize::get))
            .thread_name(|i| format!("shard-worker-{i}"))
            .build()
            .map_err(|e| MlErr::ThreadPool(e.to_string()))?;

        Ok(Self {
            pool,
            workers,
            convention,
            eval_retries: 0,
            timeout: None,
        })
    }

    /// Retries each failed evaluator call up to `retries` times before failing the batch.
    pub fn with_eval_retries(mut self, retries: usize) -> Self {
        self.eval_retries = retries;
        self
    }

    /// Fails any batch that takes longer than `limit`.
    ///
    /// The limit is checked before every evaluator call, so a single call that hangs is not
    /// interrupted.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    pub fn convention(&self) -> OutputConvention {
        self.convention
    }

    /// Computes the batch's average loss, gradient and update.
    ///
    /// # Arguments
    /// * `evaluator` - The circuit backend.
    /// * `batch_idx` - The index of the batch, used to report failures.
    /// * `batch` - The edges and their labels.
    /// * `params` - The current parameters, copied into every shard.
    /// * `weights` - The class weights of this batch.
    ///
    /// # Returns
    /// The averaged `BatchGradient`, or the first failure in shard order.
    pub fn run<E: Evaluator + ?Sized>(
        &self,
        evaluator: &E,
        batch_idx: usize,
        batch: &EdgeBatch,
        params: &[f64],
        weights: &ClassWeights,
    ) -> Result<BatchGradient> {
        check_params(evaluator, params)?;

        let weights = *weights;
        let partials = self.dispatch(evaluator, batch_idx, batch, |probe, features, labels| {
            shard::backward(probe, features, labels, weights, params.to_vec())
        })?;

        let n = batch.len() as f64;
        let mut loss = 0.;
        let mut gradient = vec![0.; params.len()];
        let mut update = vec![0.; params.len()];

        // Shards come back in order, so this sums the samples in batch order for any amount
        // of workers.
        for term in partials.into_iter().flatten() {
            loss += term.loss;
            add_assign(&mut gradient, &term.gradient);
            add_assign(&mut update, &term.update);
        }

        gradient.iter_mut().chain(&mut update).for_each(|x| *x /= n);

        Ok(BatchGradient {
            loss: loss / n,
            gradient,
            update,
            samples: batch.len(),
        })
    }

    /// Computes the batch's average loss and accuracy without estimating any gradient.
    ///
    /// # Arguments
    /// * `evaluator` - The circuit backend.
    /// * `batch_idx` - The index of the batch, used to report failures.
    /// * `batch` - The edges and their labels.
    /// * `params` - The current parameters, shared read-only by every shard.
    /// * `weights` - The class weights of this batch.
    pub fn score<E: Evaluator + ?Sized>(
        &self,
        evaluator: &E,
        batch_idx: usize,
        batch: &EdgeBatch,
        params: &[f64],
        weights: &ClassWeights,
    ) -> Result<BatchScore> {
        check_params(evaluator, params)?;

        let weights = *weights;
        let partials = self.dispatch(evaluator, batch_idx, batch, |probe, features, labels| {
            shard::forward(probe, features, labels, weights, params)
        })?;

        let (loss, correct) = partials
            .into_iter()
            .flatten()
            .fold((0., 0), |(loss, correct), term| {
                (loss + term.loss, correct + usize::from(term.correct))
            });

        let n = batch.len() as f64;
        Ok(BatchScore {
            loss: loss / n,
            accuracy: correct as f64 / n,
            samples: batch.len(),
        })
    }

    /// Runs `job` on every shard of `batch` and gathers the results in shard order.
    fn dispatch<E, T, F>(
        &self,
        evaluator: &E,
        batch_idx: usize,
        batch: &EdgeBatch,
        job: F,
    ) -> Result<Vec<T>>
    where
        E: Evaluator + ?Sized,
        T: Send,
        F: Fn(&Probe<'_, E>, ArrayView2<'_, f64>, &[u8]) -> std::result::Result<T, ShardFault>
            + Sync,
    {
        if batch.is_empty() {
            return Err(MlErr::EmptyBatch);
        }

        validate_labels(batch.labels())?;

        let abort = AtomicBool::new(false);
        let deadline = self.timeout.map(|limit| Instant::now() + limit);
        let probe = Probe::new(
            evaluator,
            self.convention,
            self.eval_retries,
            deadline,
            &abort,
        );

        let ranges = shard_ranges(batch.len(), self.workers);

        let outcomes: Vec<std::result::Result<T, ShardErr>> = self.pool.install(|| {
            ranges
                .into_par_iter()
                .enumerate()
                .map(|(shard, range)| {
                    let offset = range.start;
                    let (features, labels) = batch.slice(range);
                    debug!(batch = batch_idx, shard = shard, samples = labels.len(); "shard started");

                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| job(&probe, features, labels)));

                    let outcome = match outcome {
                        Ok(Ok(sums)) => Ok(sums),
                        Ok(Err((_, Fault::Aborted))) => Err(ShardErr::Aborted),
                        Ok(Err((sample, Fault::Timeout))) => {
                            debug!(batch = batch_idx, shard = shard, sample = offset + sample; "shard timed out");
                            Err(ShardErr::Failed(MlErr::Timeout {
                                batch: batch_idx,
                                shard,
                                limit: self.timeout.unwrap_or_default(),
                            }))
                        }
                        Ok(Err((sample, Fault::Eval(cause)))) => {
                            Err(ShardErr::Failed(MlErr::EvaluatorFailure {
                                batch: batch_idx,
                                shard,
                                sample: offset + sample,
                                cause,
                            }))
                        }
                        Err(payload) => Err(ShardErr::Failed(MlErr::WorkerFailure {
                            batch: batch_idx,
                            shard,
                            cause: panic_message(payload.as_ref()),
                        })),
                    };

                    if outcome.is_err() {
                        abort.store(true, Ordering::Relaxed);
                    }

                    debug!(batch = batch_idx, shard = shard, ok = outcome.is_ok(); "shard joined");
                    outcome
                })
                .collect()
        });

        let mut partials = Vec::with_capacity(outcomes.len());
        let mut aborted = None;

        for (shard, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(sums) => partials.push(sums),
                Err(ShardErr::Failed(e)) => return Err(e),
                Err(ShardErr::Aborted) => {
                    aborted.get_or_insert(shard);
                }
            }
        }

        if let Some(shard) = aborted {
            return Err(MlErr::WorkerFailure {
                batch: batch_idx,
                shard,
                cause: "aborted without a reported cause".into(),
            });
        }

        Ok(partials)
    }
}

fn check_params<E: Evaluator + ?Sized>(evaluator: &E, params: &[f64]) -> Result<()> {
    match evaluator.num_params() {
        Some(expected) if expected != params.len() => Err(MlErr::SizeMismatch {
            what: "params",
            got: params.len(),
            expected,
        }),
        _ => Ok(()),
    }
}

fn add_assign(acc: &mut [f64], x: &[f64]) {
    acc.iter_mut().zip(x).for_each(|(a, b)| *a += b);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }

    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| "the shard panicked".into())
}
