use std::{num::NonZeroUsize, time::Instant};

use circuit::Evaluator;
use log::{debug, info};
use rand::{rngs::StdRng, seq::SliceRandom};

use super::{Recorder, TrainingEvent, UpdateRule};
use crate::{
    MlErr, Result,
    balance::ClassWeights,
    dataset::EdgeBatch,
    execution::{BatchAggregator, BatchGradient, BatchScore},
    optimization::Optimizer,
};

/// Drives a training run: it owns the angles and the optimizer state, dispatches every batch to
/// the aggregator and steps the optimizer strictly between batches.
pub struct Trainer<E, O, R> {
    evaluator: E,
    optimizer: O,
    recorder: R,
    aggregator: BatchAggregator,
    params: Vec<f64>,
    update_rule: UpdateRule,
    epochs: NonZeroUsize,
    validate_every: Option<NonZeroUsize>,
    rng: StdRng,
}

impl<E, O, R> Trainer<E, O, R>
where
    E: Evaluator,
    O: Optimizer,
    R: Recorder,
{
    /// Creates a new `Trainer` that runs a single epoch with the error-scaled update rule and
    /// no validation.
    ///
    /// # Arguments
    /// * `evaluator` - The circuit backend.
    /// * `optimizer` - The update strategy, its state lives as long as the trainer.
    /// * `recorder` - The sink of every `TrainingEvent`.
    /// * `aggregator` - Runs each batch in parallel.
    /// * `params` - The initial angles.
    /// * `rng` - Shuffles the batch order every epoch.
    pub fn new(
        evaluator: E,
        optimizer: O,
        recorder: R,
        aggregator: BatchAggregator,
        params: Vec<f64>,
        rng: StdRng,
    ) -> Self {
        Self {
            evaluator,
            optimizer,
            recorder,
            aggregator,
            params,
            update_rule: UpdateRule::default(),
            epochs: NonZeroUsize::MIN,
            validate_every: None,
            rng,
        }
    }

    pub fn with_update_rule(mut self, update_rule: UpdateRule) -> Self {
        self.update_rule = update_rule;
        self
    }

    pub fn with_epochs(mut self, epochs: NonZeroUsize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Scores the validation set every `every` batches of an epoch.
    pub fn with_validation(mut self, every: NonZeroUsize) -> Self {
        self.validate_every = Some(every);
        self
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn into_params(self) -> Vec<f64> {
        self.params
    }

    /// Trains over `train` for every configured epoch, shuffling the batch order each time.
    ///
    /// If `valid` isn't empty it's scored once before training and then as often as configured.
    ///
    /// # Returns
    /// The mean batch loss of every epoch, or the first batch failure, which aborts the run.
    pub fn fit(&mut self, train: &[EdgeBatch], valid: &[EdgeBatch]) -> Result<Vec<f64>> {
        if train.is_empty() {
            return Err(MlErr::EmptyBatch);
        }

        if !valid.is_empty() {
            self.validation_event(0, 0, valid)?;
        }

        let mut order: Vec<_> = (0..train.len()).collect();
        let mut losses = Vec::with_capacity(self.epochs.get());

        info!(epochs = self.epochs.get(), batches = train.len(); "training is starting");

        for epoch in 0..self.epochs.get() {
            order.shuffle(&mut self.rng);
            let mut total = 0.;

            for (batch, &idx) in order.iter().enumerate() {
                let out = self.step(epoch, batch, &train[idx])?;
                total += out.loss;

                let step = batch + 1;
                let due = self.validate_every.is_some_and(|every| step % every == 0);
                if due && !valid.is_empty() {
                    self.validation_event(epoch, step, valid)?;
                }
            }

            let mean_loss = total / train.len() as f64;
            info!(epoch = epoch + 1, mean_loss = mean_loss; "epoch completed");

            self.recorder
                .record(&TrainingEvent::EpochCompleted { epoch, mean_loss });
            losses.push(mean_loss);
        }

        info!("training completed");
        Ok(losses)
    }

    /// Runs a single batch and steps the optimizer with its result.
    ///
    /// # Arguments
    /// * `epoch` - The current epoch, only used for reporting.
    /// * `batch` - The position of the batch in this epoch, used for reporting and failures.
    /// * `data` - The batch, which must contain both classes.
    ///
    /// # Returns
    /// The batch's averaged result. On failure the angles and the optimizer state are untouched.
    pub fn step(&mut self, epoch: usize, batch: usize, data: &EdgeBatch) -> Result<BatchGradient> {
        self.recorder
            .record(&TrainingEvent::BatchStarted { epoch, batch });

        let start = Instant::now();
        let weights = ClassWeights::balanced(data.labels())?;
        debug!(batch = batch, w0 = weights.as_array()[0], w1 = weights.as_array()[1]; "class weights");

        let out = self
            .aggregator
            .run(&self.evaluator, batch, data, &self.params, &weights)?;

        let direction = match self.update_rule {
            UpdateRule::Gradient => &out.gradient,
            UpdateRule::ErrorScaled => &out.update,
        };

        self.optimizer.update_params(direction, &mut self.params)?;
        let elapsed = start.elapsed();

        info!(
            epoch = epoch + 1,
            batch = batch + 1,
            loss = out.loss,
            elapsed_ms = elapsed.as_millis() as u64;
            "batch completed"
        );

        self.recorder.record(&TrainingEvent::Params {
            epoch,
            batch,
            params: self.params.clone(),
        });

        self.recorder.record(&TrainingEvent::BatchCompleted {
            epoch,
            batch,
            loss: out.loss,
            gradient: direction.clone(),
            elapsed,
        });

        Ok(out)
    }

    /// Scores every batch of `batches` with the current angles.
    ///
    /// Batches holding a single class are weighted uniformly.
    ///
    /// # Returns
    /// The score of the union of the batches.
    pub fn validate(&self, batches: &[EdgeBatch]) -> Result<BatchScore> {
        let mut total = BatchScore {
            loss: 0.,
            accuracy: 0.,
            samples: 0,
        };

        for (i, batch) in batches.iter().enumerate() {
            let weights = match ClassWeights::balanced(batch.labels()) {
                Ok(weights) => weights,
                Err(MlErr::DegenerateBatch { .. }) => ClassWeights::uniform(),
                Err(e) => return Err(e),
            };

            let score = self
                .aggregator
                .score(&self.evaluator, i, batch, &self.params, &weights)?;
            total = total.merge(score);
        }

        Ok(total)
    }

    fn validation_event(&mut self, epoch: usize, step: usize, valid: &[EdgeBatch]) -> Result<()> {
        let score = self.validate(valid)?;
        info!(loss = score.loss, accuracy = score.accuracy; "validation");

        self.recorder
            .record(&TrainingEvent::Validation { epoch, step, score });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        f64::consts::TAU,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use ndarray::{Array2, ArrayView1};
    use rand::SeedableRng;

    use super::*;
    use crate::{convention::OutputConvention, optimization::GradientDescent};

    /// `0.5 + 0.5 * sin(θ)` for real edges (`x[0] == 1`) and its mirror for fake ones, so
    /// both classes are fit best at `θ = π/2`.
    struct Mirror;

    impl Evaluator for Mirror {
        fn evaluate(&self, x: ArrayView1<'_, f64>, params: &[f64]) -> circuit::Result<f64> {
            let sign = 2. * x[0] - 1.;
            Ok(0.5 + 0.5 * sign * params[0].sin())
        }

        fn num_params(&self) -> Option<usize> {
            Some(1)
        }
    }

    /// Fails every call after the first `ok` ones.
    struct Breaks {
        ok: usize,
        calls: AtomicUsize,
    }

    impl Evaluator for Breaks {
        fn evaluate(&self, _: ArrayView1<'_, f64>, _: &[f64]) -> circuit::Result<f64> {
            if self.calls.fetch_add(1, Ordering::Relaxed) >= self.ok {
                return Err(circuit::EvalErr::Backend("lost connection".into()));
            }
            Ok(0.5)
        }
    }

    fn batch(xs: &[f64]) -> EdgeBatch {
        let rows: Vec<[f64; 6]> = xs.iter().map(|&x| [x, 0., 0., 0., 0., 0.]).collect();
        let labels = xs.iter().map(|&x| x as u8).collect();
        EdgeBatch::new(Array2::from(rows), labels).unwrap()
    }

    fn aggregator() -> BatchAggregator {
        BatchAggregator::new(
            NonZeroUsize::new(2).unwrap(),
            NonZeroUsize::new(2),
            OutputConvention::Probability,
        )
        .unwrap()
    }

    fn trainer<E: Evaluator>(
        evaluator: E,
        theta: f64,
    ) -> Trainer<E, GradientDescent, Vec<TrainingEvent>> {
        Trainer::new(
            evaluator,
            GradientDescent::new(0.5),
            Vec::new(),
            aggregator(),
            vec![theta],
            StdRng::seed_from_u64(0),
        )
    }

    #[test]
    fn loss_decreases_while_training() {
        let train = vec![batch(&[1., 0., 0.]), batch(&[0., 1.]), batch(&[1., 1., 0.])];
        let mut trainer = trainer(Mirror, 0.3).with_epochs(NonZeroUsize::new(5).unwrap());

        let losses = trainer.fit(&train, &[]).unwrap();

        assert_eq!(losses.len(), 5);
        assert!(losses.windows(2).all(|w| w[1] <= w[0]), "{losses:?}");
        // Moves toward π/2 from below.
        assert!((1. ..std::f64::consts::FRAC_PI_2).contains(&trainer.params()[0]));
    }

    #[test]
    fn params_stay_wrapped() {
        let train = vec![batch(&[1., 0.])];
        let mut trainer = Trainer::new(
            Mirror,
            GradientDescent::new(50.),
            Vec::new(),
            aggregator(),
            vec![6.2],
            StdRng::seed_from_u64(1),
        )
        .with_epochs(NonZeroUsize::new(10).unwrap());

        trainer.fit(&train, &[]).unwrap();

        for event in trainer.recorder() {
            if let TrainingEvent::Params { params, .. } = event {
                assert!(params.iter().all(|x| (0. ..TAU).contains(x)), "{params:?}");
            }
        }
    }

    #[test]
    fn emits_events_in_order() {
        let train = vec![batch(&[1., 0.]), batch(&[0., 1.])];
        let valid = vec![batch(&[1., 0.])];
        let mut trainer = trainer(Mirror, 1.).with_validation(NonZeroUsize::new(2).unwrap());

        trainer.fit(&train, &valid).unwrap();

        let kinds: Vec<_> = trainer
            .recorder()
            .iter()
            .map(|event| match event {
                TrainingEvent::BatchStarted { .. } => "started",
                TrainingEvent::Params { .. } => "params",
                TrainingEvent::BatchCompleted { .. } => "completed",
                TrainingEvent::Validation { .. } => "validation",
                TrainingEvent::EpochCompleted { .. } => "epoch",
            })
            .collect();

        assert_eq!(
            kinds,
            [
                "validation",
                "started",
                "params",
                "completed",
                "started",
                "params",
                "completed",
                "validation",
                "epoch",
            ]
        );
    }

    #[test]
    fn update_rule_selects_the_direction() {
        // At θ = 0 both outputs are 0.5, the output gradient is ±0.5 and the errors are ∓0.5.
        let data = batch(&[1., 0.]);

        let mut by_gradient = trainer(Mirror, 0.).with_update_rule(UpdateRule::Gradient);
        let out = by_gradient.step(0, 0, &data).unwrap();
        assert!(out.gradient[0].abs() < 1e-12);

        let mut by_error = trainer(Mirror, 0.).with_update_rule(UpdateRule::ErrorScaled);
        let out = by_error.step(0, 0, &data).unwrap();
        assert!((out.update[0] + 0.5).abs() < 1e-12);
        assert!((by_error.params()[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn degenerate_batch_aborts_before_dispatch() {
        let mut trainer = trainer(Mirror, 1.);
        let err = trainer.step(0, 0, &batch(&[1., 1.])).unwrap_err();

        assert!(matches!(err, MlErr::DegenerateBatch { class: 0 }));
        assert_eq!(trainer.params(), [1.]);
    }

    #[test]
    fn failed_batch_leaves_params_untouched() {
        let evaluator = Breaks {
            ok: 4,
            calls: AtomicUsize::new(0),
        };
        let mut trainer = Trainer::new(
            evaluator,
            GradientDescent::new(0.1),
            Vec::new(),
            aggregator(),
            vec![0.5; 3],
            StdRng::seed_from_u64(0),
        );

        let err = trainer.fit(&[batch(&[1., 0.])], &[]).unwrap_err();

        assert!(matches!(err, MlErr::EvaluatorFailure { batch: 0, .. }));
        assert_eq!(trainer.params(), [0.5; 3]);
        assert!(
            !trainer
                .recorder()
                .iter()
                .any(|e| matches!(e, TrainingEvent::BatchCompleted { .. }))
        );
    }

    #[test]
    fn validation_tolerates_single_class_batches() {
        let trainer = trainer(Mirror, std::f64::consts::FRAC_PI_2);
        let score = trainer.validate(&[batch(&[1., 1.]), batch(&[0.])]).unwrap();

        assert_eq!(score.samples, 3);
        assert!((score.accuracy - 1.).abs() < 1e-12);
        assert!(score.loss < 1e-12);
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let mut trainer = trainer(Mirror, 0.);
        assert!(matches!(trainer.fit(&[], &[]), Err(MlErr::EmptyBatch)));
    }
}
