use circuit::Evaluator;

use super::{Recorder, Trainer, TrainingConfig, config};
use crate::{
    MlErr, Result, angle::wrap_all, execution::BatchAggregator, optimization::Optimizer,
};

/// Builds `Trainer`s given a `TrainingConfig`.
pub struct TrainerBuilder<'a> {
    config: &'a TrainingConfig,
    params: Option<Vec<f64>>,
}

impl<'a> TrainerBuilder<'a> {
    /// Creates a new `TrainerBuilder`.
    ///
    /// # Arguments
    /// * `config` - The configuration of the training run.
    pub fn new(config: &'a TrainingConfig) -> Self {
        Self {
            config,
            params: None,
        }
    }

    /// Starts from the given angles instead of drawing them from the configured initializer.
    pub fn with_params(mut self, params: Vec<f64>) -> Self {
        self.params = Some(params);
        self
    }

    /// Builds a new `Trainer` following the configuration.
    ///
    /// # Arguments
    /// * `evaluator` - The circuit backend.
    /// * `recorder` - The sink of every training event.
    ///
    /// # Returns
    /// The trainer, or an error if the configuration is invalid, the amount of angles can't be
    /// determined or the thread pool couldn't be built.
    pub fn build<E, R>(
        self,
        evaluator: E,
        recorder: R,
    ) -> Result<Trainer<E, Box<dyn Optimizer + Send>, R>>
    where
        E: Evaluator,
        R: Recorder,
    {
        let config = self.config;

        let params = match self.params {
            Some(mut params) => {
                match evaluator.num_params() {
                    Some(expected) if expected != params.len() => {
                        return Err(MlErr::SizeMismatch {
                            what: "params",
                            got: params.len(),
                            expected,
                        });
                    }
                    _ => {}
                }

                wrap_all(&mut params);
                params
            }
            None => {
                let n = evaluator.num_params().ok_or_else(|| {
                    MlErr::InvalidConfig(
                        "the evaluator doesn't report its amount of parameters".into(),
                    )
                })?;

                config.init.sample(n, config.seed)?
            }
        };

        let optimizer = config.optimizer.build(params.len())?;

        let mut aggregator = BatchAggregator::new(config.workers, config.threads, config.convention)?
            .with_eval_retries(config.eval_retries);
        if let Some(limit) = config.batch_timeout() {
            aggregator = aggregator.with_timeout(limit);
        }

        // Shuffling must not replay the initializer's draws.
        let rng = config::rng(config.seed.map(|seed| seed.wrapping_add(1)));

        let mut trainer = Trainer::new(evaluator, optimizer, recorder, aggregator, params, rng)
            .with_update_rule(config.update_rule)
            .with_epochs(config.epochs);
        if let Some(every) = config.validate_every {
            trainer = trainer.with_validation(every);
        }

        Ok(trainer)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use ndarray::ArrayView1;

    use super::*;
    use crate::training::InitConfig;

    struct Fixed(usize);

    impl Evaluator for Fixed {
        fn evaluate(&self, _: ArrayView1<'_, f64>, _: &[f64]) -> circuit::Result<f64> {
            Ok(0.5)
        }

        fn num_params(&self) -> Option<usize> {
            Some(self.0)
        }
    }

    struct Opaque;

    impl Evaluator for Opaque {
        fn evaluate(&self, _: ArrayView1<'_, f64>, _: &[f64]) -> circuit::Result<f64> {
            Ok(0.5)
        }
    }

    #[test]
    fn draws_params_for_the_evaluator() {
        let config = TrainingConfig {
            seed: Some(9),
            ..Default::default()
        };

        let trainer = TrainerBuilder::new(&config).build(Fixed(11), ()).unwrap();

        assert_eq!(trainer.params().len(), 11);
        assert!(trainer.params().iter().all(|x| (0. ..TAU).contains(x)));
    }

    #[test]
    fn explicit_params_are_wrapped() {
        let config = TrainingConfig::default();

        let trainer = TrainerBuilder::new(&config)
            .with_params(vec![TAU + 0.5, -0.5])
            .build(Opaque, ())
            .unwrap();

        assert!((trainer.params()[0] - 0.5).abs() < 1e-12);
        assert!((trainer.params()[1] - (TAU - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn explicit_params_must_fit_the_evaluator() {
        let config = TrainingConfig::default();

        let result = TrainerBuilder::new(&config)
            .with_params(vec![0.; 4])
            .build(Fixed(11), ());

        assert!(matches!(result, Err(MlErr::SizeMismatch { got: 4, expected: 11, .. })));
    }

    #[test]
    fn unknown_param_count_needs_explicit_params() {
        let config = TrainingConfig {
            init: InitConfig::Constant { value: 0. },
            ..Default::default()
        };

        let result = TrainerBuilder::new(&config).build(Opaque, ());
        assert!(matches!(result, Err(MlErr::InvalidConfig(_))));
    }
}
