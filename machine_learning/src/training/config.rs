use std::{num::NonZeroUsize, time::Duration};

use rand::{SeedableRng, rngs::StdRng};
use serde::Deserialize;

use crate::{
    MlErr, Result,
    convention::OutputConvention,
    initialization::{ConstParamGen, ParamGen, RandParamGen},
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
};

/// Which batch average drives the optimizer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    /// The class-weighted gradient of the circuit's output.
    Gradient,
    /// `2 * error * gradient`, the gradient of the squared error.
    #[default]
    ErrorScaled,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    GradientDescent {
        lr: f64,
    },
    Adam {
        #[serde(default = "defaults::lr")]
        lr: f64,
        #[serde(default = "defaults::b1")]
        b1: f64,
        #[serde(default = "defaults::b2")]
        b2: f64,
        #[serde(default = "defaults::eps")]
        eps: f64,
    },
    Momentum {
        lr: f64,
        mu: f64,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            lr: defaults::lr(),
            b1: defaults::b1(),
            b2: defaults::b2(),
            eps: defaults::eps(),
        }
    }
}

impl OptimizerConfig {
    /// Builds the optimizer for `len` angles.
    ///
    /// # Returns
    /// The optimizer, or an `MlErr::InvalidConfig` if any coefficient is out of its range.
    pub fn build(&self, len: usize) -> Result<Box<dyn Optimizer + Send>> {
        let optimizer: Box<dyn Optimizer + Send> = match *self {
            Self::GradientDescent { lr } => {
                check_lr(lr)?;
                Box::new(GradientDescent::new(lr))
            }
            Self::Adam { lr, b1, b2, eps } => {
                check_lr(lr)?;
                check_decay("b1", b1)?;
                check_decay("b2", b2)?;
                if !(eps.is_finite() && eps > 0.) {
                    return Err(invalid(format!("eps must be positive, got {eps}")));
                }
                Box::new(Adam::new(len, lr, b1, b2, eps))
            }
            Self::Momentum { lr, mu } => {
                check_lr(lr)?;
                check_decay("mu", mu)?;
                Box::new(GradientDescentWithMomentum::new(len, lr, mu))
            }
        };

        Ok(optimizer)
    }
}

/// How the initial angles are drawn.
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitConfig {
    Constant { value: f64 },
    #[default]
    Uniform,
    /// Uniform angles narrowed by `1 / sqrt(n)`.
    FanIn,
}

impl InitConfig {
    /// Draws `n` initial angles.
    ///
    /// # Arguments
    /// * `n` - The amount of angles.
    /// * `seed` - An optional seed for reproducible runs.
    pub fn sample(&self, n: usize, seed: Option<u64>) -> Result<Vec<f64>> {
        let params = match *self {
            Self::Constant { value } => {
                if !value.is_finite() {
                    return Err(invalid(format!("initial angle must be finite, got {value}")));
                }
                ConstParamGen::new(value).sample(n)
            }
            Self::Uniform => RandParamGen::angles(rng(seed))?.sample(n),
            Self::FanIn => RandParamGen::fan_in(rng(seed), n)?.sample(n),
        };

        Ok(params)
    }
}

/// Every knob of a training run, all of them defaulted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: NonZeroUsize,
    /// The amount of shards every batch is split into.
    pub workers: NonZeroUsize,
    /// The size of the thread pool, defaults to the amount of logical CPUs.
    pub threads: Option<NonZeroUsize>,
    pub optimizer: OptimizerConfig,
    pub init: InitConfig,
    pub convention: OutputConvention,
    pub update_rule: UpdateRule,
    pub eval_retries: usize,
    pub batch_timeout_ms: Option<u64>,
    /// Scores the validation set every this many steps.
    pub validate_every: Option<NonZeroUsize>,
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: NonZeroUsize::MIN,
            workers: defaults::workers(),
            threads: None,
            optimizer: OptimizerConfig::default(),
            init: InitConfig::default(),
            convention: OutputConvention::default(),
            update_rule: UpdateRule::default(),
            eval_retries: 0,
            batch_timeout_ms: None,
            validate_every: None,
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }
}

pub(super) fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn check_lr(lr: f64) -> Result<()> {
    if !(lr.is_finite() && lr >= 0.) {
        return Err(invalid(format!("lr must be a non negative number, got {lr}")));
    }

    Ok(())
}

fn check_decay(name: &str, value: f64) -> Result<()> {
    if !(0. ..1.).contains(&value) {
        return Err(invalid(format!("{name} must be in [0, 1), got {value}")));
    }

    Ok(())
}

fn invalid(msg: String) -> MlErr {
    MlErr::InvalidConfig(msg)
}

mod defaults {
    use std::num::NonZeroUsize;

    pub fn lr() -> f64 {
        0.01
    }

    pub fn b1() -> f64 {
        0.9
    }

    pub fn b2() -> f64 {
        0.99
    }

    pub fn eps() -> f64 {
        1e-8
    }

    pub fn workers() -> NonZeroUsize {
        NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN)
    }
}
