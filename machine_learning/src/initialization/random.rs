use std::f64::consts::TAU;

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::ParamGen;
use crate::{MlErr, Result, angle::wrap_angle};

/// A parameter generator that draws uniformly distributed angles.
pub struct RandParamGen<R: Rng> {
    rng: R,
    distribution: Uniform<f64>,
}

impl<R: Rng> RandParamGen<R> {
    /// Creates a new `RandParamGen` drawing from `[0, 2π)`.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    pub fn angles(rng: R) -> Result<Self> {
        Self::scaled(rng, 1.)
    }

    /// Creates a new `RandParamGen` drawing from `[0, 2π * scale)`.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `scale` - A factor in `(0, 1]` that narrows the initial spread.
    ///
    /// # Returns
    /// An error if `scale` is outside of `(0, 1]`.
    pub fn scaled(rng: R, scale: f64) -> Result<Self> {
        if !(scale > 0. && scale <= 1.) {
            return Err(MlErr::InvalidConfig(format!(
                "initial angle scale must be in (0, 1], got {scale}"
            )));
        }

        let distribution =
            Uniform::new(0., TAU * scale).map_err(|e| MlErr::InvalidConfig(e.to_string()))?;

        Ok(Self { rng, distribution })
    }

    /// Creates a new `RandParamGen` whose spread shrinks as `1 / sqrt(n)` with the amount of angles.
    pub fn fan_in(rng: R, n: usize) -> Result<Self> {
        Self::scaled(rng, 1. / (n.max(1) as f64).sqrt())
    }
}

impl<R: Rng> ParamGen for RandParamGen<R> {
    fn sample(&mut self, n: usize) -> Vec<f64> {
        (0..n)
            .map(|_| wrap_angle(self.distribution.sample(&mut self.rng)))
            .collect()
    }
}
