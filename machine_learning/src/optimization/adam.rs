use super::{Optimizer, optimizer::check_len};
use crate::{Result, angle::wrap_angle};

/// Adam, with bias-corrected first and second moment estimates.
///
/// `θ' = (θ - lr * m̂ / (sqrt(v̂) + eps)) mod 2π` where `m̂ = m / (1 - β1^t)` and
/// `v̂ = v / (1 - β2^t)`. The moments start as zero vectors and live as long as the optimizer.
#[derive(Debug)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    beta1_t: f64,
    beta2_t: f64,
    steps: u64,
    m: Box<[f64]>,
    v: Box<[f64]>,
    epsilon: f64,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            steps: 0,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }

    /// The amount of updates applied so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The first and second moment estimates, before bias correction.
    pub fn moments(&self) -> (&[f64], &[f64]) {
        (&self.m, &self.v)
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f64], params: &mut [f64]) -> Result<()> {
        check_len(grad, params)?;
        check_len(&self.m, params)?;

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.steps += 1;
        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
            .for_each(|(((p, g), m), v)| {
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g.powi(2);

                let m_hat = *m / bc1;
                let v_hat = *v / bc2;
                *p = wrap_angle(*p - lr * m_hat / (v_hat.sqrt() + eps));
            });

        Ok(())
    }
}
