use std::f64::consts::FRAC_PI_2;

use circuit::Evaluator;
use ndarray::ArrayView1;

use crate::angle::wrap_angle;

/// The fixed shift of the parameter-shift rule.
pub const SHIFT: f64 = FRAC_PI_2;

/// Estimates the gradient of `eval` with respect to `params` with the parameter-shift rule.
///
/// For every index `i` the angle is shifted by `+π/2`, evaluated, shifted by `-π` from there,
/// evaluated again, and finally restored to its saved original value, so `params` is left
/// bit-for-bit unchanged even when `eval` fails. `eval` is called exactly `2 * params.len()`
/// times on success.
///
/// # Arguments
/// * `eval` - A function of the full parameter vector.
/// * `params` - The parameters, shifted in place one index at a time.
///
/// # Returns
/// `gradient[i] = (f(θ_i + π/2) - f(θ_i - π/2)) / 2`, or the first error returned by `eval`.
pub fn parameter_shift<F, E>(mut eval: F, params: &mut [f64]) -> Result<Vec<f64>, E>
where
    F: FnMut(&[f64]) -> Result<f64, E>,
{
    let mut grad = vec![0.; params.len()];

    for (i, g) in grad.iter_mut().enumerate() {
        let theta = params[i];
        let diff = shifted_difference(&mut eval, params, i);
        params[i] = theta;
        *g = diff? / 2.;
    }

    Ok(grad)
}

fn shifted_difference<F, E>(eval: &mut F, params: &mut [f64], i: usize) -> Result<f64, E>
where
    F: FnMut(&[f64]) -> Result<f64, E>,
{
    params[i] = wrap_angle(params[i] + SHIFT);
    let plus = eval(params)?;

    params[i] = wrap_angle(params[i] - 2. * SHIFT);
    let minus = eval(params)?;

    Ok(plus - minus)
}

/// Parameter-shift gradient of a circuit's raw output for a single edge.
///
/// # Arguments
/// * `evaluator` - The circuit backend.
/// * `features` - The encoded features of the edge.
/// * `params` - The parameters, restored before returning.
pub fn gradient<E: Evaluator + ?Sized>(
    evaluator: &E,
    features: ArrayView1<'_, f64>,
    params: &mut [f64],
) -> circuit::Result<Vec<f64>> {
    parameter_shift(|p| evaluator.evaluate(features, p), params)
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, f64::consts::TAU};

    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn constant_function_has_zero_gradient() {
        let mut params = [0.; 11];
        let grad = parameter_shift(|_| Ok::<_, ()>(0.5), &mut params).unwrap();

        assert_eq!(grad, vec![0.; 11]);
    }

    #[test]
    fn calls_evaluator_twice_per_param() {
        let calls = Cell::new(0);
        let mut params = [0.1, 0.2, 0.3];

        parameter_shift(
            |_| {
                calls.set(calls.get() + 1);
                Ok::<_, ()>(0.)
            },
            &mut params,
        )
        .unwrap();

        assert_eq!(calls.get(), 6);
    }

    #[test]
    fn params_are_restored_exactly() {
        let original = [0., 1e-3, 1.234567, 3.9, TAU - 1e-7, 6.2];
        let mut params = original;

        parameter_shift(|p| Ok::<_, ()>(p.iter().map(|x| x.sin()).sum()), &mut params).unwrap();

        assert_eq!(params, original);
    }

    #[test]
    fn params_are_restored_on_failure() {
        let original = [0.5, 1.5, 2.5];
        let mut params = original;
        let calls = Cell::new(0);

        let res = parameter_shift(
            |_| {
                calls.set(calls.get() + 1);
                if calls.get() == 4 { Err("boom") } else { Ok(0.) }
            },
            &mut params,
        );

        assert_eq!(res, Err("boom"));
        assert_eq!(params, original);
    }

    #[test]
    fn shifts_wrap_around() {
        let mut seen = Vec::new();
        let mut params = [0.];

        parameter_shift(
            |p| {
                seen.push(p[0]);
                Ok::<_, ()>(0.)
            },
            &mut params,
        )
        .unwrap();

        assert!((seen[0] - FRAC_PI_2).abs() < TOL);
        assert!((seen[1] - 3. * FRAC_PI_2).abs() < TOL);
    }

    #[test]
    fn exact_for_sinusoids() {
        // f(θ) = a + b cos θ + c sin θ, the shape of any single-rotation expectation value.
        let f = |p: &[f64]| Ok::<_, ()>(0.3 + 0.5 * p[0].cos() - 0.2 * p[0].sin());

        for theta in [0., 0.7, 2.5, 5.9] {
            let grad = parameter_shift(f, &mut [theta]).unwrap();
            let exact = -0.5 * theta.sin() - 0.2 * theta.cos();

            assert!((grad[0] - exact).abs() < TOL, "θ = {theta}");
        }
    }
}
