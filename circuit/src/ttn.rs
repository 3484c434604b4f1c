use std::num::NonZeroU32;

use ndarray::ArrayView1;
use rand_distr::{Binomial, Distribution};

use crate::{EvalErr, Evaluator, Result, StateVector};

/// The amount of qubits of the tree, one per edge feature.
pub const TTN_QUBITS: usize = 6;

/// The amount of learnable angles of the tree.
pub const TTN_PARAMS: usize = 11;

const OUTPUT_QUBIT: usize = 4;

/// The entangling blocks of the tree, in application order.
///
/// Each block rotates its two qubits with consecutive learnable angles and then applies a
/// `CNOT(control, target)`.
const BLOCKS: [([usize; 2], (usize, usize)); 5] = [
    ([0, 1], (0, 1)),
    ([2, 3], (2, 3)),
    ([4, 5], (5, 4)),
    ([1, 3], (1, 3)),
    ([3, 4], (3, 4)),
];

/// How the output qubit is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readout {
    /// The Pauli-Z expectation value, in `[-1, 1]`.
    Expectation,
    /// The exact probability of measuring `|1>`, in `[0, 1]`.
    Probability,
    /// An estimate of the probability of measuring `|1>` from a finite amount of shots.
    Shots(NonZeroU32),
}

/// A tree tensor network classifier over the six features of an edge.
///
/// Every feature is loaded with an `RY` rotation on its own qubit, then the tree merges
/// the qubits pairwise down to qubit 4, which is read according to the configured `Readout`.
#[derive(Debug, Clone, Copy)]
pub struct TtnCircuit {
    readout: Readout,
}

impl TtnCircuit {
    /// Creates a new `TtnCircuit`.
    ///
    /// # Arguments
    /// * `readout` - How the output qubit is turned into a scalar.
    ///
    /// # Returns
    /// A new `TtnCircuit` instance.
    pub fn new(readout: Readout) -> Self {
        Self { readout }
    }

    pub fn readout(&self) -> Readout {
        self.readout
    }

    /// Runs the circuit and returns the final state, before any readout.
    ///
    /// # Arguments
    /// * `features` - The six angle-encoded features of the edge.
    /// * `params` - The eleven learnable angles.
    ///
    /// # Returns
    /// The final `StateVector` or an `EvalErr::ArityMismatch` if any of the inputs has the wrong length.
    pub fn prepare(&self, features: ArrayView1<'_, f64>, params: &[f64]) -> Result<StateVector> {
        if features.len() != TTN_QUBITS {
            return Err(EvalErr::ArityMismatch {
                what: "features",
                got: features.len(),
                expected: TTN_QUBITS,
            });
        }

        if params.len() != TTN_PARAMS {
            return Err(EvalErr::ArityMismatch {
                what: "params",
                got: params.len(),
                expected: TTN_PARAMS,
            });
        }

        let mut state = StateVector::zero(TTN_QUBITS);

        for (qubit, &angle) in features.iter().enumerate() {
            state.ry(qubit, angle);
        }

        for (i, ([a, b], (control, target))) in BLOCKS.into_iter().enumerate() {
            state.ry(a, params[2 * i]);
            state.ry(b, params[2 * i + 1]);
            state.cx(control, target);
        }

        state.ry(OUTPUT_QUBIT, params[TTN_PARAMS - 1]);
        Ok(state)
    }
}

impl Evaluator for TtnCircuit {
    fn evaluate(&self, features: ArrayView1<'_, f64>, params: &[f64]) -> Result<f64> {
        let state = self.prepare(features, params)?;

        match self.readout {
            Readout::Expectation => Ok(state.expect_z(OUTPUT_QUBIT)),
            Readout::Probability => Ok(state.prob_one(OUTPUT_QUBIT)),
            Readout::Shots(shots) => {
                let p = state.prob_one(OUTPUT_QUBIT).clamp(0., 1.);
                let sampler = Binomial::new(u64::from(shots.get()), p)
                    .map_err(|e| EvalErr::Backend(e.to_string()))?;

                let ones = sampler.sample(&mut rand::rng());
                Ok(ones as f64 / f64::from(shots.get()))
            }
        }
    }

    fn num_params(&self) -> Option<usize> {
        Some(TTN_PARAMS)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use ndarray::{Array1, arr1};

    use super::*;

    const TOL: f64 = 1e-12;

    fn features(values: [f64; TTN_QUBITS]) -> Array1<f64> {
        arr1(&values)
    }

    #[test]
    fn identity_params_read_the_ground_state() {
        let circuit = TtnCircuit::new(Readout::Expectation);
        let out = circuit
            .evaluate(features([0.; 6]).view(), &[0.; TTN_PARAMS])
            .unwrap();

        assert!((out - 1.).abs() < TOL);
    }

    #[test]
    fn flipped_output_feature_reads_one() {
        let circuit = TtnCircuit::new(Readout::Probability);
        let x = features([0., 0., 0., 0., PI, 0.]);
        let out = circuit.evaluate(x.view(), &[0.; TTN_PARAMS]).unwrap();

        assert!((out - 1.).abs() < TOL);
    }

    #[test]
    fn entanglement_reaches_the_output_qubit() {
        // Qubit 3 controls the last CNOT of the tree, flipping the output qubit.
        let circuit = TtnCircuit::new(Readout::Probability);
        let x = features([0., 0., 0., PI, 0., 0.]);
        let out = circuit.evaluate(x.view(), &[0.; TTN_PARAMS]).unwrap();

        assert!((out - 1.).abs() < TOL);
    }

    #[test]
    fn readouts_agree() {
        let x = features([0.1, 0.7, 0.3, 0.9, 0.5, 0.2]);
        let params: Vec<f64> = (0..TTN_PARAMS).map(|i| 0.4 * i as f64).collect();

        let z = TtnCircuit::new(Readout::Expectation)
            .evaluate(x.view(), &params)
            .unwrap();
        let p = TtnCircuit::new(Readout::Probability)
            .evaluate(x.view(), &params)
            .unwrap();

        assert!((p - (1. - z) / 2.).abs() < TOL);
    }

    #[test]
    fn shots_estimate_stays_in_range() {
        let shots = NonZeroU32::new(1000).unwrap();
        let circuit = TtnCircuit::new(Readout::Shots(shots));
        let x = features([0.4; 6]);
        let out = circuit.evaluate(x.view(), &[1.; TTN_PARAMS]).unwrap();

        assert!((0. ..=1.).contains(&out));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let circuit = TtnCircuit::new(Readout::Expectation);

        let err = circuit
            .evaluate(features([0.; 6]).view(), &[0.; 3])
            .unwrap_err();
        assert_eq!(
            err,
            EvalErr::ArityMismatch {
                what: "params",
                got: 3,
                expected: TTN_PARAMS
            }
        );

        let short = arr1(&[0., 0.]);
        let err = circuit.evaluate(short.view(), &[0.; TTN_PARAMS]);
        assert!(matches!(err, Err(EvalErr::ArityMismatch { what: "features", .. })));
    }
}
