/// A statevector with real amplitudes.
///
/// `RY` rotations and `CNOT` gates map real amplitudes to real amplitudes, which is all
/// the tree circuits of this crate need, so complex arithmetic is never required.
/// Qubit `q` corresponds to bit `q` of the basis state index.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    qubits: usize,
    amps: Box<[f64]>,
}

impl StateVector {
    /// Creates the `|0...0>` state.
    ///
    /// # Arguments
    /// * `qubits` - The amount of qubits of the register.
    ///
    /// # Returns
    /// A new `StateVector` instance.
    pub fn zero(qubits: usize) -> Self {
        let mut amps = vec![0.; 1 << qubits].into_boxed_slice();
        amps[0] = 1.;
        Self { qubits, amps }
    }

    pub fn qubits(&self) -> usize {
        self.qubits
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amps
    }

    /// Applies a rotation of `theta` around the Y axis to `qubit`.
    pub fn ry(&mut self, qubit: usize, theta: f64) {
        let (s, c) = (theta / 2.).sin_cos();
        let mask = 1 << qubit;

        for i in (0..self.amps.len()).filter(|i| i & mask == 0) {
            let j = i | mask;
            let (a0, a1) = (self.amps[i], self.amps[j]);
            self.amps[i] = c * a0 - s * a1;
            self.amps[j] = s * a0 + c * a1;
        }
    }

    /// Flips `target` on every basis state where `control` is set.
    pub fn cx(&mut self, control: usize, target: usize) {
        let (cmask, tmask) = (1 << control, 1 << target);

        for i in (0..self.amps.len()).filter(|i| i & cmask != 0 && i & tmask == 0) {
            self.amps.swap(i, i | tmask);
        }
    }

    /// The probability of measuring `qubit` in the `|1>` state.
    pub fn prob_one(&self, qubit: usize) -> f64 {
        let mask = 1 << qubit;

        self.amps
            .iter()
            .enumerate()
            .filter(|(i, _)| i & mask != 0)
            .map(|(_, a)| a * a)
            .sum()
    }

    /// The expectation value of the Pauli-Z observable on `qubit`.
    pub fn expect_z(&self, qubit: usize) -> f64 {
        1. - 2. * self.prob_one(qubit)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn zero_state_reads_zero() {
        let state = StateVector::zero(3);

        assert_eq!(state.amplitudes().len(), 8);
        assert_eq!(state.prob_one(1), 0.);
        assert_eq!(state.expect_z(2), 1.);
    }

    #[test]
    fn ry_pi_flips_the_qubit() {
        let mut state = StateVector::zero(2);
        state.ry(1, PI);

        assert!((state.prob_one(1) - 1.).abs() < TOL);
        assert!(state.prob_one(0).abs() < TOL);
    }

    #[test]
    fn ry_half_pi_balances_the_qubit() {
        let mut state = StateVector::zero(1);
        state.ry(0, PI / 2.);

        assert!((state.prob_one(0) - 0.5).abs() < TOL);
        assert!(state.expect_z(0).abs() < TOL);
    }

    #[test]
    fn cx_only_acts_when_control_is_set() {
        let mut state = StateVector::zero(2);
        state.cx(0, 1);
        assert_eq!(state.prob_one(1), 0.);

        state.ry(0, PI);
        state.cx(0, 1);
        assert!((state.prob_one(1) - 1.).abs() < TOL);
    }

    #[test]
    fn norm_is_preserved() {
        let mut state = StateVector::zero(4);
        state.ry(0, 0.3);
        state.ry(2, 1.7);
        state.cx(0, 3);
        state.ry(3, 2.9);
        state.cx(3, 2);

        let norm: f64 = state.amplitudes().iter().map(|a| a * a).sum();
        assert!((norm - 1.).abs() < TOL);
    }
}
