mod error;
mod evaluator;
mod statevector;
mod ttn;

pub use error::{EvalErr, Result};
pub use evaluator::Evaluator;
pub use statevector::StateVector;
pub use ttn::{Readout, TTN_PARAMS, TTN_QUBITS, TtnCircuit};
