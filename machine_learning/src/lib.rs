pub mod angle;
pub mod balance;
pub mod convention;
pub mod dataset;
pub mod error;
pub mod execution;
pub mod features;
pub mod gradient;
pub mod initialization;
pub mod optimization;
pub mod training;

pub use balance::ClassWeights;
pub use convention::OutputConvention;
pub use dataset::EdgeBatch;
pub use error::{EvalFault, MlErr, Result};
pub use execution::{BatchAggregator, BatchGradient, BatchScore};
pub use features::FeatureMapper;
