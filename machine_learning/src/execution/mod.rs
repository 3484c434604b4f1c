mod aggregator;
mod partition;
mod probe;
mod shard;

pub use aggregator::{BatchAggregator, BatchGradient, BatchScore};
pub use partition::shard_ranges;
