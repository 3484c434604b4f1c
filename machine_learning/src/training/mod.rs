mod builder;
mod config;
mod event;
mod trainer;

pub use builder::TrainerBuilder;
pub use config::{InitConfig, OptimizerConfig, TrainingConfig, UpdateRule};
pub use event::{Recorder, TrainingEvent};
pub use trainer::Trainer;
