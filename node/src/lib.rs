pub mod csv_log;
pub mod dataset;
pub mod settings;

use anyhow::{Context, Result};
use circuit::TtnCircuit;
use log::{info, warn};
use machine_learning::training::TrainerBuilder;

use crate::{
    csv_log::CsvRecorder,
    settings::{RunType, Settings},
};

/// Loads the datasets, trains the tree circuit and logs the whole run to `log_dir`.
///
/// # Returns
/// The final angles, or the first error, including any failed batch.
pub fn run(settings: &Settings) -> Result<Vec<f64>> {
    settings.check()?;

    let mapper = settings.features.mapper()?;
    let train = dataset::load_batches(&settings.train_dir, settings.n_train, &mapper)?;
    let valid = match &settings.valid_dir {
        Some(dir) if settings.n_valid > 0 => dataset::load_batches(dir, settings.n_valid, &mapper)?,
        _ => Vec::new(),
    };

    let resumed = match settings.run_type {
        RunType::Continue => csv_log::last_params(&settings.log_dir)?,
        RunType::NewRun => None,
    };

    let recorder = CsvRecorder::new(
        &settings.log_dir,
        settings.run_type,
        settings.log_max_bytes,
        settings.log_verbosity,
    )
    .with_context(|| format!("cannot prepare '{}'", settings.log_dir.display()))?;

    let mut builder = TrainerBuilder::new(&settings.training);
    match resumed {
        Some(params) => {
            info!(angles = params.len(); "resuming from the last logged angles");
            builder = builder.with_params(params);
        }
        None if settings.run_type == RunType::Continue => {
            warn!("no angles were logged yet, starting from scratch");
        }
        None => {}
    }

    let circuit = TtnCircuit::new(settings.circuit.readout.into());
    let mut trainer = builder.build(circuit, recorder)?;

    let losses = trainer.fit(&train, &valid)?;
    if let Some(last) = losses.last() {
        info!(epochs = losses.len(), mean_loss = *last; "training finished");
    }

    Ok(trainer.into_params())
}
