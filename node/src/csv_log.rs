use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use log::{debug, warn};
use machine_learning::training::{Recorder, TrainingEvent};

use crate::settings::RunType;

pub const PARAMS_FILE: &str = "log_params.csv";
pub const LOSS_FILE: &str = "log_loss.csv";
pub const SUMMARY_FILE: &str = "summary.csv";
pub const GRADS_FILE: &str = "log_grads.csv";
pub const VALIDATION_FILE: &str = "log_validation.csv";

const LOG_FILES: [&str; 5] = [
    PARAMS_FILE,
    LOSS_FILE,
    SUMMARY_FILE,
    GRADS_FILE,
    VALIDATION_FILE,
];

/// Appends every training event to plain CSV files in a directory.
///
/// Lines are never rewritten. When a size limit is set, a file that would grow past it is
/// first moved to `<file>.1`, replacing any older rotation, and a fresh file is started.
pub struct CsvRecorder {
    dir: PathBuf,
    max_bytes: Option<u64>,
    verbosity: u8,
}

impl CsvRecorder {
    /// Creates a new `CsvRecorder`.
    ///
    /// # Arguments
    /// * `dir` - The directory of the log files, created if missing.
    /// * `run_type` - Whether the logs of a previous run are deleted or appended to.
    /// * `max_bytes` - The size at which a file is rotated.
    /// * `verbosity` - `2` or more also logs the gradients of every step.
    ///
    /// # Returns
    /// The recorder or an io error if the directory couldn't be prepared.
    pub fn new(
        dir: impl Into<PathBuf>,
        run_type: RunType,
        max_bytes: Option<u64>,
        verbosity: u8,
    ) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        if run_type == RunType::NewRun {
            for name in LOG_FILES {
                let path = dir.join(name);
                remove_if_exists(&path)?;
                remove_if_exists(&rotated(&path))?;
            }
        }

        Ok(Self {
            dir,
            max_bytes,
            verbosity,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append(&self, name: &str, record: StringRecord) {
        let path = self.dir.join(name);

        if let Err(e) = self.write_row(&path, &record) {
            warn!("failed to write to {}: {e}", path.display());
        }
    }

    fn write_row(&self, path: &Path, record: &StringRecord) -> csv::Result<()> {
        // No field holds a delimiter or a quote, so a row is its fields, the commas between
        // them and a newline.
        let incoming = record.as_slice().len() + record.len();
        self.rotate(path, incoming as u64)?;

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);

        writer.write_record(record)?;
        writer.flush()?;
        Ok(())
    }

    fn rotate(&self, path: &Path, incoming: u64) -> io::Result<()> {
        let Some(max) = self.max_bytes else {
            return Ok(());
        };

        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        if size > 0 && size + incoming > max {
            debug!(size = size, max = max; "rotating {}", path.display());
            fs::rename(path, rotated(path))?;
        }

        Ok(())
    }
}

impl Recorder for CsvRecorder {
    fn record(&mut self, event: &TrainingEvent) {
        match event {
            TrainingEvent::Params { params, .. } => self.append(PARAMS_FILE, values_record(params)),
            TrainingEvent::BatchCompleted {
                epoch,
                batch,
                loss,
                gradient,
                elapsed,
            } => {
                self.append(LOSS_FILE, StringRecord::from(vec![format!("{loss:.4}")]));
                self.append(
                    SUMMARY_FILE,
                    StringRecord::from(vec![
                        format!("Epoch: {}", epoch + 1),
                        format!(" Batch: {}", batch + 1),
                        format!(" Loss: {loss:.4}"),
                        format!(" Elapsed: {}", minutes_seconds(*elapsed)),
                    ]),
                );

                if self.verbosity >= 2 {
                    self.append(GRADS_FILE, values_record(gradient));
                }
            }
            TrainingEvent::Validation { epoch, step, score } => self.append(
                VALIDATION_FILE,
                StringRecord::from(vec![
                    (epoch + 1).to_string(),
                    step.to_string(),
                    format!("{:.4}", score.loss),
                    format!("{:.4}", score.accuracy),
                ]),
            ),
            TrainingEvent::BatchStarted { .. } | TrainingEvent::EpochCompleted { .. } => {}
        }
    }
}

/// Reads the angles of the last line of `log_params.csv` in `dir`, if there's any.
///
/// # Returns
/// `None` if the file doesn't exist or is empty, an error if it can't be read or parsed.
pub fn last_params(dir: &Path) -> anyhow::Result<Option<Vec<f64>>> {
    let path = dir.join(PARAMS_FILE);

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("cannot read '{}'", path.display())),
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut last = None;
    for record in reader.records() {
        let record = record.with_context(|| format!("cannot read '{}'", path.display()))?;
        if record.iter().any(|value| !value.is_empty()) {
            last = Some(record);
        }
    }

    let Some(record) = last else {
        return Ok(None);
    };

    let params = record
        .iter()
        .filter(|value| !value.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<f64>, _>>()
        .with_context(|| format!("invalid angles in '{}'", path.display()))?;

    Ok(Some(params))
}

/// `%.4f` for every value, then an empty field so the row ends with a comma.
fn values_record(values: &[f64]) -> StringRecord {
    let mut record: StringRecord = values.iter().map(|v| format!("{v:.4}")).collect();
    record.push_field("");
    record
}

fn minutes_seconds(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m{}s", secs / 60, secs % 60)
}

fn rotated(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
