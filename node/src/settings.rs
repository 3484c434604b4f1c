use std::{
    env,
    ffi::OsString,
    fs,
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use circuit::Readout;
use machine_learning::{
    FeatureMapper, OutputConvention,
    features::ChannelRange,
    training::TrainingConfig,
};
use serde::Deserialize;

/// The environment variable read when no config path is passed as an argument.
pub const CONFIG_ENV: &str = "QEDGE_CONFIG";

/// What to do with the logs of a previous run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    /// Deletes the old logs.
    #[default]
    NewRun,
    /// Appends to the old logs and resumes from the last logged angles.
    Continue,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadoutSetting {
    Expectation,
    #[default]
    Probability,
    Shots(NonZeroU32),
}

impl From<ReadoutSetting> for Readout {
    fn from(setting: ReadoutSetting) -> Self {
        match setting {
            ReadoutSetting::Expectation => Readout::Expectation,
            ReadoutSetting::Probability => Readout::Probability,
            ReadoutSetting::Shots(shots) => Readout::Shots(shots),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CircuitSettings {
    pub readout: ReadoutSetting,
}

/// The physical ranges of the hit coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub r: ChannelRange,
    pub phi: ChannelRange,
    pub z: ChannelRange,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            r: ChannelRange::new(0., 1.),
            phi: ChannelRange::new(-1., 1.),
            z: ChannelRange::new(0., 1.2),
        }
    }
}

impl FeatureSettings {
    pub fn mapper(&self) -> Result<FeatureMapper> {
        Ok(FeatureMapper::from_hit_ranges(self.r, self.phi, self.z)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub train_dir: PathBuf,
    pub n_train: usize,
    #[serde(default)]
    pub valid_dir: Option<PathBuf>,
    #[serde(default)]
    pub n_valid: usize,
    pub log_dir: PathBuf,
    #[serde(default)]
    pub run_type: RunType,
    /// Rotates a log file once it would grow past this size.
    #[serde(default)]
    pub log_max_bytes: Option<u64>,
    /// `2` or more also dumps the gradients of every step.
    #[serde(default = "default_verbosity")]
    pub log_verbosity: u8,
    #[serde(default)]
    pub circuit: CircuitSettings,
    #[serde(default)]
    pub features: FeatureSettings,
    #[serde(default)]
    pub training: TrainingConfig,
}

fn default_verbosity() -> u8 {
    1
}

impl Settings {
    /// Reads and checks the settings stored as JSON at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display()))?;

        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid settings in '{}'", path.display()))?;

        settings.check()?;
        Ok(settings)
    }

    /// Checks the settings that can't be expressed by their types alone.
    pub fn check(&self) -> Result<()> {
        if self.n_train == 0 {
            bail!("n_train must be positive");
        }

        if self.n_valid > 0 && self.valid_dir.is_none() {
            bail!("n_valid is {} but there's no valid_dir", self.n_valid);
        }

        let expected = match self.circuit.readout {
            ReadoutSetting::Expectation => OutputConvention::Expectation,
            ReadoutSetting::Probability | ReadoutSetting::Shots(_) => OutputConvention::Probability,
        };

        if self.training.convention != expected {
            bail!(
                "the {:?} readout produces {expected} outputs but the training expects {}",
                self.circuit.readout,
                self.training.convention
            );
        }

        Ok(())
    }
}

/// Resolves the settings path from the first argument or the `QEDGE_CONFIG` variable.
///
/// # Arguments
/// * `arg` - The first command line argument, if any.
/// * `var` - The value of the environment variable, if set.
pub fn config_path(arg: Option<OsString>, var: Option<OsString>) -> Result<PathBuf> {
    arg.or(var)
        .map(PathBuf::from)
        .with_context(|| format!("usage: node <settings.json>, or set {CONFIG_ENV}"))
}

/// `config_path` over the process' arguments and environment.
pub fn config_path_from_env() -> Result<PathBuf> {
    config_path(env::args_os().nth(1), env::var_os(CONFIG_ENV))
}
