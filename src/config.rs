//! Provides a ConfigManager to read monitor settings from a file and the
//! environment.
//!

use color_eyre::Result;
use log::*;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_FILE: &str = "proctop.toml";
pub const ENV_PREFIX: &str = "PROCTOP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Tick period of the sampler in milliseconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Sleep period of the loop delay probe in milliseconds.
    #[serde(default = "default_probe_resolution")]
    pub probe_resolution: u64,
    /// How often `proctop watch` prints, in milliseconds.
    #[serde(default = "default_report")]
    pub report: u64,
}

fn default_interval() -> u64 {
    1000
}

fn default_probe_resolution() -> u64 {
    10
}

fn default_report() -> u64 {
    1000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            probe_resolution: default_probe_resolution(),
            report: default_report(),
        }
    }
}

impl MonitorConfig {
    pub fn with_interval(interval: u64) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval.max(1))
    }

    pub fn probe_resolution(&self) -> Duration {
        Duration::from_millis(self.probe_resolution.max(1))
    }

    pub fn report(&self) -> Duration {
        Duration::from_millis(self.report.max(1))
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    config: MonitorConfig,
}

impl ConfigManager {
    /// Load from `file_path` (optional) with `PROCTOP_*` environment overrides.
    pub fn new(file_path: PathBuf) -> Result<ConfigManager> {
        let config = Self::load_from_file(&file_path)?;
        debug!(target: "Config", "Loaded {:?} from {:?}", config, file_path);
        Ok(ConfigManager { config })
    }

    pub fn current(&self) -> MonitorConfig {
        self.config.clone()
    }

    fn load_from_file(file_path: &Path) -> Result<MonitorConfig> {
        let raw = config::Config::builder()
            .add_source(config::File::from(file_path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(raw.try_deserialize()?)
    }
}
