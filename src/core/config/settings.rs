use crate::common::{DEFAULT_FIX_LOG_CAPACITY, LogLevel, ReacquirePolicy, STATUS_FILE};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub daemon: DaemonSection,
    pub wake_lock: WakeLockSection,
    pub location: LocationSection,
    pub alert: AlertSection,
    pub display: DisplaySection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WakeLockSection {
    pub reacquire: ReacquirePolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocationSection {
    /// Most recent fixes kept in memory; 0 keeps every fix.
    pub fix_log_capacity: usize,
}

impl Default for LocationSection {
    fn default() -> Self {
        Self {
            fix_log_capacity: DEFAULT_FIX_LOG_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertSection {
    /// argv of the command that plays the alert; empty means silent.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    pub status_file: PathBuf,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            status_file: PathBuf::from(STATUS_FILE),
        }
    }
}

impl Settings {
    /// Load settings from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(target: "wakewatch::daemon", "{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }
}
