use crate::core::config::{self, Settings};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub error_debounce_ms: u64,
}

impl DaemonConfig {
    pub fn load() -> Result<Self> {
        Self::from_path(config::settings_path())
    }

    pub fn from_path(settings_path: PathBuf) -> Result<Self> {
        let settings = Settings::load_or_default(&settings_path)?;
        Ok(Self {
            settings,
            settings_path,
            error_debounce_ms: 30_000,
        })
    }
}
