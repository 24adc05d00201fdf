use crate::common::CONFIG_DIR;
use std::path::PathBuf;

pub fn config_dir() -> PathBuf {
    std::env::var_os("WAKEWATCH_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR))
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.toml")
}
