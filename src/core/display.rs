use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Surface the diagnostic panels are rendered into.
///
/// Values are plain scalars already formatted for display. A refresh sets
/// its keys and then calls [`DisplaySink::flush`].
pub trait DisplaySink: Send {
    fn set(&mut self, key: &'static str, value: String);
    fn flush(&mut self) -> Result<()>;
}

/// In-memory sink, also used by tests.
impl DisplaySink for BTreeMap<String, String> {
    fn set(&mut self, key: &'static str, value: String) {
        self.insert(key.to_string(), value);
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes every known value as sorted `key=value` lines.
///
/// The file is replaced atomically so `wakewatchctl status` never sees a
/// half-written snapshot.
#[derive(Debug)]
pub struct StatusFile {
    path: PathBuf,
    values: BTreeMap<String, String>,
    dirty: bool,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: BTreeMap::new(),
            dirty: false,
        }
    }
}

impl DisplaySink for StatusFile {
    fn set(&mut self, key: &'static str, value: String) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let body: String = self
            .values
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect();
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body).with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to commit {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}

/// Emits values through tracing; used when no status file can be written.
#[derive(Debug, Default)]
pub struct LogSink {
    pending: Vec<(&'static str, String)>,
}

impl DisplaySink for LogSink {
    fn set(&mut self, key: &'static str, value: String) {
        self.pending.push((key, value));
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let line = self
            .pending
            .drain(..)
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!(target: "wakewatch::display", "{}", line);
        Ok(())
    }
}

/// Parse a status file back into its key/value pairs.
pub fn read_status(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_status(&content))
}

pub fn parse_status(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}
