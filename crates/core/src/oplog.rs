use crate::config::app_paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One executed (or simulated) move. Absent values serialize as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(default, alias = "date_taken")]
    pub capture_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Moves in processing order. Undo walks it back to front.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct OperationLog {
    entries: Vec<PlannedMove>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PlannedMove) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[PlannedMove] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory: {}", parent.display())
            })?;
        }
        let body =
            serde_json::to_string_pretty(self).context("failed to serialize operation log")?;
        fs::write(path, body)
            .with_context(|| format!("failed to write operation log: {}", path.display()))?;
        Ok(())
    }

    /// Source files are not checked here; undo deals with whatever is on disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read operation log: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("operation log is corrupt: {}", path.display()))
    }
}

impl From<Vec<PlannedMove>> for OperationLog {
    fn from(entries: Vec<PlannedMove>) -> Self {
        Self { entries }
    }
}

pub fn save_last_log(log: &OperationLog) -> Result<PathBuf> {
    let paths = app_paths()?;
    log.save(&paths.last_log_path)?;
    Ok(paths.last_log_path)
}

pub fn load_last_log() -> Result<Option<OperationLog>> {
    let paths = app_paths()?;
    if !paths.last_log_path.exists() {
        return Ok(None);
    }
    OperationLog::load(&paths.last_log_path).map(Some)
}

pub fn clear_last_log() -> Result<()> {
    let paths = app_paths()?;
    if paths.last_log_path.exists() {
        fs::remove_file(&paths.last_log_path).with_context(|| {
            format!(
                "failed to remove last operation log: {}",
                paths.last_log_path.display()
            )
        })?;
    }
    Ok(())
}
