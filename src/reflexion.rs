//! Reflexion log
//!
//! Failed retry-loop outcomes are recorded here for offline review. This is
//! separate from the in-loop feedback: nothing read back from the log ever
//! influences a running loop.

use crate::error::Result;
use crate::execution_loop::SqlErrorClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflexionRecord {
    pub question: String,
    pub sql: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<SqlErrorClass>,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl ReflexionRecord {
    pub fn new(question: &str, sql: &str, error: &str, attempts: u32) -> Self {
        Self {
            question: question.to_string(),
            sql: sql.to_string(),
            error: error.to_string(),
            error_class: None,
            attempts,
            timestamp: Utc::now(),
        }
    }

    pub fn with_error_class(mut self, error_class: SqlErrorClass) -> Self {
        self.error_class = Some(error_class);
        self
    }
}

/// Append-only sink for failure traces.
pub trait ReflexionLog: Send + Sync {
    fn record(&self, record: &ReflexionRecord) -> Result<()>;
}

/// JSON array file, cumulative across runs.
///
/// Each append reads the whole file and writes it back through a sibling
/// `.tmp` file renamed over the log. Appends from this
/// value are serialized by a mutex; separate processes writing the same
/// file are not coordinated and can lose records.
pub struct JsonFileReflexionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileReflexionLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Every record currently on disk, oldest first.
    pub fn load(&self) -> Result<Vec<ReflexionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl ReflexionLog for JsonFileReflexionLog {
    fn record(&self, record: &ReflexionRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut existing = self.load()?;
        existing.push(record.clone());

        // Replace the log in one rename so an interrupted write leaves the
        // previous history intact.
        let staging = self.staging_path();
        fs::write(&staging, serde_json::to_string_pretty(&existing)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// In-memory log, for embedding without a filesystem and for tests.
#[derive(Default)]
pub struct MemoryReflexionLog {
    records: Mutex<Vec<ReflexionRecord>>,
}

impl MemoryReflexionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ReflexionRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl ReflexionLog for MemoryReflexionLog {
    fn record(&self, record: &ReflexionRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}
