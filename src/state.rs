//! # State Management Module
//!
//! Questo modulo gestisce il progress record di una cartella di footage.
//!
//! ## Responsabilità:
//! - Definisce `ProgressRecord` (status, file/step corrente, contatori, errori)
//! - Persiste il record in `.ingest_progress.json` nella cartella stessa
//! - Sovrascrive (mai merge) il record ad ogni cambio di stato
//! - Fornisce la query di stato usata mentre un ingest è in corso
//!
//! ## Namespace:
//! - Il nome del file è riservato e nascosto: non collide mai con un sidecar
//!   (`<media>.json`) e non viene mai scoperto come media
//!
//! ## Esempio struttura progress file:
//! ```json
//! {
//!   "status": "running",
//!   "current_file": "A001.mov",
//!   "current_step": "analyzing",
//!   "completed": 3,
//!   "total": 10,
//!   "errors": ["B002.mov: upload state=FAILED"]
//! }
//! ```

use crate::file_manager::FileManager;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Reserved progress file name inside each ingested folder
pub const PROGRESS_FILENAME: &str = ".ingest_progress.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Complete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestStep {
    Transcoding,
    Uploading,
    Analyzing,
}

impl fmt::Display for IngestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestStep::Transcoding => "transcoding",
            IngestStep::Uploading => "uploading",
            IngestStep::Analyzing => "analyzing",
        };
        f.write_str(s)
    }
}

/// Folder-level ingest progress
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    pub status: RunStatus,
    pub current_file: Option<String>,
    pub current_step: Option<IngestStep>,
    pub completed: usize,
    pub total: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ProgressRecord {
    /// One-line human summary
    pub fn describe(&self) -> String {
        let mut line = match self.status {
            RunStatus::Complete => format!("complete: {}/{} files analyzed", self.completed, self.total),
            RunStatus::Running => {
                let mut line = format!("running: {}/{} files analyzed", self.completed, self.total);
                if let Some(step) = self.current_step {
                    line.push_str(&format!(", {}", step));
                }
                if let Some(ref file) = self.current_file {
                    line.push_str(&format!(" {}", file));
                }
                line
            }
        };
        if !self.errors.is_empty() {
            line.push_str(&format!(" ({} error(s))", self.errors.len()));
        }
        line
    }
}

/// Reads and overwrites the progress record of one folder
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn for_folder(root: &Path) -> Self {
        Self {
            path: root.join(PROGRESS_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the record
    pub fn write(&self, record: &ProgressRecord) -> Result<()> {
        FileManager::write_json_atomic(&self.path, record)
    }

    /// `None` when no ingest ever ran or the file is unreadable
    pub fn read(&self) -> Option<ProgressRecord> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// Status query for a folder
pub fn ingest_status(root: &Path) -> Option<ProgressRecord> {
    ProgressStore::for_folder(root).read()
}
