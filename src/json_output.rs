//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per chi pilota il
//! processo da un'altra applicazione (un JSON per riga su stdout).
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio ingest con conteggi
//! - `progress`: File e step corrente
//! - `file_complete`: Sidecar scritto
//! - `file_failed`: Errore per-file
//! - `complete`: Fine ingest con riepilogo
//! - `error`: Errore fatale

use crate::progress::IngestSummary;
use crate::state::IngestStep;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    #[serde(rename = "start")]
    Start {
        folder: PathBuf,
        total_files: usize,
        pending_files: usize,
        model: String,
    },

    #[serde(rename = "progress")]
    Progress {
        current_file: Option<String>,
        step: IngestStep,
        completed: usize,
        total: usize,
        percentage: f64,
    },

    #[serde(rename = "file_complete")]
    FileComplete { path: PathBuf, sidecar: PathBuf },

    #[serde(rename = "file_failed")]
    FileFailed { path: PathBuf, error: String },

    #[serde(rename = "complete")]
    Complete {
        #[serde(flatten)]
        summary: IngestSummary,
        errors: Vec<String>,
        duration_seconds: f64,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl JsonMessage {
    /// Print as one line on stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn progress(current_file: Option<String>, step: IngestStep, completed: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self::Progress {
            current_file,
            step,
            completed,
            total,
            percentage,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
