//! # Ingest Progress Tracker
//!
//! Unifica progress record su disco, progress bar ed eventi JSON in un
//! singolo tracker posseduto dal coordinator.
//!
//! Il record viene sovrascritto ad ogni cambio di stato, così una status
//! query durante il run vede sempre file, step ed errori correnti.

use crate::config::Config;
use crate::file_manager::FileManager;
use crate::json_output::JsonMessage;
use crate::progress::{IngestSummary, ProgressManager};
use crate::state::{IngestStep, ProgressRecord, ProgressStore, RunStatus};
use std::path::Path;
use std::time::Instant;
use tracing::{error, warn};

pub struct IngestProgress {
    store: ProgressStore,
    errors: Vec<String>,
    summary: IngestSummary,
    bar: Option<ProgressManager>,
    json_output: bool,
    started: Instant,
}

impl IngestProgress {
    pub fn new(root: &Path, config: &Config, total: usize, already_done: usize) -> Self {
        Self {
            store: ProgressStore::for_folder(root),
            errors: Vec::new(),
            summary: IngestSummary::new(total, already_done),
            bar: None,
            json_output: config.json_output,
            started: Instant::now(),
        }
        .with_bar(config.show_progress && !config.json_output)
    }

    fn with_bar(mut self, show: bool) -> Self {
        if show {
            let pending = self.summary.total - self.summary.already_done;
            self.bar = Some(ProgressManager::new(pending as u64));
        }
        self
    }

    pub fn summary(&self) -> &IngestSummary {
        &self.summary
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// First record of the run
    pub fn start(&self, root: &Path, pending: usize, model: &str) {
        if self.json_output {
            JsonMessage::Start {
                folder: root.to_path_buf(),
                total_files: self.summary.total,
                pending_files: pending,
                model: model.to_string(),
            }
            .emit();
        }
        self.write(RunStatus::Running, None, None, self.summary.already_done);
    }

    /// Rewrite the running record with the current file and step
    pub fn step(&self, current_file: Option<String>, step: IngestStep, completed: usize) {
        if let Some(ref bar) = self.bar {
            if let Some(ref file) = current_file {
                bar.set_message(&format!("{} {}", step, file));
            }
        }
        if self.json_output {
            JsonMessage::progress(current_file.clone(), step, completed, self.summary.total).emit();
        }
        self.write(RunStatus::Running, current_file, Some(step), completed);
    }

    /// Append `"<filename>: <message>"` to the run's error list
    pub fn record_error(&mut self, media: &Path, message: &str) {
        let entry = format!("{}: {}", FileManager::display_name(media), message);
        error!("{}", entry);
        self.errors.push(entry);
        self.summary.add_failed();

        if self.json_output {
            JsonMessage::FileFailed {
                path: media.to_path_buf(),
                error: message.to_string(),
            }
            .emit();
        }
        if let Some(ref bar) = self.bar {
            bar.update(&format!("[FAIL] {}", FileManager::display_name(media)));
        }
    }

    /// A failure during stage A only drops the proxy, the file still gets analyzed
    pub fn record_transcode_error(&mut self, media: &Path, message: &str) {
        let entry = format!("{}: {}", FileManager::display_name(media), message);
        error!("{}", entry);
        self.errors.push(entry);
    }

    pub fn record_transcoded(&mut self) {
        self.summary.add_transcoded();
    }

    pub fn file_complete(&mut self, media: &Path, sidecar: &Path) {
        self.summary.add_analyzed();
        if self.json_output {
            JsonMessage::FileComplete {
                path: media.to_path_buf(),
                sidecar: sidecar.to_path_buf(),
            }
            .emit();
        }
        if let Some(ref bar) = self.bar {
            bar.update(&format!("[OK] {}", FileManager::display_name(media)));
        }
    }

    /// Write the terminal record and return it
    pub fn finish(&self, completed: usize) -> ProgressRecord {
        let record = self.record(RunStatus::Complete, None, None, completed);
        if let Err(e) = self.store.write(&record) {
            warn!("Failed to write progress record {}: {}", self.store.path().display(), e);
        }

        if let Some(ref bar) = self.bar {
            bar.finish(&self.summary.format_summary());
        }
        if self.json_output {
            JsonMessage::Complete {
                summary: self.summary.clone(),
                errors: self.errors.clone(),
                duration_seconds: self.started.elapsed().as_secs_f64(),
            }
            .emit();
        }
        record
    }

    fn record(
        &self,
        status: RunStatus,
        current_file: Option<String>,
        current_step: Option<IngestStep>,
        completed: usize,
    ) -> ProgressRecord {
        ProgressRecord {
            status,
            current_file,
            current_step,
            completed,
            total: self.summary.total,
            errors: self.errors.clone(),
        }
    }

    fn write(
        &self,
        status: RunStatus,
        current_file: Option<String>,
        current_step: Option<IngestStep>,
        completed: usize,
    ) {
        let record = self.record(status, current_file, current_step, completed);
        if let Err(e) = self.store.write(&record) {
            warn!("Failed to write progress record {}: {}", self.store.path().display(), e);
        }
    }
}
