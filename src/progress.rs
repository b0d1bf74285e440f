//! # Progress Bar and Run Summary Module
//!
//! Questo modulo gestisce il feedback visivo e il riepilogo di un ingest.
//!
//! ## Responsabilità:
//! - Progress bar con `indicatif` per feedback real-time (solo se richiesta)
//! - `IngestSummary`: contatori del run (analizzati, falliti, già fatti)
//! - Riepilogo finale in una riga
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:12:40] [=========>------------------------------] 3/12 (25%) analyzing A004.mov
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Terminal progress bar over the files of one run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        // Static template, cannot fail to parse
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Advance by one file
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Counters for one ingest run
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    /// Files found in the folder
    pub total: usize,
    /// Files that already had a sidecar when the run started
    pub already_done: usize,
    /// Sidecars written by this run
    pub analyzed: usize,
    /// Files that failed in this run
    pub failed: usize,
    /// Videos uploaded through a proxy
    pub transcoded: usize,
}

impl IngestSummary {
    pub fn new(total: usize, already_done: usize) -> Self {
        Self {
            total,
            already_done,
            ..Default::default()
        }
    }

    pub fn add_analyzed(&mut self) {
        self.analyzed += 1;
    }

    pub fn add_failed(&mut self) {
        self.failed += 1;
    }

    pub fn add_transcoded(&mut self) {
        self.transcoded += 1;
    }

    /// Files with a sidecar at the end of the run
    pub fn completed(&self) -> usize {
        self.already_done + self.analyzed
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Analyzed: {} | Failed: {} | Already done: {} | Proxies: {} | Complete: {}/{}",
            self.analyzed,
            self.failed,
            self.already_done,
            self.transcoded,
            self.completed(),
            self.total
        )
    }
}
