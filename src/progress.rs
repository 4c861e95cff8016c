//! # Progress Tracking and Report Module
//!
//! Questo modulo gestisce il progress tracking e il report finale di un batch.
//!
//! ## Componenti principali:
//! - `ProgressManager`: progress bar `indicatif`, la lunghezza cresce man mano
//!   che il listing scopre nuovi file
//! - `BatchReport`: conteggio di file completati, saltati e falliti
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [=========>------------------------------] 12/48 (25%) photo.jpg
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

use crate::batch::TaskOutcome;

/// Manages progress reporting for a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a visible progress bar; files are added as directories are listed
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Progress manager that never draws
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Account for newly discovered files
    pub fn add_pending(&self, files: u64) {
        self.bar.inc_length(files);
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::hidden()
    }
}

/// A file that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub name: String,
    pub error: String,
}

/// Per-batch summary of task outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<FailedFile>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Succeeded => self.succeeded += 1,
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Failed(error) => {
                self.failed += 1;
                self.failures.push(FailedFile {
                    name: name.to_string(),
                    error: error.clone(),
                });
            }
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Succeeded: {} | Skipped: {} | Failed: {}",
            self.total(),
            self.succeeded,
            self.skipped,
            self.failed
        )
    }
}
