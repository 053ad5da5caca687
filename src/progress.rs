//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to follow a
//! batch as it runs: one `on_file_start` / `on_file_complete` pair per input,
//! with `on_stage` in between each time the pipeline enters a new stage.
//!
//! # Example
//!
//! ```rust
//! use docr::{BatchProgressCallback, ConversionConfig, ConversionOutcome};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, outcome: &ConversionOutcome) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{}/{}] {}", index + 1, total, outcome.status);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { finished: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ConversionOutcome;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Pipeline stages reported through [`BatchProgressCallback::on_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Ocr,
    Extract,
    Sanitize,
    Write,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Normalize => "normalize",
            Stage::Ocr => "ocr",
            Stage::Extract => "extract",
            Stage::Sanitize => "sanitize",
            Stage::Write => "write",
        })
    }
}

/// Called by the batch driver and pipeline as files are processed.
///
/// Files are processed one at a time, so calls never overlap; the trait is
/// still `Send + Sync` because the callback lives inside a shared config.
/// Every method has a no-op default.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after the input has been expanded into requests.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file enters the pipeline.
    ///
    /// # Arguments
    /// * `index` — 0-based position in the batch
    /// * `total` — number of files in the batch
    /// * `input` — source path
    fn on_file_start(&self, index: usize, total: usize, input: &Path) {
        let _ = (index, total, input);
    }

    /// Called when the pipeline enters `stage` for `input`.
    fn on_stage(&self, input: &Path, stage: Stage) {
        let _ = (input, stage);
    }

    /// Called once per file with its final outcome, including skips.
    fn on_file_complete(&self, index: usize, total: usize, outcome: &ConversionOutcome) {
        let _ = (index, total, outcome);
    }

    /// Called once after the last file.
    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
