//! Result types produced by the pipeline and the batch driver.
//!
//! Everything here derives `Serialize` so a whole [`BatchReport`] can be
//! printed as JSON by the CLI or returned from a library call.

use crate::convert::ConversionRequest;
use crate::error::{DocrError, ErrorKind};
use crate::pipeline::classify::FormatKind;
use crate::pipeline::extract::ExtractionMethod;
use crate::pipeline::ocr::OcrStatus;
use serde::{Deserialize, Serialize};

// ── Extraction ───────────────────────────────────────────────────────────

/// What happened when one strategy was tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Text { chars: usize },
    Empty,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub method: ExtractionMethod,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Output of the extraction stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub markdown: String,
    /// The strategy that produced `markdown`; `None` when all failed.
    pub method: Option<ExtractionMethod>,
    pub success: bool,
    pub attempts: Vec<ExtractionAttempt>,
}

impl ExtractionResult {
    /// True when a strategy other than the first one produced the text.
    pub fn used_fallback(&self) -> bool {
        self.success && self.attempts.len() > 1
    }

    /// One-line description of every attempt, e.g.
    /// `structured: empty; plain_text: error: …`.
    pub fn attempts_summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Text { chars } => format!("{}: {} chars", a.method, chars),
                AttemptOutcome::Empty => format!("{}: empty", a.method),
                AttemptOutcome::Error { message } => format!("{}: error: {}", a.method, message),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Per-file outcome ─────────────────────────────────────────────────────

/// Final state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Converted on the primary path.
    Succeeded,
    /// Converted, but OCR failed or a fallback extractor was needed.
    Degraded,
    /// Nothing was written.
    Failed,
    /// The output already existed and `overwrite` was off.
    Skipped,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutcomeStatus::Succeeded => "succeeded",
            OutcomeStatus::Degraded => "degraded",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Skipped => "skipped",
        })
    }
}

/// The result of running one [`ConversionRequest`] through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub request: ConversionRequest,
    pub status: OutcomeStatus,
    /// True for succeeded and degraded outcomes.
    pub success: bool,
    pub format: FormatKind,
    /// Set on failures, and on degraded outcomes whose OCR failed.
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub output_written: bool,
    pub ocr_status: Option<OcrStatus>,
    pub extraction_method: Option<ExtractionMethod>,
    /// Human-readable notes collected along the way (fallbacks, OCR errors).
    pub diagnostics: Vec<String>,
    pub duration_ms: u64,
}

impl ConversionOutcome {
    /// An outcome for a request whose output already exists.
    pub fn skipped(request: ConversionRequest, format: FormatKind) -> Self {
        Self {
            request,
            status: OutcomeStatus::Skipped,
            success: false,
            format,
            error_kind: None,
            error_message: None,
            output_written: false,
            ocr_status: None,
            extraction_method: None,
            diagnostics: vec!["output exists; use --overwrite to replace".to_string()],
            duration_ms: 0,
        }
    }

    /// An outcome for a request that failed with `err`.
    pub fn failed(request: ConversionRequest, format: FormatKind, err: &DocrError) -> Self {
        Self {
            request,
            status: OutcomeStatus::Failed,
            success: false,
            format,
            error_kind: Some(err.kind()),
            error_message: Some(err.to_string()),
            output_written: false,
            ocr_status: None,
            extraction_method: None,
            diagnostics: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

// ── Batch ────────────────────────────────────────────────────────────────

/// Aggregate counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    /// Includes degraded outcomes.
    pub succeeded: usize,
    pub degraded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[ConversionOutcome]) -> Self {
        let mut s = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for o in outcomes {
            match o.status {
                OutcomeStatus::Succeeded => s.succeeded += 1,
                OutcomeStatus::Degraded => {
                    s.succeeded += 1;
                    s.degraded += 1;
                }
                OutcomeStatus::Failed => s.failed += 1,
                OutcomeStatus::Skipped => s.skipped += 1,
            }
        }
        s
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} succeeded", self.succeeded)?;
        if self.degraded > 0 {
            write!(f, " ({} degraded)", self.degraded)?;
        }
        write!(f, ", {} failed, {} skipped", self.failed, self.skipped)
    }
}

/// All outcomes of one invocation, in processing order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<ConversionOutcome>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn new(outcomes: Vec<ConversionOutcome>) -> Self {
        let summary = BatchSummary::from_outcomes(&outcomes);
        Self { outcomes, summary }
    }

    /// Process exit code: 1 if any file failed, else 0.
    pub fn exit_code(&self) -> i32 {
        if self.summary.failed > 0 {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(name: &str) -> ConversionRequest {
        ConversionRequest {
            input: PathBuf::from(name),
            output: PathBuf::from(name).with_extension("md"),
            language: "eng".into(),
            force_ocr: true,
            overwrite: false,
        }
    }

    fn with_status(status: OutcomeStatus) -> ConversionOutcome {
        let mut o = ConversionOutcome::skipped(request("a.pdf"), FormatKind::Pdf);
        o.status = status;
        o.success = matches!(status, OutcomeStatus::Succeeded | OutcomeStatus::Degraded);
        o
    }

    #[test]
    fn summary_counts_degraded_as_succeeded() {
        let report = BatchReport::new(vec![
            with_status(OutcomeStatus::Succeeded),
            with_status(OutcomeStatus::Degraded),
            with_status(OutcomeStatus::Skipped),
        ]);
        assert_eq!(
            report.summary,
            BatchSummary {
                total: 3,
                succeeded: 2,
                degraded: 1,
                failed: 0,
                skipped: 1,
            }
        );
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.summary.to_string(), "2 succeeded (1 degraded), 0 failed, 1 skipped");
    }

    #[test]
    fn any_failure_sets_exit_code() {
        let report = BatchReport::new(vec![
            with_status(OutcomeStatus::Succeeded),
            with_status(OutcomeStatus::Failed),
        ]);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn failed_outcome_carries_error_kind() {
        let err = DocrError::Extraction {
            path: PathBuf::from("scan.png"),
            detail: "structured: empty; plain_text: empty".into(),
        };
        let o = ConversionOutcome::failed(request("scan.png"), FormatKind::Image, &err);
        assert!(o.is_failure());
        assert_eq!(o.error_kind, Some(ErrorKind::Extraction));
        assert!(!o.output_written);
    }

    #[test]
    fn outcome_serialises_to_json() {
        let o = with_status(OutcomeStatus::Degraded);
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["format"], "pdf");
        assert_eq!(json["request"]["language"], "eng");
    }

    #[test]
    fn attempts_summary_lists_every_attempt() {
        let r = ExtractionResult {
            markdown: "x".into(),
            method: Some(ExtractionMethod::PlainText),
            success: true,
            attempts: vec![
                ExtractionAttempt {
                    method: ExtractionMethod::Structured,
                    outcome: AttemptOutcome::Empty,
                },
                ExtractionAttempt {
                    method: ExtractionMethod::PlainText,
                    outcome: AttemptOutcome::Text { chars: 1 },
                },
            ],
        };
        assert!(r.used_fallback());
        assert_eq!(r.attempts_summary(), "structured: empty; plain_text: 1 chars");
    }
}
