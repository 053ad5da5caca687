//! OCR stage: give the normalised PDF a searchable text layer.
//!
//! ## Force vs. skip
//!
//! With `force_ocr` every page is rasterised and re-recognised, replacing any
//! embedded text. Without it the engine runs in skip-text mode, and when a
//! [`TextLayerProbe`] reports that every page already has text the engine is
//! not started at all.
//!
//! ## Failure policy
//!
//! An engine failure never fails the file. The stage hands back the pre-OCR
//! PDF with [`OcrStatus::Failed`] so extraction can still try the embedded
//! text. The one exception is an unknown language, which is a configuration
//! mistake that would fail identically on retry.

use crate::config::OcrSettings;
use crate::error::{DocrError, OcrError};
use crate::pipeline::pdf::{self, TextCoverage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How the engine treats pages that already carry text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    /// Rasterise and re-OCR every page.
    Force,
    /// Only OCR pages without a text layer.
    SkipText,
}

impl OcrMode {
    pub fn from_force(force: bool) -> Self {
        if force {
            OcrMode::Force
        } else {
            OcrMode::SkipText
        }
    }
}

/// What the OCR stage did for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrStatus {
    /// The engine produced a searchable PDF.
    Applied,
    /// Every page already had text and OCR was not forced.
    Skipped,
    /// The engine failed; extraction used the pre-OCR PDF.
    Failed,
    /// Text inputs never reach the OCR stage.
    NotRun,
}

/// An OCR engine: `(pdf, language, mode) → searchable pdf`.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Recognise `input` and write a searchable PDF to `output`.
    ///
    /// Returns the path of the searchable PDF, normally `output`.
    async fn recognize(
        &self,
        input: &Path,
        output: &Path,
        language: &str,
        mode: OcrMode,
    ) -> Result<PathBuf, OcrError>;
}

/// Reports how many pages of a PDF already carry text.
#[async_trait]
pub trait TextLayerProbe: Send + Sync {
    async fn coverage(&self, pdf: &Path) -> Result<TextCoverage, DocrError>;
}

/// Probe backed by pdfium page text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumTextLayerProbe;

#[async_trait]
impl TextLayerProbe for PdfiumTextLayerProbe {
    async fn coverage(&self, pdf_path: &Path) -> Result<TextCoverage, DocrError> {
        pdf::text_coverage(pdf_path).await
    }
}

/// The result handed to the extraction stage.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// The PDF extraction should read: OCR output, or the input on skip/failure.
    pub pdf: PathBuf,
    pub status: OcrStatus,
    pub error: Option<OcrError>,
}

/// Run the OCR stage over `pdf`, writing any engine output into `workdir`.
///
/// # Errors
/// Only [`DocrError::UnknownLanguage`]; every other engine failure is folded
/// into an [`OcrStatus::Failed`] result.
pub async fn apply_ocr(
    engine: &dyn OcrEngine,
    probe: &dyn TextLayerProbe,
    pdf: &Path,
    workdir: &Path,
    language: &str,
    force: bool,
) -> Result<OcrResult, DocrError> {
    let mode = OcrMode::from_force(force);

    if mode == OcrMode::SkipText {
        match probe.coverage(pdf).await {
            Ok(coverage) if coverage.is_complete() => {
                info!(
                    "All {} pages already have text; skipping OCR for {}",
                    coverage.pages,
                    pdf.display()
                );
                return Ok(OcrResult {
                    pdf: pdf.to_path_buf(),
                    status: OcrStatus::Skipped,
                    error: None,
                });
            }
            Ok(coverage) => debug!(
                "{}/{} pages have text; OCR will fill the rest",
                coverage.pages_with_text, coverage.pages
            ),
            Err(e) => warn!("Text-layer probe failed ({e}); running OCR anyway"),
        }
    }

    let output = workdir.join("ocr_output.pdf");
    debug!(
        "Running {} ({:?}, lang={}) on {}",
        engine.name(),
        mode,
        language,
        pdf.display()
    );

    match engine.recognize(pdf, &output, language, mode).await {
        Ok(searchable) => Ok(OcrResult {
            pdf: searchable,
            status: OcrStatus::Applied,
            error: None,
        }),
        Err(OcrError::UnknownLanguage { language, detail }) => {
            Err(DocrError::UnknownLanguage { language, detail })
        }
        Err(e) => {
            warn!(
                "OCR failed for {}: {e}; extracting from the original PDF",
                pdf.display()
            );
            Ok(OcrResult {
                pdf: pdf.to_path_buf(),
                status: OcrStatus::Failed,
                error: Some(e),
            })
        }
    }
}

// ── ocrmypdf ─────────────────────────────────────────────────────────────

/// The ocrmypdf command-line engine (Tesseract under the hood).
#[derive(Debug, Clone)]
pub struct OcrMyPdf {
    settings: OcrSettings,
}

impl OcrMyPdf {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    /// The argument list passed to the binary, in order.
    pub fn args(&self, input: &Path, output: &Path, language: &str, mode: OcrMode) -> Vec<String> {
        let s = &self.settings;
        let mut args = vec!["-l".to_string(), language.to_string()];
        if s.deskew {
            args.push("--deskew".into());
        }
        if s.clean {
            args.push("--clean".into());
        }
        args.push("--tesseract-timeout".into());
        args.push(s.tesseract_timeout_secs.to_string());
        args.push("--jobs".into());
        args.push(s.jobs.to_string());
        args.push(
            match mode {
                OcrMode::Force => "--force-ocr",
                OcrMode::SkipText => "--skip-text",
            }
            .into(),
        );
        args.push(input.to_string_lossy().into_owned());
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl OcrEngine for OcrMyPdf {
    fn name(&self) -> &str {
        &self.settings.binary
    }

    async fn recognize(
        &self,
        input: &Path,
        output: &Path,
        language: &str,
        mode: OcrMode,
    ) -> Result<PathBuf, OcrError> {
        let result = Command::new(&self.settings.binary)
            .args(self.args(input, output, language, mode))
            .kill_on_drop(true)
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::EngineUnavailable {
                    engine: self.settings.binary.clone(),
                    detail: e.to_string(),
                })
            }
            Err(e) => {
                return Err(OcrError::EngineFailed {
                    code: None,
                    detail: e.to_string(),
                })
            }
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(classify_failure(out.status.code(), &stderr, language));
        }

        if !output.exists() {
            return Err(OcrError::MissingOutput {
                path: output.to_path_buf(),
            });
        }
        Ok(output.to_path_buf())
    }
}

/// Map an ocrmypdf exit status + stderr to an [`OcrError`].
///
/// Exit codes 1 (bad arguments), 3 (missing dependency) and 9 (invalid
/// config) are how ocrmypdf reports a language it has no traineddata for.
fn classify_failure(code: Option<i32>, stderr: &str, language: &str) -> OcrError {
    let lower = stderr.to_ascii_lowercase();
    if matches!(code, Some(1) | Some(3) | Some(9)) && lower.contains("language") {
        return OcrError::UnknownLanguage {
            language: language.to_string(),
            detail: last_lines(stderr, 3),
        };
    }
    OcrError::EngineFailed {
        code,
        detail: last_lines(stderr, 3),
    }
}

/// The last `n` non-blank lines of `text`, joined with " | ".
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}
