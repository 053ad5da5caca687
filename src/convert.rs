//! Per-file conversion: one [`ConversionRequest`] in, one
//! [`ConversionOutcome`] out.
//!
//! [`Pipeline::run`] never returns an error. Every stage reports failures as
//! [`DocrError`], and the run boundary folds them into the outcome so the
//! batch driver can carry on with the next file.
//!
//! ```text
//! classify ─► input check ─► overwrite check ─► normalise ─┬─► OCR ─► extract ─┐
//!                                  │                       └─(text)────────────┤
//!                                  └─► Skipped                     sanitise ◄──┘
//!                                                                     │
//!                                                               atomic write
//! ```

use crate::config::ConversionConfig;
use crate::error::{DocrError, ErrorKind};
use crate::output::{ConversionOutcome, OutcomeStatus};
use crate::pipeline::classify::{self, FormatKind};
use crate::pipeline::extract::{ExtractionChain, ExtractionMethod};
use crate::pipeline::normalize::{
    self, DocumentConverter, ImageConverter, LibreOfficeConverter, Normalized,
    PdfiumImageConverter,
};
use crate::pipeline::ocr::{self, OcrEngine, OcrMyPdf, OcrStatus, PdfiumTextLayerProbe, TextLayerProbe};
use crate::pipeline::sanitize::sanitize;
use crate::progress::Stage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One file to convert. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub language: String,
    pub force_ocr: bool,
    pub overwrite: bool,
}

impl ConversionRequest {
    /// A request for `input → output` carrying the per-file knobs of `config`.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, config: &ConversionConfig) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            language: config.language.clone(),
            force_ocr: config.force_ocr,
            overwrite: config.overwrite,
        }
    }
}

/// The collaborators a pipeline run talks to.
#[derive(Clone)]
struct Toolchain {
    ocr_engine: Arc<dyn OcrEngine>,
    probe: Arc<dyn TextLayerProbe>,
    documents: Arc<dyn DocumentConverter>,
    images: Arc<dyn ImageConverter>,
    extraction: ExtractionChain,
}

/// Pick each collaborator: the configured override if present, otherwise
/// the built-in implementation configured from the plain settings.
fn resolve_toolchain(config: &ConversionConfig) -> Toolchain {
    let ocr_engine = match config.ocr_engine {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(OcrMyPdf::new(config.ocr.clone())) as Arc<dyn OcrEngine>,
    };
    let probe = match config.text_layer_probe {
        Some(ref probe) => Arc::clone(probe),
        None => Arc::new(PdfiumTextLayerProbe) as Arc<dyn TextLayerProbe>,
    };
    let documents = match config.document_converter {
        Some(ref conv) => Arc::clone(conv),
        None => Arc::new(LibreOfficeConverter::new(config.office_binary.clone()))
            as Arc<dyn DocumentConverter>,
    };
    let images = match config.image_converter {
        Some(ref conv) => Arc::clone(conv),
        None => Arc::new(PdfiumImageConverter {
            dpi: config.image_dpi,
        }) as Arc<dyn ImageConverter>,
    };
    let extraction = match config.extractors {
        Some(ref chain) => ExtractionChain::new(chain.clone()),
        None => ExtractionChain::default(),
    };

    Toolchain {
        ocr_engine,
        probe,
        documents,
        images,
        extraction,
    }
}

/// What a run learned before it finished or failed.
#[derive(Debug, Default)]
struct RunTrace {
    ocr_status: Option<OcrStatus>,
    ocr_error: Option<String>,
    extraction_method: Option<ExtractionMethod>,
    used_fallback: bool,
    diagnostics: Vec<String>,
}

enum Disposition {
    Written,
    Skipped,
}

/// Runs requests through classify → normalise → OCR → extract → sanitise → write.
pub struct Pipeline {
    config: ConversionConfig,
    tools: Toolchain,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("extraction", &self.tools.extraction)
            .finish()
    }
}

impl Pipeline {
    pub fn new(config: ConversionConfig) -> Self {
        let tools = resolve_toolchain(&config);
        Self { config, tools }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert one file. Never fails; see the returned outcome.
    pub async fn run(&self, request: &ConversionRequest) -> ConversionOutcome {
        let start = Instant::now();
        let format = FormatKind::from_path(&request.input);
        let mut trace = RunTrace::default();

        info!("Converting {}", request.input.display());
        let result = self.execute(request, &mut trace).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut outcome = match result {
            Ok(Disposition::Skipped) => {
                info!(
                    "Skipping {} (output exists, use --overwrite to replace)",
                    request.output.display()
                );
                return ConversionOutcome::skipped(request.clone(), format);
            }
            Ok(Disposition::Written) => {
                let degraded = trace.ocr_status == Some(OcrStatus::Failed) || trace.used_fallback;
                let status = if degraded {
                    OutcomeStatus::Degraded
                } else {
                    OutcomeStatus::Succeeded
                };
                info!(
                    "{} → {} ({}, {}ms)",
                    request.input.display(),
                    request.output.display(),
                    status,
                    duration_ms
                );
                ConversionOutcome {
                    request: request.clone(),
                    status,
                    success: true,
                    format,
                    error_kind: trace.ocr_error.as_ref().map(|_| ErrorKind::Ocr),
                    error_message: trace.ocr_error.take(),
                    output_written: true,
                    ocr_status: None,
                    extraction_method: None,
                    diagnostics: Vec::new(),
                    duration_ms,
                }
            }
            Err(e) => {
                warn!("Failed to convert {}: {}", request.input.display(), e);
                ConversionOutcome::failed(request.clone(), format, &e)
            }
        };

        outcome.ocr_status = trace.ocr_status;
        outcome.extraction_method = trace.extraction_method;
        outcome.diagnostics = trace.diagnostics;
        outcome.duration_ms = duration_ms;
        outcome
    }

    fn stage(&self, input: &Path, stage: Stage) {
        debug!("{}: {}", input.display(), stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage(input, stage);
        }
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        trace: &mut RunTrace,
    ) -> Result<Disposition, DocrError> {
        // ── Step 1: Classify (no side effects) ───────────────────────────
        let classified = classify::classify(&request.input)?;
        check_readable(&request.input).await?;

        // ── Step 2: Overwrite policy ─────────────────────────────────────
        if !request.overwrite && tokio::fs::try_exists(&request.output).await.unwrap_or(false) {
            return Ok(Disposition::Skipped);
        }

        // Dropped at the end of this function, success or failure.
        let workspace = tempfile::Builder::new()
            .prefix("docr-")
            .tempdir()
            .map_err(|e| DocrError::Internal(format!("Cannot create workspace: {e}")))?;
        let workdir = workspace.path();

        // ── Step 3: Normalise ────────────────────────────────────────────
        self.stage(&request.input, Stage::Normalize);
        let normalized = normalize::normalize(
            &classified,
            workdir,
            self.tools.images.as_ref(),
            self.tools.documents.as_ref(),
        )
        .await?;

        let raw = match normalized {
            Normalized::Markdown(text) => {
                trace.ocr_status = Some(OcrStatus::NotRun);
                text
            }
            Normalized::Pdf(pdf) => {
                // ── Step 4: OCR ──────────────────────────────────────────
                self.stage(&request.input, Stage::Ocr);
                let ocr_result = ocr::apply_ocr(
                    self.tools.ocr_engine.as_ref(),
                    self.tools.probe.as_ref(),
                    &pdf,
                    workdir,
                    &request.language,
                    request.force_ocr,
                )
                .await?;
                trace.ocr_status = Some(ocr_result.status);
                if let Some(ref e) = ocr_result.error {
                    trace.diagnostics.push(format!("OCR failed, used original PDF: {e}"));
                    trace.ocr_error = Some(e.to_string());
                }

                // ── Step 5: Extract ──────────────────────────────────────
                self.stage(&request.input, Stage::Extract);
                let extraction = self.tools.extraction.run(&ocr_result.pdf).await;
                if !extraction.success {
                    return Err(DocrError::Extraction {
                        path: request.input.clone(),
                        detail: extraction.attempts_summary(),
                    });
                }
                trace.extraction_method = extraction.method;
                if extraction.used_fallback() {
                    trace.used_fallback = true;
                    trace
                        .diagnostics
                        .push(format!("fallback extraction: {}", extraction.attempts_summary()));
                }
                extraction.markdown
            }
        };

        // ── Step 6: Sanitise ─────────────────────────────────────────────
        self.stage(&request.input, Stage::Sanitize);
        let markdown = sanitize(&raw, self.config.sanitize);
        if markdown.is_empty() {
            return Err(DocrError::Extraction {
                path: request.input.clone(),
                detail: "no printable text left after sanitising".to_string(),
            });
        }

        // ── Step 7: Write ────────────────────────────────────────────────
        self.stage(&request.input, Stage::Write);
        write_markdown(&request.output, &markdown).await?;
        Ok(Disposition::Written)
    }
}

/// Convert a single file with `config`.
pub async fn convert_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> ConversionOutcome {
    let request = ConversionRequest::new(input.as_ref(), output.as_ref(), config);
    Pipeline::new(config.clone()).run(&request).await
}

/// Write `markdown` to `path`, creating parent directories.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// half-written output behind.
pub async fn write_markdown(path: &Path, markdown: &str) -> Result<(), DocrError> {
    let write_failed = |source: std::io::Error| DocrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown)
        .await
        .map_err(write_failed)?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    Ok(())
}

async fn check_readable(path: &Path) -> Result<(), DocrError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(DocrError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(DocrError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(DocrError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::pipeline::extract::ExtractionStrategy;
    use crate::pipeline::ocr::OcrMode;
    use crate::pipeline::pdf::TextCoverage;
    use async_trait::async_trait;

    struct PassThroughOcr {
        fail: bool,
    }

    #[async_trait]
    impl OcrEngine for PassThroughOcr {
        fn name(&self) -> &str {
            "fake"
        }

        async fn recognize(
            &self,
            input: &Path,
            _output: &Path,
            _language: &str,
            _mode: OcrMode,
        ) -> Result<PathBuf, OcrError> {
            if self.fail {
                Err(OcrError::EngineFailed {
                    code: Some(2),
                    detail: "crashed".into(),
                })
            } else {
                Ok(input.to_path_buf())
            }
        }
    }

    struct NoText;

    #[async_trait]
    impl TextLayerProbe for NoText {
        async fn coverage(&self, _pdf: &Path) -> Result<TextCoverage, DocrError> {
            Ok(TextCoverage {
                pages: 1,
                pages_with_text: 0,
            })
        }
    }

    struct Canned(ExtractionMethod, &'static str);

    #[async_trait]
    impl ExtractionStrategy for Canned {
        fn method(&self) -> ExtractionMethod {
            self.0
        }

        async fn extract(&self, _pdf: &Path) -> Result<String, DocrError> {
            Ok(self.1.to_string())
        }
    }

    fn pipeline(ocr_fails: bool, primary: &'static str) -> Pipeline {
        let config = ConversionConfig::builder()
            .ocr_engine(Arc::new(PassThroughOcr { fail: ocr_fails }))
            .text_layer_probe(Arc::new(NoText))
            .extractors(vec![
                Arc::new(Canned(ExtractionMethod::Structured, primary)),
                Arc::new(Canned(ExtractionMethod::PlainText, "plain words")),
            ])
            .build()
            .unwrap();
        Pipeline::new(config)
    }

    fn request(dir: &Path, name: &str) -> ConversionRequest {
        let input = dir.join(name);
        ConversionRequest::new(&input, input.with_extension("md"), &ConversionConfig::default())
    }

    #[tokio::test]
    async fn pdf_converts_and_writes_sanitised_markdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-1.7").unwrap();
        let req = request(dir.path(), "a.pdf");

        let outcome = pipeline(false, "# Title  \n\n\n\n\nBody \u{2014}").run(&req).await;
        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert!(outcome.output_written);
        assert_eq!(outcome.ocr_status, Some(OcrStatus::Applied));
        assert_eq!(outcome.extraction_method, Some(ExtractionMethod::Structured));
        let written = std::fs::read_to_string(&req.output).unwrap();
        assert_eq!(written, "# Title\n\n\nBody\n");
        assert!(!dir.path().join("a.md.tmp").exists());
    }

    #[tokio::test]
    async fn ocr_failure_is_degraded_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-1.7").unwrap();
        let outcome = pipeline(true, "text").run(&request(dir.path(), "a.pdf")).await;
        assert_eq!(outcome.status, OutcomeStatus::Degraded);
        assert!(outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Ocr));
        assert_eq!(outcome.ocr_status, Some(OcrStatus::Failed));
    }

    #[tokio::test]
    async fn fallback_extraction_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-1.7").unwrap();
        let outcome = pipeline(false, "   ").run(&request(dir.path(), "a.pdf")).await;
        assert_eq!(outcome.status, OutcomeStatus::Degraded);
        assert_eq!(outcome.extraction_method, Some(ExtractionMethod::PlainText));
        assert!(outcome.diagnostics.iter().any(|d| d.contains("structured: empty")));
    }

    #[tokio::test]
    async fn text_input_skips_ocr_and_extraction() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "caf\u{e9} notes\r\n").unwrap();
        let req = request(dir.path(), "notes.txt");
        let outcome = pipeline(true, "unused").run(&req).await;
        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert_eq!(outcome.ocr_status, Some(OcrStatus::NotRun));
        assert_eq!(outcome.extraction_method, None);
        assert_eq!(std::fs::read_to_string(&req.output).unwrap(), "caf notes\n");
    }

    #[tokio::test]
    async fn unsupported_input_fails_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.xyz"), b"data").unwrap();
        let req = request(dir.path(), "a.xyz");
        let outcome = pipeline(false, "text").run(&req).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error_kind, Some(ErrorKind::UnsupportedFormat));
        assert!(!req.output.exists());
    }

    #[tokio::test]
    async fn missing_input_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = pipeline(false, "text").run(&request(dir.path(), "gone.pdf")).await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::Input));
    }

    #[tokio::test]
    async fn existing_output_is_skipped_unless_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-1.7").unwrap();
        let mut req = request(dir.path(), "a.pdf");
        std::fs::write(&req.output, "keep me").unwrap();

        let outcome = pipeline(false, "new").run(&req).await;
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert_eq!(std::fs::read_to_string(&req.output).unwrap(), "keep me");

        req.overwrite = true;
        let outcome = pipeline(false, "new").run(&req).await;
        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert_eq!(std::fs::read_to_string(&req.output).unwrap(), "new\n");
    }

    #[tokio::test]
    async fn write_markdown_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("deep/er/out.md");
        write_markdown(&out, "x\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "x\n");
    }
}
