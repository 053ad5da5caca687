//! End-to-end batch tests with fake collaborators.
//!
//! "PDFs" here are plain UTF-8 files: the fake converters copy bytes, the
//! fake OCR engine copies its input, and the fake extractors read the text
//! back. No pdfium, ocrmypdf or LibreOffice is needed.

use async_trait::async_trait;
use docr::pipeline::extract::structure_page;
use docr::{
    plan_requests, run_batch, run_requests, BatchProgressCallback, ConversionConfig,
    ConversionConfigBuilder, ConversionOutcome, DocrError, DocumentConverter, ErrorKind,
    ExtractionMethod, ExtractionStrategy, ImageConverter, OcrEngine, OcrError, OcrMode, OcrStatus,
    OutcomeStatus, Pipeline, Stage, TextCoverage, TextLayerProbe,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

struct CopyingDocumentConverter;

#[async_trait]
impl DocumentConverter for CopyingDocumentConverter {
    async fn convert(&self, document: &Path, workdir: &Path) -> Result<PathBuf, DocrError> {
        let stem = document.file_stem().unwrap().to_string_lossy().into_owned();
        let pdf = workdir.join(format!("{stem}.pdf"));
        tokio::fs::copy(document, &pdf).await.unwrap();
        Ok(pdf)
    }
}

struct CopyingImageConverter;

#[async_trait]
impl ImageConverter for CopyingImageConverter {
    async fn convert(&self, image: &Path, workdir: &Path) -> Result<PathBuf, DocrError> {
        let pdf = workdir.join("input.pdf");
        tokio::fs::copy(image, &pdf).await.unwrap();
        Ok(pdf)
    }
}

#[derive(Default)]
struct CountingOcr {
    calls: AtomicUsize,
}

#[async_trait]
impl OcrEngine for CountingOcr {
    fn name(&self) -> &str {
        "counting"
    }

    async fn recognize(
        &self,
        input: &Path,
        output: &Path,
        language: &str,
        _mode: OcrMode,
    ) -> Result<PathBuf, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if language == "xxx" {
            return Err(OcrError::UnknownLanguage {
                language: language.to_string(),
                detail: "no traineddata".into(),
            });
        }
        tokio::fs::copy(input, output).await.unwrap();
        Ok(output.to_path_buf())
    }
}

struct FullTextLayer;

#[async_trait]
impl TextLayerProbe for FullTextLayer {
    async fn coverage(&self, _pdf: &Path) -> Result<TextCoverage, DocrError> {
        Ok(TextCoverage {
            pages: 2,
            pages_with_text: 2,
        })
    }
}

/// Structure recovery over the file's text.
struct TextStructured;

#[async_trait]
impl ExtractionStrategy for TextStructured {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Structured
    }

    async fn extract(&self, pdf: &Path) -> Result<String, DocrError> {
        let text = tokio::fs::read_to_string(pdf).await.unwrap_or_default();
        Ok(structure_page(&text))
    }
}

/// A structured extractor that never finds anything.
struct BlindStructured;

#[async_trait]
impl ExtractionStrategy for BlindStructured {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Structured
    }

    async fn extract(&self, _pdf: &Path) -> Result<String, DocrError> {
        Ok(String::new())
    }
}

struct TextPlain;

#[async_trait]
impl ExtractionStrategy for TextPlain {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PlainText
    }

    async fn extract(&self, pdf: &Path) -> Result<String, DocrError> {
        Ok(tokio::fs::read_to_string(pdf).await.unwrap_or_default())
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl BatchProgressCallback for EventLog {
    fn on_batch_start(&self, total_files: usize) {
        self.events.lock().unwrap().push(format!("batch {total_files}"));
    }

    fn on_file_start(&self, index: usize, _total: usize, _input: &Path) {
        self.events.lock().unwrap().push(format!("start {index}"));
    }

    fn on_stage(&self, _input: &Path, stage: Stage) {
        self.events.lock().unwrap().push(stage.to_string());
    }

    fn on_file_complete(&self, index: usize, _total: usize, outcome: &ConversionOutcome) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {index} {}", outcome.status));
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("end {succeeded}/{failed}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const REPORT_DOCX: &str = "QUARTERLY REPORT\n\
Revenue grew by ten per-\n\
cent this quarter.\n\
\n\
\u{2022} North\n\
\u{2022} South\n";

const REPORT_MD: &str = "## QUARTERLY REPORT\n\n\
Revenue grew by ten percent this quarter.\n\n\
- North\n\
- South\n";

fn builder_with(ocr: Arc<CountingOcr>) -> ConversionConfigBuilder {
    ConversionConfig::builder()
        .ocr_engine(ocr)
        .text_layer_probe(Arc::new(FullTextLayer))
        .document_converter(Arc::new(CopyingDocumentConverter))
        .image_converter(Arc::new(CopyingImageConverter))
        .extractors(vec![Arc::new(TextStructured), Arc::new(TextPlain)])
}

fn config() -> ConversionConfig {
    builder_with(Arc::new(CountingOcr::default())).build().unwrap()
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn report_docx_converts_end_to_end() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let input = write(src.path(), "report.docx", REPORT_DOCX);
    let output = out.path().join("report.md");

    let report = run_batch(&input, &output, &config()).await.unwrap();

    assert_eq!(report.exit_code(), 0);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.ocr_status, Some(OcrStatus::Applied));
    assert_eq!(outcome.extraction_method, Some(ExtractionMethod::Structured));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), REPORT_MD);
}

#[tokio::test]
async fn empty_scan_fails_and_batch_continues() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "empty-scan.png", "  \n\n");
    write(src.path(), "report.docx", REPORT_DOCX);

    let report = run_batch(src.path(), out.path(), &config()).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    let scan = &report.outcomes[0];
    assert!(scan.request.input.ends_with("empty-scan.png"));
    assert_eq!(scan.status, OutcomeStatus::Failed);
    assert_eq!(scan.error_kind, Some(ErrorKind::Extraction));
    assert!(!out.path().join("empty-scan.md").exists());

    assert_eq!(report.outcomes[1].status, OutcomeStatus::Succeeded);
    assert_eq!(
        std::fs::read_to_string(out.path().join("report.md")).unwrap(),
        REPORT_MD
    );
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn second_run_without_overwrite_skips_and_keeps_content() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let input = write(src.path(), "notes.txt", "first version\n");
    let output = out.path().join("notes.md");

    let first = run_batch(&input, &output, &config()).await.unwrap();
    assert_eq!(first.outcomes[0].status, OutcomeStatus::Succeeded);

    write(src.path(), "notes.txt", "second version\n");
    let second = run_batch(&input, &output, &config()).await.unwrap();
    assert_eq!(second.outcomes[0].status, OutcomeStatus::Skipped);
    assert_eq!(second.summary.skipped, 1);
    assert_eq!(second.exit_code(), 0);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "first version\n");

    let overwrite = builder_with(Arc::new(CountingOcr::default()))
        .overwrite(true)
        .build()
        .unwrap();
    let third = run_batch(&input, &output, &overwrite).await.unwrap();
    assert_eq!(third.outcomes[0].status, OutcomeStatus::Succeeded);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "second version\n");
}

#[tokio::test]
async fn forced_ocr_always_runs_engine() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let input = write(src.path(), "doc.pdf", "Searchable text.");

    let ocr = Arc::new(CountingOcr::default());
    let config = builder_with(ocr.clone()).force_ocr(true).build().unwrap();
    let report = run_batch(&input, &out.path().join("doc.md"), &config)
        .await
        .unwrap();

    assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.outcomes[0].ocr_status, Some(OcrStatus::Applied));
}

#[tokio::test]
async fn unforced_ocr_skips_engine_when_text_layer_is_complete() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let input = write(src.path(), "doc.pdf", "Searchable text.");

    let ocr = Arc::new(CountingOcr::default());
    let config = builder_with(ocr.clone()).force_ocr(false).build().unwrap();
    let report = run_batch(&input, &out.path().join("doc.md"), &config)
        .await
        .unwrap();

    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.outcomes[0].ocr_status, Some(OcrStatus::Skipped));
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Succeeded);
}

#[tokio::test]
async fn fallback_extractor_is_used_and_recorded() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let input = write(src.path(), "scan.tiff", "recognised words");

    let config = builder_with(Arc::new(CountingOcr::default()))
        .extractors(vec![Arc::new(BlindStructured), Arc::new(TextPlain)])
        .build()
        .unwrap();
    let report = run_batch(&input, &out.path().join("scan.md"), &config)
        .await
        .unwrap();

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, OutcomeStatus::Degraded);
    assert!(outcome.success);
    assert_eq!(outcome.extraction_method, Some(ExtractionMethod::PlainText));
    assert_eq!(report.summary.degraded, 1);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn batch_is_deterministic_across_runs() {
    let src = tempfile::tempdir().unwrap();
    for name in ["b.pdf", "a.txt", "c/d.docx", "c/a.png", "z.csv"] {
        write(src.path(), name, &format!("Contents of {name}."));
    }
    let config = builder_with(Arc::new(CountingOcr::default()))
        .recursive(true)
        .build()
        .unwrap();

    let out1 = tempfile::tempdir().unwrap();
    let out2 = tempfile::tempdir().unwrap();
    let r1 = run_batch(src.path(), out1.path(), &config).await.unwrap();
    let r2 = run_batch(src.path(), out2.path(), &config).await.unwrap();

    let order = |r: &docr::BatchReport| -> Vec<PathBuf> {
        r.outcomes.iter().map(|o| o.request.input.clone()).collect()
    };
    assert_eq!(order(&r1), order(&r2));
    assert!(order(&r1)[0].ends_with("a.txt"));
    assert_eq!(r1.summary, r2.summary);

    for o in &r1.outcomes {
        let rel = o.request.output.strip_prefix(out1.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&o.request.output).unwrap(),
            std::fs::read_to_string(out2.path().join(rel)).unwrap()
        );
    }
    assert!(out1.path().join("c/d.md").exists());
}

#[tokio::test]
async fn unknown_language_fails_file_as_config_error() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "a.pdf", "text");
    write(src.path(), "b.txt", "plain");

    let config = builder_with(Arc::new(CountingOcr::default()))
        .language("xxx")
        .build()
        .unwrap();
    let report = run_batch(src.path(), out.path(), &config).await.unwrap();

    assert_eq!(report.outcomes[0].error_kind, Some(ErrorKind::Config));
    // Text input never reaches OCR.
    assert_eq!(report.outcomes[1].status, OutcomeStatus::Succeeded);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn unsupported_single_file_fails_fast() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let input = write(src.path(), "data.xyz", "?");

    let ocr = Arc::new(CountingOcr::default());
    let config = builder_with(ocr.clone()).build().unwrap();
    let report = run_batch(&input, &out.path().join("data.md"), &config)
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].error_kind, Some(ErrorKind::UnsupportedFormat));
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    assert!(!out.path().join("data.md").exists());
}

#[tokio::test]
async fn directory_without_supported_files_is_a_planning_error() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "readme.xyz", "?");
    let err = run_batch(src.path(), Path::new("/unused"), &config())
        .await
        .unwrap_err();
    assert!(matches!(err, DocrError::NoSupportedFiles { .. }));
}

#[tokio::test]
async fn progress_events_arrive_in_order() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "a.pdf", "Alpha.");
    write(src.path(), "b.txt", "Beta.");

    let log = Arc::new(EventLog::default());
    let config = builder_with(Arc::new(CountingOcr::default()))
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let requests = plan_requests(src.path(), out.path(), &config).unwrap();
    run_requests(&Pipeline::new(config), &requests).await;

    assert_eq!(
        *log.events.lock().unwrap(),
        vec![
            "batch 2",
            "start 0",
            "normalize",
            "ocr",
            "extract",
            "sanitize",
            "write",
            "done 0 succeeded",
            "start 1",
            "normalize",
            "sanitize",
            "write",
            "done 1 succeeded",
            "end 2/0",
        ]
    );
}
