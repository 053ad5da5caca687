//! # docr
//!
//! Convert PDFs, scanned images, office documents and plain text into
//! sanitised Markdown that is safe to feed to a language model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input
//!  │
//!  ├─ 1. Classify   extension → PDF / Image / Office / Text
//!  ├─ 2. Normalize  image → PDF (pdfium), office → PDF (LibreOffice)
//!  ├─ 3. OCR        ocrmypdf adds a text layer (forced by default)
//!  ├─ 4. Extract    structured text, falling back to plain page text
//!  ├─ 5. Sanitize   printable ASCII only, tidy blank lines
//!  └─ 6. Write      atomic `.md` output
//! ```
//!
//! Plain-text inputs skip steps 3 and 4. A failed OCR run does not fail the
//! file: extraction reads the original PDF and the outcome is marked
//! degraded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docr::{run_batch, ConversionConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().language("eng+deu").build()?;
//!     let report = run_batch(Path::new("scans/"), Path::new("markdown/"), &config).await?;
//!     eprintln!("{}", report.summary);
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## External Tools
//!
//! | Tool | Used for | Override |
//! |------|----------|----------|
//! | `ocrmypdf` (+ Tesseract) | OCR | [`ConversionConfigBuilder::ocr_engine`] |
//! | `libreoffice` | `.docx/.doc/.odt/.rtf` → PDF | [`ConversionConfigBuilder::document_converter`] |
//! | libpdfium | image → PDF, text layer | [`ConversionConfigBuilder::image_converter`], [`ConversionConfigBuilder::extractors`] |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docr` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{plan_requests, run_batch, run_requests};
pub use config::{ConversionConfig, ConversionConfigBuilder, OcrSettings, SanitizePolicy};
pub use convert::{convert_file, write_markdown, ConversionRequest, Pipeline};
pub use error::{DocrError, ErrorKind, OcrError};
pub use output::{
    AttemptOutcome, BatchReport, BatchSummary, ConversionOutcome, ExtractionAttempt,
    ExtractionResult, OutcomeStatus,
};
pub use pipeline::classify::{classify, supported_extensions, ClassifiedInput, FormatKind};
pub use pipeline::extract::{
    ExtractionChain, ExtractionMethod, ExtractionStrategy, PlainTextExtractor, StructuredExtractor,
};
pub use pipeline::normalize::{
    DocumentConverter, ImageConverter, LibreOfficeConverter, PdfiumImageConverter,
};
pub use pipeline::ocr::{OcrEngine, OcrMode, OcrMyPdf, OcrStatus, PdfiumTextLayerProbe, TextLayerProbe};
pub use pipeline::pdf::TextCoverage;
pub use pipeline::sanitize::sanitize;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
