//! Error types for the docr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocrError`]: **fatal for one file.** The file cannot be converted
//!   (unsupported extension, office conversion failed, no text could be
//!   extracted). It never crosses the [`crate::convert::Pipeline::run`]
//!   boundary; it is folded into a [`crate::output::ConversionOutcome`] so the
//!   batch carries on with the next file.
//!
//! * [`OcrError`]: **recoverable.** The OCR engine failed. The pipeline falls
//!   back to the pre-OCR PDF and records the file as degraded. The single
//!   exception is an unknown language code, which is a configuration problem
//!   and becomes [`DocrError::UnknownLanguage`].
//!
//! [`ErrorKind`] is the serialisable tag stored in each outcome.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All per-file errors returned by the docr pipeline stages.
#[derive(Debug, Error)]
pub enum DocrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The extension is not one the classifier knows how to convert.
    #[error("Unsupported file format '{extension}' for '{path}'\nSupported: {supported}")]
    UnsupportedFormat {
        path: PathBuf,
        extension: String,
        supported: String,
    },

    /// Input file was not found at the given path.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// A directory input contained nothing the classifier accepts.
    #[error("No supported files found under '{path}'")]
    NoSupportedFiles { path: PathBuf },

    // ── Normalisation errors ──────────────────────────────────────────────
    /// Image or office document could not be turned into a PDF.
    #[error("Failed to convert '{path}' to PDF: {detail}")]
    Normalization { path: PathBuf, detail: String },

    /// An external converter binary is missing from PATH.
    #[error("'{tool}' is not available: {detail}\nInstall it or point docr at it with the matching --*-bin option.")]
    ToolUnavailable { tool: String, detail: String },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR engine rejected the language code.
    #[error("OCR language '{language}' is not recognised: {detail}\nList installed languages with: tesseract --list-langs")]
    UnknownLanguage { language: String, detail: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Every extraction strategy produced empty text or failed.
    #[error("No text could be extracted from '{path}': {detail}")]
    Extraction { path: PathBuf, detail: String },

    /// pdfium could not open the PDF.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or set PDFIUM_LIB_PATH to the\n\
directory (or file) containing it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocrError {
    /// The taxonomy tag recorded in [`crate::output::ConversionOutcome`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocrError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            DocrError::FileNotFound { .. }
            | DocrError::PermissionDenied { .. }
            | DocrError::NoSupportedFiles { .. } => ErrorKind::Input,
            DocrError::Normalization { .. } | DocrError::ToolUnavailable { .. } => {
                ErrorKind::Normalization
            }
            DocrError::UnknownLanguage { .. } | DocrError::InvalidConfig(_) => ErrorKind::Config,
            DocrError::Extraction { .. } | DocrError::CorruptPdf { .. } => ErrorKind::Extraction,
            DocrError::OutputWriteFailed { .. } => ErrorKind::OutputWrite,
            DocrError::PdfiumBindingFailed(_) | DocrError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Failure reported by an [`crate::pipeline::ocr::OcrEngine`].
///
/// Everything except [`OcrError::UnknownLanguage`] is recovered by the OCR
/// stage.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The engine does not know the requested language.
    #[error("unknown OCR language '{language}': {detail}")]
    UnknownLanguage { language: String, detail: String },

    /// The engine binary could not be started.
    #[error("OCR engine '{engine}' is not available: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    /// The engine ran and exited unsuccessfully.
    #[error("OCR engine exited with code {code:?}: {detail}")]
    EngineFailed { code: Option<i32>, detail: String },

    /// The engine reported success but produced no output file.
    #[error("OCR engine produced no output at '{path}'")]
    MissingOutput { path: PathBuf },
}

/// Serialisable error taxonomy for per-file outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The classifier rejected the input.
    UnsupportedFormat,
    /// The input is missing or unreadable.
    Input,
    /// Image/office → PDF conversion failed.
    Normalization,
    /// OCR failed; only ever seen on degraded outcomes.
    Ocr,
    /// The OCR language code was rejected.
    Config,
    /// No extraction strategy produced text.
    Extraction,
    /// The Markdown file could not be written.
    OutputWrite,
    /// Anything unexpected.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::Input => "InputError",
            ErrorKind::Normalization => "NormalizationError",
            ErrorKind::Ocr => "OCRError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Extraction => "ExtractionError",
            ErrorKind::OutputWrite => "OutputWriteError",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(s)
    }
}
