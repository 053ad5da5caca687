//! Format classification: map an input path to the conversion route it takes.
//!
//! Classification is purely extension-based and case-insensitive. Content is
//! never sniffed here: a `.png` that is not a PNG fails later in the image
//! converter with a decoder error.

use crate::error::DocrError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The conversion route an input takes through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Already a PDF; goes straight to OCR.
    Pdf,
    /// Raster image; wrapped into a single-page PDF first.
    Image,
    /// Word-processor document; converted by the office suite.
    Office,
    /// Plain text; bypasses PDF, OCR and extraction entirely.
    Text,
    /// Anything else.
    Unsupported,
}

const PDF_EXTENSIONS: &[&str] = &["pdf"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "bmp"];
const OFFICE_EXTENSIONS: &[&str] = &["docx", "doc", "odt", "rtf"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "csv"];

impl FormatKind {
    /// Classify a bare extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        let ext = ext.as_str();
        if PDF_EXTENSIONS.contains(&ext) {
            FormatKind::Pdf
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            FormatKind::Image
        } else if OFFICE_EXTENSIONS.contains(&ext) {
            FormatKind::Office
        } else if TEXT_EXTENSIONS.contains(&ext) {
            FormatKind::Text
        } else {
            FormatKind::Unsupported
        }
    }

    /// Classify a path by its extension.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(FormatKind::Unsupported)
    }

    pub fn is_supported(self) -> bool {
        self != FormatKind::Unsupported
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FormatKind::Pdf => "pdf",
            FormatKind::Image => "image",
            FormatKind::Office => "office",
            FormatKind::Text => "text",
            FormatKind::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// An input path together with its classification. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedInput {
    pub path: PathBuf,
    pub kind: FormatKind,
}

/// Classify `path`, failing fast on unsupported extensions.
///
/// No filesystem access happens here; the caller has not done any
/// conversion work yet when this returns an error.
pub fn classify(path: &Path) -> Result<ClassifiedInput, DocrError> {
    let kind = FormatKind::from_path(path);
    if !kind.is_supported() {
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| "(none)".to_string());
        return Err(DocrError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
            supported: supported_extensions().join(", "),
        });
    }
    Ok(ClassifiedInput {
        path: path.to_path_buf(),
        kind,
    })
}

/// Every accepted extension, with its leading dot, in classifier order.
pub fn supported_extensions() -> Vec<String> {
    PDF_EXTENSIONS
        .iter()
        .chain(IMAGE_EXTENSIONS)
        .chain(TEXT_EXTENSIONS)
        .chain(OFFICE_EXTENSIONS)
        .map(|e| format!(".{e}"))
        .collect()
}

/// Whether `path` has an extension the pipeline can convert.
pub fn is_supported(path: &Path) -> bool {
    FormatKind::from_path(path).is_supported()
}
