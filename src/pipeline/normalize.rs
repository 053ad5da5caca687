//! Normalisation: bring every supported input to a PDF (or, for plain text,
//! straight to Markdown).
//!
//! | Kind | Route |
//! |------|-------|
//! | PDF | passed through unchanged |
//! | Image | [`ImageConverter`] → `workdir/input.pdf` |
//! | Office | [`DocumentConverter`] → `workdir/<stem>.pdf` |
//! | Text | read verbatim, bypasses OCR and extraction |
//!
//! Intermediate PDFs are always written inside the per-file working
//! directory so they disappear with it.

use crate::error::DocrError;
use crate::pipeline::classify::{ClassifiedInput, FormatKind};
use crate::pipeline::pdf;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Wraps a raster image into a PDF.
#[async_trait]
pub trait ImageConverter: Send + Sync {
    /// Convert `image` and return the path of the new PDF inside `workdir`.
    async fn convert(&self, image: &Path, workdir: &Path) -> Result<PathBuf, DocrError>;
}

/// Renders an office document to PDF.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `document` and return the path of the new PDF inside `workdir`.
    async fn convert(&self, document: &Path, workdir: &Path) -> Result<PathBuf, DocrError>;
}

/// The normalised form of one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// A PDF ready for OCR.
    Pdf(PathBuf),
    /// Text content that is already Markdown.
    Markdown(String),
}

/// Normalise `input` using the given converters.
pub async fn normalize(
    input: &ClassifiedInput,
    workdir: &Path,
    images: &dyn ImageConverter,
    documents: &dyn DocumentConverter,
) -> Result<Normalized, DocrError> {
    let path = input.path.as_path();
    match input.kind {
        FormatKind::Pdf => Ok(Normalized::Pdf(path.to_path_buf())),
        FormatKind::Image => {
            let pdf = images.convert(path, workdir).await?;
            Ok(Normalized::Pdf(pdf))
        }
        FormatKind::Office => {
            let pdf = documents.convert(path, workdir).await?;
            Ok(Normalized::Pdf(pdf))
        }
        FormatKind::Text => read_text(path).await.map(Normalized::Markdown),
        FormatKind::Unsupported => Err(DocrError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            supported: crate::pipeline::classify::supported_extensions().join(", "),
        }),
    }
}

/// Read a text file, replacing invalid UTF-8 sequences.
pub async fn read_text(path: &Path) -> Result<String, DocrError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DocrError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => DocrError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DocrError::Normalization {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ── Images ───────────────────────────────────────────────────────────────

/// Builds a one-page PDF with pdfium, sizing the page from the image DPI.
#[derive(Debug, Clone, Copy)]
pub struct PdfiumImageConverter {
    pub dpi: u32,
}

impl Default for PdfiumImageConverter {
    fn default() -> Self {
        Self { dpi: 300 }
    }
}

#[async_trait]
impl ImageConverter for PdfiumImageConverter {
    async fn convert(&self, image: &Path, workdir: &Path) -> Result<PathBuf, DocrError> {
        let out = workdir.join("input.pdf");
        pdf::image_to_pdf(image, &out, self.dpi).await?;
        Ok(out)
    }
}

// ── Office documents ─────────────────────────────────────────────────────

/// Headless LibreOffice (`soffice --convert-to pdf`).
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    pub binary: String,
}

impl Default for LibreOfficeConverter {
    fn default() -> Self {
        Self {
            binary: "libreoffice".to_string(),
        }
    }
}

impl LibreOfficeConverter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Command line for one conversion. Each run gets a private profile under
    /// `workdir`; headless LibreOffice exits without converting when another
    /// instance holds the shared one.
    pub fn args(&self, document: &Path, workdir: &Path) -> Vec<String> {
        vec![
            format!("-env:UserInstallation={}", profile_url(workdir)),
            "--headless".to_string(),
            "--convert-to".to_string(),
            "pdf".to_string(),
            "--outdir".to_string(),
            workdir.to_string_lossy().into_owned(),
            document.to_string_lossy().into_owned(),
        ]
    }
}

/// `file://` URL of the per-run LibreOffice profile directory.
fn profile_url(workdir: &Path) -> String {
    let dir = workdir.join("lo-profile");
    let mut url = String::from("file://");
    for c in dir.to_string_lossy().chars() {
        match c {
            '\\' => url.push('/'),
            ' ' => url.push_str("%20"),
            '%' => url.push_str("%25"),
            '#' => url.push_str("%23"),
            '?' => url.push_str("%3F"),
            c => url.push(c),
        }
    }
    if !url[7..].starts_with('/') {
        url.insert(7, '/');
    }
    url
}

#[async_trait]
impl DocumentConverter for LibreOfficeConverter {
    async fn convert(&self, document: &Path, workdir: &Path) -> Result<PathBuf, DocrError> {
        let failed = |detail: String| DocrError::Normalization {
            path: document.to_path_buf(),
            detail,
        };

        debug!("{} converting {}", self.binary, document.display());
        let output = Command::new(&self.binary)
            .args(self.args(document, workdir))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DocrError::ToolUnavailable {
                    tool: self.binary.clone(),
                    detail: e.to_string(),
                },
                _ => failed(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let stem = document
            .file_stem()
            .ok_or_else(|| failed("input has no file name".to_string()))?;
        let pdf = workdir.join(format!("{}.pdf", stem.to_string_lossy()));
        if !pdf.exists() {
            return Err(failed(format!("no PDF produced at {}", pdf.display())));
        }

        info!("Converted {} to PDF", document.display());
        Ok(pdf)
    }
}
