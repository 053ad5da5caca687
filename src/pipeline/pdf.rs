//! In-process PDF access via pdfium: page text, text-layer probing and
//! single-image PDF creation.
//!
//! ## Threading
//!
//! pdfium calls are blocking and not async-safe. Every public function here
//! runs its work on the blocking pool via `spawn_blocking`.
//!
//! ## Library lookup
//!
//! `PDFIUM_LIB_PATH` (a directory or the library file itself) wins; otherwise
//! the working directory is tried, then the system library search path.

use crate::error::DocrError;
use image::GenericImageView;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How many pages of a PDF already carry extractable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCoverage {
    pub pages: usize,
    pub pages_with_text: usize,
}

impl TextCoverage {
    /// True when the document has pages and every one of them has text.
    pub fn is_complete(&self) -> bool {
        self.pages > 0 && self.pages_with_text == self.pages
    }
}

/// Bind to a pdfium shared library.
pub fn bind_pdfium() -> Result<Pdfium, DocrError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(raw) => {
            let path = PathBuf::from(raw);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(&lib)
        }
        None => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DocrError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Extract the raw text of every page, in page order.
pub async fn page_texts(pdf_path: &Path) -> Result<Vec<String>, DocrError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || page_texts_blocking(&path))
        .await
        .map_err(|e| DocrError::Internal(format!("Text extraction task panicked: {}", e)))?
}

/// Extract page text, carrying on past pages whose text cannot be read.
///
/// Binding and opening failures are still errors; a failed page becomes an
/// `Err` holding the reason.
pub async fn page_texts_lenient(pdf_path: &Path) -> Result<Vec<Result<String, String>>, DocrError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, &path)?;
        let texts = document
            .pages()
            .iter()
            .map(|page| page.text().map(|t| t.all()).map_err(|e| format!("{:?}", e)))
            .collect();
        Ok(texts)
    })
    .await
    .map_err(|e| DocrError::Internal(format!("Text extraction task panicked: {}", e)))?
}

/// Count the pages that already have a text layer.
pub async fn text_coverage(pdf_path: &Path) -> Result<TextCoverage, DocrError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let texts = page_texts_blocking(&path)?;
        Ok(TextCoverage {
            pages: texts.len(),
            pages_with_text: texts.iter().filter(|t| !t.trim().is_empty()).count(),
        })
    })
    .await
    .map_err(|e| DocrError::Internal(format!("Text probe task panicked: {}", e)))?
}

/// Write `image_path` as a one-page PDF at `pdf_path`.
///
/// The page is sized so the image renders at `dpi`.
pub async fn image_to_pdf(image_path: &Path, pdf_path: &Path, dpi: u32) -> Result<(), DocrError> {
    let src = image_path.to_path_buf();
    let dst = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || image_to_pdf_blocking(&src, &dst, dpi))
        .await
        .map_err(|e| DocrError::Internal(format!("Image conversion task panicked: {}", e)))?
}

fn open_document<'a>(pdfium: &'a Pdfium, pdf_path: &Path) -> Result<PdfDocument<'a>, DocrError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| DocrError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

fn page_texts_blocking(pdf_path: &Path) -> Result<Vec<String>, DocrError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path)?;
    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| DocrError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        texts.push(text.all());
    }
    Ok(texts)
}

fn image_to_pdf_blocking(image_path: &Path, pdf_path: &Path, dpi: u32) -> Result<(), DocrError> {
    let normalization = |detail: String| DocrError::Normalization {
        path: image_path.to_path_buf(),
        detail,
    };

    let img = image::open(image_path).map_err(|e| normalization(format!("decode: {e}")))?;
    let (px_w, px_h) = img.dimensions();
    if px_w == 0 || px_h == 0 {
        return Err(normalization("image has zero size".to_string()));
    }

    let scale = 72.0 / dpi as f32;
    let width = PdfPoints::new(px_w as f32 * scale);
    let height = PdfPoints::new(px_h as f32 * scale);

    let pdfium = bind_pdfium()?;
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| normalization(format!("{:?}", e)))?;

    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::from_points(width, height))
            .map_err(|e| normalization(format!("{:?}", e)))?;
        page.objects_mut()
            .create_image_object(PdfPoints::ZERO, PdfPoints::ZERO, &img, Some(width), Some(height))
            .map_err(|e| normalization(format!("{:?}", e)))?;
    }

    document
        .save_to_file(pdf_path)
        .map_err(|e| normalization(format!("save: {:?}", e)))?;

    info!(
        "Wrapped {}x{} px image into {}",
        px_w,
        px_h,
        pdf_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_complete_only_when_every_page_has_text() {
        let full = TextCoverage {
            pages: 3,
            pages_with_text: 3,
        };
        let partial = TextCoverage {
            pages: 3,
            pages_with_text: 2,
        };
        let empty = TextCoverage {
            pages: 0,
            pages_with_text: 0,
        };
        assert!(full.is_complete());
        assert!(!partial.is_complete());
        assert!(!empty.is_complete());
    }

    #[tokio::test]
    async fn image_to_pdf_rejects_undecodable_image() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("broken.png");
        std::fs::write(&img, b"definitely not a png").unwrap();
        let err = image_to_pdf(&img, &dir.path().join("out.pdf"), 300)
            .await
            .unwrap_err();
        assert!(matches!(err, DocrError::Normalization { .. }), "got {err:?}");
    }
}
