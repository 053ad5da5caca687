//! Configuration types for document-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The per-file knobs of a
//! [`crate::convert::ConversionRequest`] (language, force-OCR, overwrite) take
//! their values from here, so one config describes a whole batch.
//!
//! External tools are reached through trait objects. Leaving an override as
//! `None` selects the built-in implementation (ocrmypdf, LibreOffice, pdfium);
//! setting it lets library users and tests plug in their own.

use crate::error::DocrError;
use crate::pipeline::extract::ExtractionStrategy;
use crate::pipeline::normalize::{DocumentConverter, ImageConverter};
use crate::pipeline::ocr::{OcrEngine, TextLayerProbe};
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Tesseract-style language list: `eng`, `chi_sim`, `eng+deu`.
static RE_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z_]*(\+[A-Za-z][A-Za-z_]*)*$").unwrap());

/// Configuration for a conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use docr::{ConversionConfig, SanitizePolicy};
///
/// let config = ConversionConfig::builder()
///     .language("eng+deu")
///     .force_ocr(false)
///     .sanitize_policy(SanitizePolicy::Strict)
///     .build()
///     .unwrap();
/// assert_eq!(config.language, "eng+deu");
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// OCR language code, passed verbatim to the engine. Default: `eng`.
    pub language: String,

    /// Re-OCR every page, replacing any embedded text layer. Default: true.
    ///
    /// Embedded text layers produced by scanners and "print to PDF" drivers
    /// are often worse than a fresh OCR pass. When false, pages that already
    /// carry text are left alone and the engine is skipped entirely if every
    /// page has text.
    pub force_ocr: bool,

    /// Replace existing output files. Default: false (existing outputs are skipped).
    pub overwrite: bool,

    /// Descend into sub-directories when the input is a directory. Default: false.
    pub recursive: bool,

    /// How non-ASCII characters are handled by the sanitiser. Default: [`SanitizePolicy::Structural`].
    pub sanitize: SanitizePolicy,

    /// Resolution assumed for raster images when sizing their PDF page. Range: 72–1200. Default: 300.
    ///
    /// Most scanners write 300 DPI; the OCR engine derives its own resolution
    /// from image pixels over page size, so a wrong value here makes Tesseract
    /// see text at the wrong scale.
    pub image_dpi: u32,

    /// Settings for the built-in ocrmypdf engine.
    pub ocr: OcrSettings,

    /// Office suite binary used for `.docx/.doc/.odt/.rtf`. Default: `libreoffice`.
    pub office_binary: String,

    /// Pre-constructed OCR engine. Takes precedence over [`OcrSettings`].
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Pre-constructed text-layer probe used when `force_ocr` is false.
    pub text_layer_probe: Option<Arc<dyn TextLayerProbe>>,

    /// Pre-constructed office → PDF converter.
    pub document_converter: Option<Arc<dyn DocumentConverter>>,

    /// Pre-constructed image → PDF converter.
    pub image_converter: Option<Arc<dyn ImageConverter>>,

    /// Replacement extraction chain, tried in order.
    pub extractors: Option<Vec<Arc<dyn ExtractionStrategy>>>,

    /// Optional per-file / per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            force_ocr: true,
            overwrite: false,
            recursive: false,
            sanitize: SanitizePolicy::default(),
            image_dpi: 300,
            ocr: OcrSettings::default(),
            office_binary: "libreoffice".to_string(),
            ocr_engine: None,
            text_layer_probe: None,
            document_converter: None,
            image_converter: None,
            extractors: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("language", &self.language)
            .field("force_ocr", &self.force_ocr)
            .field("overwrite", &self.overwrite)
            .field("recursive", &self.recursive)
            .field("sanitize", &self.sanitize)
            .field("image_dpi", &self.image_dpi)
            .field("ocr", &self.ocr)
            .field("office_binary", &self.office_binary)
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field(
                "document_converter",
                &self.document_converter.as_ref().map(|_| "<dyn DocumentConverter>"),
            )
            .field(
                "image_converter",
                &self.image_converter.as_ref().map(|_| "<dyn ImageConverter>"),
            )
            .field("extractors", &self.extractors.as_ref().map(|e| e.len()))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn force_ocr(mut self, v: bool) -> Self {
        self.config.force_ocr = v;
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn sanitize_policy(mut self, policy: SanitizePolicy) -> Self {
        self.config.sanitize = policy;
        self
    }

    pub fn image_dpi(mut self, dpi: u32) -> Self {
        self.config.image_dpi = dpi;
        self
    }

    pub fn ocr_settings(mut self, settings: OcrSettings) -> Self {
        self.config.ocr = settings;
        self
    }

    pub fn office_binary(mut self, bin: impl Into<String>) -> Self {
        self.config.office_binary = bin.into();
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn text_layer_probe(mut self, probe: Arc<dyn TextLayerProbe>) -> Self {
        self.config.text_layer_probe = Some(probe);
        self
    }

    pub fn document_converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.config.document_converter = Some(converter);
        self
    }

    pub fn image_converter(mut self, converter: Arc<dyn ImageConverter>) -> Self {
        self.config.image_converter = Some(converter);
        self
    }

    pub fn extractors(mut self, chain: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        self.config.extractors = Some(chain);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, DocrError> {
        let c = &self.config;
        if !RE_LANGUAGE.is_match(&c.language) {
            return Err(DocrError::InvalidConfig(format!(
                "OCR language must look like 'eng' or 'eng+deu', got '{}'",
                c.language
            )));
        }
        if c.image_dpi < 72 || c.image_dpi > 1200 {
            return Err(DocrError::InvalidConfig(format!(
                "Image DPI must be 72–1200, got {}",
                c.image_dpi
            )));
        }
        if c.ocr.jobs == 0 {
            return Err(DocrError::InvalidConfig("OCR jobs must be ≥ 1".into()));
        }
        if matches!(&c.extractors, Some(chain) if chain.is_empty()) {
            return Err(DocrError::InvalidConfig(
                "Extraction chain must contain at least one strategy".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Sub-settings ─────────────────────────────────────────────────────────

/// Options passed to the built-in ocrmypdf engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Engine binary. Default: `ocrmypdf`.
    pub binary: String,
    /// Straighten skewed scans before recognition. Default: true.
    pub deskew: bool,
    /// Clean scan noise before recognition (requires unpaper). Default: true.
    pub clean: bool,
    /// Per-page Tesseract timeout in seconds. Default: 300.
    pub tesseract_timeout_secs: u64,
    /// Pages processed in parallel by the engine. Default: 2.
    pub jobs: usize,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            binary: "ocrmypdf".to_string(),
            deskew: true,
            clean: true,
            tesseract_timeout_secs: 300,
            jobs: 2,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the sanitiser does with characters outside printable ASCII.
///
/// Whatever the policy, the output only ever contains printable ASCII plus
/// `\n` and `\t`; the policies differ only in which characters are replaced
/// by an ASCII equivalent rather than dropped.
///
/// | Policy | Substituted | Dropped |
/// |--------|-------------|---------|
/// | `Strict` | nothing | every non-ASCII char |
/// | `Structural` | list bullets, table bars, box rules, Unicode spaces | the rest |
/// | `Transliterate` | `Structural` + quotes, dashes, ellipsis, common symbols | the rest |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanitizePolicy {
    /// Drop every non-ASCII character.
    Strict,
    /// Keep Markdown structure intact by substituting structural markers. (default)
    #[default]
    Structural,
    /// Structural substitutions plus typographic folding.
    Transliterate,
}

impl std::str::FromStr for SanitizePolicy {
    type Err = DocrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SanitizePolicy::Strict),
            "structural" => Ok(SanitizePolicy::Structural),
            "transliterate" => Ok(SanitizePolicy::Transliterate),
            other => Err(DocrError::InvalidConfig(format!(
                "Unknown sanitize policy '{other}' (expected strict, structural or transliterate)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.language, "eng");
        assert!(c.force_ocr);
        assert!(!c.overwrite);
        assert!(!c.recursive);
        assert_eq!(c.sanitize, SanitizePolicy::Structural);
        assert_eq!(c.ocr.tesseract_timeout_secs, 300);
        assert_eq!(c.ocr.jobs, 2);
        assert_eq!(c.office_binary, "libreoffice");
    }

    #[test]
    fn builder_accepts_language_combinations() {
        for lang in ["eng", "eng+deu", "chi_sim", "chi_sim+eng"] {
            let c = ConversionConfig::builder().language(lang).build();
            assert!(c.is_ok(), "{lang} should be accepted");
        }
    }

    #[test]
    fn builder_rejects_malformed_language() {
        for lang in ["", "eng+", "en g", "../eng", "+eng", "eng;rm"] {
            let err = ConversionConfig::builder().language(lang).build().unwrap_err();
            assert!(matches!(err, DocrError::InvalidConfig(_)), "{lang}");
        }
    }

    #[test]
    fn builder_rejects_bad_dpi_and_jobs() {
        assert!(ConversionConfig::builder().image_dpi(10).build().is_err());
        let settings = OcrSettings {
            jobs: 0,
            ..OcrSettings::default()
        };
        assert!(ConversionConfig::builder().ocr_settings(settings).build().is_err());
    }

    #[test]
    fn builder_rejects_empty_extraction_chain() {
        let err = ConversionConfig::builder().extractors(vec![]).build().unwrap_err();
        assert!(err.to_string().contains("at least one strategy"));
    }

    #[test]
    fn sanitize_policy_parses() {
        assert_eq!("STRICT".parse::<SanitizePolicy>().unwrap(), SanitizePolicy::Strict);
        assert_eq!(
            "transliterate".parse::<SanitizePolicy>().unwrap(),
            SanitizePolicy::Transliterate
        );
        assert!("loose".parse::<SanitizePolicy>().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let dbg = format!("{:?}", ConversionConfig::default());
        assert!(dbg.contains("language"));
        assert!(dbg.contains("ocr_engine: None"));
    }
}
