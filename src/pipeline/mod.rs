//! Pipeline stages for document-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, and every
//! step that reaches an external tool does so through a trait so tests can
//! substitute fakes.
//!
//! ## Data Flow
//!
//! ```text
//! path ──▶ classify ──▶ normalize ──▶ ocr ──▶ extract ──▶ sanitize
//!          (extension)  (→ PDF)      (text    (fallback   (ASCII-safe
//!                          │          layer)   chain)      Markdown)
//!                          └── .txt/.csv ───────────────────▲
//! ```
//!
//! 1. [`classify`]: extension → [`classify::FormatKind`]
//! 2. [`normalize`]: images via pdfium, office documents via LibreOffice
//! 3. [`ocr`]: ocrmypdf with a force/skip policy; failure is recoverable
//! 4. [`extract`]: structured extractor, then plain text
//! 5. [`sanitize`]: pure, total, idempotent cleanup
//!
//! [`pdf`] holds the pdfium helpers shared by stages 2–4.

pub mod classify;
pub mod extract;
pub mod normalize;
pub mod ocr;
pub mod pdf;
pub mod sanitize;
