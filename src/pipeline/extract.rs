//! Extraction: turn a (searchable) PDF into raw Markdown.
//!
//! ## Fallback chain
//!
//! Extraction is an ordered list of interchangeable [`ExtractionStrategy`]
//! objects. [`ExtractionChain::run`] tries them in order and the first one
//! that returns non-blank text wins. Empty output and errors are both
//! "try the next one"; every attempt is recorded so a degraded result can be
//! explained afterwards.
//!
//! The default chain is:
//!
//! 1. [`StructuredExtractor`]: page text re-flowed into paragraphs with
//!    headings and list items recovered.
//! 2. [`PlainTextExtractor`]: raw page text joined with blank lines. Pages
//!    pdfium cannot read are skipped; when pdfium cannot bind or open the
//!    file at all, poppler's `pdftotext` is used instead.
//!
//! On a scan where OCR found nothing both come back empty and the file fails
//! with an extraction error.

use crate::error::DocrError;
use crate::output::{AttemptOutcome, ExtractionAttempt, ExtractionResult};
use crate::pipeline::pdf;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Identifies a strategy in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Structured,
    PlainText,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExtractionMethod::Structured => "structured",
            ExtractionMethod::PlainText => "plain_text",
        })
    }
}

/// One way of getting Markdown out of a PDF.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    /// Extract Markdown. Returning an empty string is allowed and means
    /// "nothing usable", not an error.
    async fn extract(&self, pdf: &Path) -> Result<String, DocrError>;
}

/// An ordered set of strategies.
#[derive(Clone)]
pub struct ExtractionChain {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
}

impl std::fmt::Debug for ExtractionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.method()))
            .finish()
    }
}

impl Default for ExtractionChain {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(StructuredExtractor),
            Arc::new(PlainTextExtractor::default()),
        ])
    }
}

impl ExtractionChain {
    pub fn new(strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn methods(&self) -> Vec<ExtractionMethod> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    /// Try each strategy in order until one yields non-blank text.
    pub async fn run(&self, pdf: &Path) -> ExtractionResult {
        let mut result = ExtractionResult::default();

        for strategy in &self.strategies {
            let method = strategy.method();
            match strategy.extract(pdf).await {
                Ok(text) if !text.trim().is_empty() => {
                    debug!("{}: {} chars from {}", method, text.len(), pdf.display());
                    result.attempts.push(ExtractionAttempt {
                        method,
                        outcome: AttemptOutcome::Text { chars: text.len() },
                    });
                    if result.attempts.len() > 1 {
                        info!("Extraction fell back to {} for {}", method, pdf.display());
                    }
                    result.markdown = text;
                    result.method = Some(method);
                    result.success = true;
                    return result;
                }
                Ok(_) => {
                    debug!("{}: no text from {}", method, pdf.display());
                    result.attempts.push(ExtractionAttempt {
                        method,
                        outcome: AttemptOutcome::Empty,
                    });
                }
                Err(e) => {
                    warn!("{} extraction failed for {}: {}", method, pdf.display(), e);
                    result.attempts.push(ExtractionAttempt {
                        method,
                        outcome: AttemptOutcome::Error {
                            message: e.to_string(),
                        },
                    });
                }
            }
        }

        result
    }
}

// ── Built-in strategies ──────────────────────────────────────────────────

/// Paragraphs, headings and lists recovered from page text.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredExtractor;

#[async_trait]
impl ExtractionStrategy for StructuredExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Structured
    }

    async fn extract(&self, pdf_path: &Path) -> Result<String, DocrError> {
        let pages = pdf::page_texts(pdf_path).await?;
        Ok(structure_pages(&pages))
    }
}

/// Raw page text separated by blank lines.
///
/// Reads pdfium page by page and drops pages that fail. If pdfium cannot
/// bind or open the document, or no page can be read, `pdftotext` is run.
#[derive(Debug, Clone)]
pub struct PlainTextExtractor {
    pub pdftotext: String,
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self {
            pdftotext: "pdftotext".to_string(),
        }
    }
}

impl PlainTextExtractor {
    pub fn new(pdftotext: impl Into<String>) -> Self {
        Self {
            pdftotext: pdftotext.into(),
        }
    }

    /// Page texts from `pdftotext`, which separates pages with form feeds.
    async fn run_pdftotext(&self, pdf_path: &Path) -> Result<Vec<String>, DocrError> {
        let failed = |detail: String| DocrError::Extraction {
            path: pdf_path.to_path_buf(),
            detail,
        };

        debug!("{} reading {}", self.pdftotext, pdf_path.display());
        let output = Command::new(&self.pdftotext)
            .args(["-enc", "UTF-8"])
            .arg(pdf_path)
            .arg("-")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DocrError::ToolUnavailable {
                    tool: self.pdftotext.clone(),
                    detail: e.to_string(),
                },
                _ => failed(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "{} exited with {}: {}",
                self.pdftotext,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .split('\u{0C}')
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl ExtractionStrategy for PlainTextExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PlainText
    }

    async fn extract(&self, pdf_path: &Path) -> Result<String, DocrError> {
        match pdf::page_texts_lenient(pdf_path).await {
            Ok(pages) if pages.iter().any(|p| p.is_ok()) => Ok(join_readable_pages(&pages)),
            Ok(pages) if pages.is_empty() => Ok(String::new()),
            Ok(_) => {
                warn!("No page of {} was readable by pdfium", pdf_path.display());
                let pages = self.run_pdftotext(pdf_path).await?;
                Ok(join_plain_pages(&pages))
            }
            Err(e) => {
                warn!("pdfium unavailable for {}: {}", pdf_path.display(), first_line(&e.to_string()));
                let pages = self.run_pdftotext(pdf_path).await?;
                Ok(join_plain_pages(&pages))
            }
        }
    }
}

/// Join the pages that were read, skipping (and logging) the ones that were not.
pub fn join_readable_pages(pages: &[Result<String, String>]) -> String {
    let readable: Vec<String> = pages
        .iter()
        .enumerate()
        .filter_map(|(idx, page)| match page {
            Ok(text) => Some(text.clone()),
            Err(reason) => {
                warn!("Skipping page {}: {}", idx + 1, reason);
                None
            }
        })
        .collect();
    join_plain_pages(&readable)
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}

/// Join non-blank pages with a paragraph break.
pub fn join_plain_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ── Structure recovery ───────────────────────────────────────────────────

static RE_NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})[.)]\s+(\S.*)$").unwrap());
static RE_SECTION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)+\.?\s+\S").unwrap());

const GLYPH_BULLETS: &[char] = &['•', '◦', '▪', '‣', '●', '○', '■', '□', '➢', '\u{F0B7}'];
const MAX_HEADING_CHARS: usize = 80;
const MAX_HEADING_WORDS: usize = 12;

#[derive(Debug, PartialEq, Eq)]
enum Block {
    Heading(u8, String),
    Item(String, String),
    Paragraph(String),
}

/// Recover Markdown structure from every page and join the pages.
pub fn structure_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| structure_page(p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Recover Markdown structure from the text of one page.
pub fn structure_page(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut blocks: Vec<Block> = Vec::new();
    let mut paragraph = String::new();

    for raw in text.lines() {
        let line = raw.trim();

        if line.is_empty() {
            flush(&mut paragraph, &mut blocks);
            continue;
        }

        if let Some(item) = strip_bullet(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Item("-".to_string(), item.to_string()));
            continue;
        }

        if let Some(caps) = RE_NUMBERED_ITEM.captures(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Item(format!("{}.", &caps[1]), caps[2].to_string()));
            continue;
        }

        if paragraph.is_empty() {
            // A wrapped list item continues on a lower-case line.
            if let Some(Block::Item(_, item)) = blocks.last_mut() {
                if starts_lowercase(line) {
                    join_wrapped(item, line);
                    continue;
                }
            }
            if let Some(level) = heading_level(line) {
                blocks.push(Block::Heading(level, line.to_string()));
                continue;
            }
        }

        join_wrapped(&mut paragraph, line);
    }
    flush(&mut paragraph, &mut blocks);

    render(&blocks)
}

fn flush(paragraph: &mut String, blocks: &mut Vec<Block>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph(std::mem::take(paragraph)));
    }
}

/// Append `line` to `buf`, re-joining words hyphenated across the break.
fn join_wrapped(buf: &mut String, line: &str) {
    if buf.is_empty() {
        buf.push_str(line);
        return;
    }
    let hyphenated = buf.ends_with('-')
        && buf[..buf.len() - 1]
            .chars()
            .last()
            .is_some_and(|c| c.is_alphabetic())
        && starts_lowercase(line);
    if hyphenated {
        buf.pop();
    } else {
        buf.push(' ');
    }
    buf.push_str(line);
}

fn starts_lowercase(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_lowercase())
}

fn strip_bullet(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let first = chars.next()?;
    let rest = chars.as_str();
    let is_marker = GLYPH_BULLETS.contains(&first)
        || ((first == '-' || first == '*') && rest.starts_with(char::is_whitespace));
    if !is_marker {
        return None;
    }
    let item = rest.trim();
    (!item.is_empty()).then_some(item)
}

fn heading_level(line: &str) -> Option<u8> {
    if line.chars().count() > MAX_HEADING_CHARS
        || line.split_whitespace().count() > MAX_HEADING_WORDS
        || line.ends_with(['.', ',', ';', ':', '!', '?'])
    {
        return None;
    }
    if RE_SECTION_HEADING.is_match(line) {
        return Some(3);
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase()) {
        return Some(2);
    }
    None
}

fn render(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut prev_item = false;
    for block in blocks {
        let is_item = matches!(block, Block::Item(..));
        if !out.is_empty() {
            out.push_str(if is_item && prev_item { "\n" } else { "\n\n" });
        }
        match block {
            Block::Heading(level, text) => {
                out.push_str(&"#".repeat(*level as usize));
                out.push(' ');
                out.push_str(text);
            }
            Block::Item(marker, text) => {
                out.push_str(marker);
                out.push(' ');
                out.push_str(text);
            }
            Block::Paragraph(text) => out.push_str(text),
        }
        prev_item = is_item;
    }
    out
}
