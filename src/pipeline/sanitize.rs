//! Sanitisation: make extracted Markdown safe for language-model ingestion.
//!
//! ## Guarantees
//!
//! For every input string, [`sanitize`] returns text that
//!
//! - contains only printable ASCII (`0x20..=0x7E`) plus `\n` and `\t`,
//! - has no trailing whitespace on any line,
//! - never has more than two consecutive blank lines,
//! - starts with a non-blank line and ends with exactly one `\n`
//!   (or is the empty string),
//!
//! and it does so without ever failing. Running it twice gives the same
//! result as running it once.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so `\r` never reaches the character
//! filter; characters are filtered before trailing whitespace is trimmed
//! because dropping a glyph can expose a trailing space; blank lines are
//! collapsed last, once whitespace-only lines have become truly empty.

use crate::config::SanitizePolicy;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all sanitisation rules under `policy`.
pub fn sanitize(input: &str, policy: SanitizePolicy) -> String {
    let s = normalise_line_endings(input);
    let s = filter_characters(&s, policy);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    trim_document(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Restrict to printable ASCII ──────────────────────────────────────

fn is_permitted(c: char) -> bool {
    c == '\n' || c == '\t' || (' '..='~').contains(&c)
}

fn filter_characters(input: &str, policy: SanitizePolicy) -> String {
    let mut out = String::with_capacity(input.len());
    for (i, line) in input.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        filter_line(line, policy, &mut out);
    }
    out
}

fn filter_line(line: &str, policy: SanitizePolicy, out: &mut String) {
    let mut at_line_start = true;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if is_permitted(c) {
            if !(c == ' ' || c == '\t') {
                at_line_start = false;
            }
            out.push(c);
            continue;
        }
        if c.is_ascii() {
            // Control characters carry no structure.
            continue;
        }

        let replacement = match policy {
            SanitizePolicy::Strict => None,
            SanitizePolicy::Structural => structural(c, at_line_start),
            SanitizePolicy::Transliterate => {
                structural(c, at_line_start).or_else(|| transliterate(c))
            }
        };

        if let Some(rep) = replacement {
            out.push_str(rep);
            if is_bullet(c) && at_line_start {
                // A list marker needs a space before the item text.
                if matches!(chars.peek(), Some(n) if !n.is_whitespace()) {
                    out.push(' ');
                }
            }
            if !rep.trim().is_empty() {
                at_line_start = false;
            }
        }
    }
}

fn is_bullet(c: char) -> bool {
    matches!(
        c,
        '\u{2022}' // •
            | '\u{25E6}' // ◦
            | '\u{25AA}' // ▪
            | '\u{25AB}' // ▫
            | '\u{2023}' // ‣
            | '\u{2043}' // ⁃
            | '\u{25CF}' // ●
            | '\u{25CB}' // ○
            | '\u{25A0}' // ■
            | '\u{25A1}' // □
            | '\u{2219}' // ∙
            | '\u{00B7}' // ·
            | '\u{27A2}' // ➢
            | '\u{2192}' // →
            | '\u{F0B7}' // Symbol-font bullet from Word
    )
}

/// ASCII stand-ins for characters that carry Markdown structure.
fn structural(c: char, at_line_start: bool) -> Option<&'static str> {
    if is_bullet(c) {
        return at_line_start.then_some("-");
    }
    match c {
        // Table column bars.
        '\u{2502}' | '\u{2503}' | '\u{2551}' | '\u{FF5C}' | '\u{00A6}' => Some("|"),
        // Table joints and rules.
        '\u{253C}' | '\u{254B}' | '\u{256C}' | '\u{251C}' | '\u{2524}' | '\u{252C}'
        | '\u{2534}' => Some("|"),
        '\u{2500}' | '\u{2501}' | '\u{2550}' => Some("-"),
        _ if c.is_whitespace() => Some(" "),
        _ => None,
    }
}

/// Typographic folding used by [`SanitizePolicy::Transliterate`].
fn transliterate(c: char) -> Option<&'static str> {
    let s = match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}'
        | '\u{00BB}' => "\"",
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2212}' => "-",
        '\u{2014}' | '\u{2015}' => "--",
        '\u{2026}' => "...",
        '\u{00D7}' => "x",
        '\u{00F7}' => "/",
        '\u{2264}' => "<=",
        '\u{2265}' => ">=",
        '\u{2260}' => "!=",
        '\u{00A9}' => "(c)",
        '\u{00AE}' => "(R)",
        '\u{2122}' => "(TM)",
        '\u{00B0}' => " deg",
        '\u{20AC}' => "EUR",
        '\u{00A3}' => "GBP",
        '\u{FB01}' => "fi",
        '\u{FB02}' => "fl",
        '\u{FB00}' => "ff",
        '\u{FB03}' => "ffi",
        '\u{FB04}' => "ffl",
        _ => return None,
    };
    Some(s)
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Trim the document ────────────────────────────────────────────────

fn trim_document(input: &str) -> String {
    let body = input.trim_start_matches('\n').trim_end();
    if body.is_empty() {
        String::new()
    } else {
        format!("{}\n", body)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
