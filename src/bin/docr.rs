//! CLI binary for docr.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, runs the batch and prints per-file results.

use anyhow::{Context, Result};
use clap::Parser;
use docr::{
    plan_requests, run_requests, supported_extensions, BatchProgressCallback, ConversionConfig,
    ConversionOutcome, OcrSettings, OutcomeStatus, Pipeline, ProgressCallback, SanitizePolicy,
    Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Per-file reporter ────────────────────────────────────────────────────────

/// Prints one line per file, plus stage lines in verbose mode.
///
/// With a bar, lines go through `ProgressBar::println` so they scroll above
/// it; without one they go straight to stderr.
struct CliReporter {
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl CliReporter {
    fn new(show_bar: bool, verbose: bool) -> Arc<Self> {
        let bar = show_bar.then(|| {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {pos:>3}/{len} files  \
                     ⏱ {elapsed_precise}  {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_prefix("Converting");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Arc::new(Self { bar, verbose })
    }

    fn line(&self, msg: String) {
        match self.bar {
            Some(ref bar) => bar.println(msg),
            None => eprintln!("{msg}"),
        }
    }
}

impl BatchProgressCallback for CliReporter {
    fn on_batch_start(&self, total_files: usize) {
        if let Some(ref bar) = self.bar {
            bar.set_length(total_files as u64);
        }
    }

    fn on_file_start(&self, index: usize, total: usize, input: &Path) {
        if let Some(ref bar) = self.bar {
            bar.set_message(file_name(input));
        }
        if self.verbose {
            self.line(format!("[{}/{}] Processing: {}", index + 1, total, input.display()));
        }
    }

    fn on_stage(&self, _input: &Path, stage: Stage) {
        if self.verbose {
            self.line(dim(&format!("    · {stage}")));
        }
    }

    fn on_file_complete(&self, index: usize, total: usize, outcome: &ConversionOutcome) {
        let counter = dim(&format!("[{}/{}]", index + 1, total));
        let input = outcome.request.input.display();
        let secs = outcome.duration_ms as f64 / 1000.0;

        let line = match outcome.status {
            OutcomeStatus::Succeeded => format!(
                "  {} {counter} {input}  →  {}  {}",
                green("✓"),
                outcome.request.output.display(),
                dim(&format!("{secs:.1}s")),
            ),
            OutcomeStatus::Degraded => {
                let method = outcome
                    .extraction_method
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "  {} {counter} {input}  →  {}  {}  {}",
                    yellow("⚠"),
                    outcome.request.output.display(),
                    yellow(&format!("degraded, extracted with {method}")),
                    dim(&format!("{secs:.1}s")),
                )
            }
            OutcomeStatus::Skipped => format!(
                "  {} {counter} Skipping {input} (output exists, use --overwrite to replace)",
                dim("–"),
            ),
            OutcomeStatus::Failed => format!(
                "  {} {counter} {input}  {}",
                red("✗"),
                red(&format!(
                    "{}: {}",
                    outcome
                        .error_kind
                        .map(|k| k.to_string())
                        .unwrap_or_default(),
                    first_line(outcome.error_message.as_deref().unwrap_or("")),
                )),
            ),
        };
        self.line(line);

        if self.verbose {
            for note in &outcome.diagnostics {
                self.line(dim(&format!("      {note}")));
            }
        }
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # One document
  docr report.docx report.md

  # A folder of scans, German + English, keep existing text layers
  docr -l deu+eng --no-force-ocr scans/ markdown/

  # Whole tree, replacing earlier output, machine-readable report
  docr -r --overwrite --json inbox/ out/ > report.json

EXTERNAL TOOLS:
  ocrmypdf      OCR (with Tesseract and its language packs)
  libreoffice   .docx/.doc/.odt/.rtf → PDF
  libpdfium     image → PDF and text extraction

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Directory (or file) containing libpdfium
  RUST_LOG          Override the log filter (e.g. docr=debug)

EXIT STATUS:
  0  every file succeeded or was skipped
  1  a file failed, or nothing could be converted
"#;

/// Convert documents and scans into LLM-ready Markdown via OCR.
#[derive(Parser, Debug)]
#[command(
    name = "docr",
    version,
    about = "Convert PDFs, images and office documents into sanitised Markdown via OCR",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file or directory.
    input_path: PathBuf,

    /// Output file (single input) or directory (directory input).
    output_path: PathBuf,

    /// Descend into sub-directories.
    #[arg(short, long, env = "DOCR_RECURSIVE")]
    recursive: bool,

    /// OCR language code(s), e.g. eng, deu, eng+fra.
    #[arg(short, long, env = "DOCR_LANGUAGE", default_value = "eng")]
    language: String,

    /// Keep existing text layers instead of re-OCRing every page.
    #[arg(long, env = "DOCR_NO_FORCE_OCR")]
    no_force_ocr: bool,

    /// Replace output files that already exist.
    #[arg(long, env = "DOCR_OVERWRITE")]
    overwrite: bool,

    /// How to treat characters outside printable ASCII.
    #[arg(long, env = "DOCR_SANITIZE", value_enum, default_value = "structural")]
    sanitize: SanitizeArg,

    /// Resolution assumed for raster images (72–1200).
    #[arg(long, env = "DOCR_IMAGE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=1200))]
    image_dpi: u32,

    /// Per-page Tesseract timeout in seconds.
    #[arg(long, env = "DOCR_OCR_TIMEOUT", default_value_t = 300)]
    ocr_timeout: u64,

    /// Pages OCRed in parallel.
    #[arg(long, env = "DOCR_OCR_JOBS", default_value_t = 2,
          value_parser = clap::value_parser!(u64).range(1..))]
    ocr_jobs: u64,

    /// ocrmypdf executable.
    #[arg(long, env = "DOCR_OCRMYPDF_BIN", default_value = "ocrmypdf")]
    ocrmypdf_bin: String,

    /// LibreOffice executable.
    #[arg(long, env = "DOCR_LIBREOFFICE_BIN", default_value = "libreoffice")]
    libreoffice_bin: String,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "DOCR_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DOCR_NO_PROGRESS")]
    no_progress: bool,

    /// Show per-stage progress and diagnostics.
    #[arg(short, long, env = "DOCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCR_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SanitizeArg {
    Strict,
    Structural,
    Transliterate,
}

impl From<SanitizeArg> for SanitizePolicy {
    fn from(v: SanitizeArg) -> Self {
        match v {
            SanitizeArg::Strict => SanitizePolicy::Strict,
            SanitizeArg::Structural => SanitizePolicy::Structural,
            SanitizeArg::Transliterate => SanitizePolicy::Transliterate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar and the per-file lines carry the user-facing feedback, so
    // library logs stay at warn unless --verbose asks for everything.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let reporter: Option<ProgressCallback> = if cli.quiet || cli.json {
        None
    } else {
        Some(CliReporter::new(show_progress, cli.verbose) as Arc<dyn BatchProgressCallback>)
    };
    let config = build_config(&cli, reporter)?;

    // ── Plan ─────────────────────────────────────────────────────────────
    let requests = plan_requests(&cli.input_path, &cli.output_path, &config).with_context(|| {
        format!(
            "Nothing to convert at {}\nSupported: {}",
            cli.input_path.display(),
            supported_extensions().join(" ")
        )
    })?;

    // ── Run ──────────────────────────────────────────────────────────────
    let pipeline = Pipeline::new(config);
    let report = run_requests(&pipeline, &requests).await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if cli.prints_summary() {
        let s = &report.summary;
        eprintln!(
            "\n{} Processing complete: {}",
            if s.failed == 0 { green("✔") } else { red("✘") },
            bold(&s.to_string())
        );
    }

    Ok(ExitCode::from(report.exit_code() as u8))
}

/// Map CLI args to `ConversionConfig`.
impl Cli {
    /// The closing summary line goes to stderr unless `--quiet` or `--json`.
    fn prints_summary(&self) -> bool {
        !self.quiet && !self.json
    }
}

fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let ocr = OcrSettings {
        binary: cli.ocrmypdf_bin.clone(),
        tesseract_timeout_secs: cli.ocr_timeout,
        jobs: cli.ocr_jobs as usize,
        ..OcrSettings::default()
    };

    let mut builder = ConversionConfig::builder()
        .language(cli.language.clone())
        .force_ocr(!cli.no_force_ocr)
        .overwrite(cli.overwrite)
        .recursive(cli.recursive)
        .sanitize_policy(cli.sanitize.into())
        .image_dpi(cli.image_dpi)
        .ocr_settings(ocr)
        .office_binary(cli.libreoffice_bin.clone());

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
