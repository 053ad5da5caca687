//! Batch driver: expand an input path into requests and run them in order.
//!
//! A file input yields one request. A directory input is walked (recursively
//! with `recursive`), filtered to supported formats and sorted by the string
//! form of the relative path; each output mirrors its relative location under
//! the output directory with a `.md` extension.
//!
//! Files are converted strictly one after another. A failed file is recorded
//! and the batch moves on.

use crate::config::ConversionConfig;
use crate::convert::{ConversionRequest, Pipeline};
use crate::error::DocrError;
use crate::output::BatchReport;
use crate::pipeline::classify;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Expand `input` into conversion requests.
///
/// # Errors
/// - [`DocrError::FileNotFound`] / [`DocrError::PermissionDenied`] when
///   `input` cannot be read.
/// - [`DocrError::NoSupportedFiles`] when a directory holds nothing the
///   classifier accepts.
pub fn plan_requests(
    input: &Path,
    output: &Path,
    config: &ConversionConfig,
) -> Result<Vec<ConversionRequest>, DocrError> {
    let meta = std::fs::metadata(input).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DocrError::PermissionDenied {
            path: input.to_path_buf(),
        },
        _ => DocrError::FileNotFound {
            path: input.to_path_buf(),
        },
    })?;

    if !meta.is_dir() {
        // Unsupported single files still get a request so they are reported.
        return Ok(vec![ConversionRequest::new(
            input,
            single_output(input, output),
            config,
        )]);
    }

    let mut relative = Vec::new();
    walk(input, Path::new(""), config.recursive, &mut relative)?;
    relative.retain(|rel| classify::is_supported(rel));
    if relative.is_empty() {
        return Err(DocrError::NoSupportedFiles {
            path: input.to_path_buf(),
        });
    }
    // Plain string order, so `sub.pdf` precedes `sub/c.docx`.
    relative.sort_by_cached_key(|rel| rel.to_string_lossy().into_owned());

    let requests: Vec<ConversionRequest> = relative
        .iter()
        .map(|rel| ConversionRequest::new(input.join(rel), output.join(rel).with_extension("md"), config))
        .collect();

    for (out, inputs) in find_collisions(&requests) {
        warn!(
            "{} inputs map to {}: {}; the first one wins unless --overwrite is set",
            inputs.len(),
            out.display(),
            inputs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    info!("Planned {} file(s) under {}", requests.len(), input.display());
    Ok(requests)
}

/// For a single file: an existing directory as output means `<dir>/<stem>.md`.
fn single_output(input: &Path, output: &Path) -> PathBuf {
    if output.is_dir() {
        let stem = input.file_stem().unwrap_or(input.as_os_str());
        output.join(format!("{}.md", stem.to_string_lossy()))
    } else {
        output.to_path_buf()
    }
}

/// Collect files under `root/rel`, as paths relative to `root`.
fn walk(root: &Path, rel: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<(), DocrError> {
    let dir = root.join(rel);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if rel.as_os_str().is_empty() => {
            return Err(match e.kind() {
                std::io::ErrorKind::PermissionDenied => DocrError::PermissionDenied { path: dir },
                _ => DocrError::FileNotFound { path: dir },
            })
        }
        Err(e) => {
            warn!("Cannot read {}: {}; skipping", dir.display(), e);
            return Ok(());
        }
    };

    for entry in entries.flatten() {
        let child = rel.join(entry.file_name());
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if recursive {
                walk(root, &child, recursive, out)?;
            }
        } else if entry.path().is_file() {
            out.push(child);
        } else {
            debug!("Ignoring {}", entry.path().display());
        }
    }
    Ok(())
}

/// Output paths claimed by more than one input, with the inputs in order.
pub fn find_collisions(requests: &[ConversionRequest]) -> Vec<(PathBuf, Vec<PathBuf>)> {
    let mut by_output: BTreeMap<&Path, Vec<PathBuf>> = BTreeMap::new();
    for r in requests {
        by_output
            .entry(r.output.as_path())
            .or_default()
            .push(r.input.clone());
    }
    by_output
        .into_iter()
        .filter(|(_, inputs)| inputs.len() > 1)
        .map(|(out, inputs)| (out.to_path_buf(), inputs))
        .collect()
}

/// Run `requests` through `pipeline` one at a time.
pub async fn run_requests(pipeline: &Pipeline, requests: &[ConversionRequest]) -> BatchReport {
    let callback = pipeline.config().progress_callback.clone();
    let total = requests.len();
    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
    }

    let mut outcomes = Vec::with_capacity(total);
    for (index, request) in requests.iter().enumerate() {
        if let Some(ref cb) = callback {
            cb.on_file_start(index, total, &request.input);
        }
        let outcome = pipeline.run(request).await;
        if let Some(ref cb) = callback {
            cb.on_file_complete(index, total, &outcome);
        }
        outcomes.push(outcome);
    }

    let report = BatchReport::new(outcomes);
    info!("Batch complete: {}", report.summary);
    if let Some(ref cb) = callback {
        cb.on_batch_complete(report.summary.succeeded, report.summary.failed);
    }
    report
}

/// Plan and run a whole batch.
///
/// # Errors
/// Only planning errors; per-file failures are in the report.
pub async fn run_batch(
    input: &Path,
    output: &Path,
    config: &ConversionConfig,
) -> Result<BatchReport, DocrError> {
    let requests = plan_requests(input, output, config)?;
    let pipeline = Pipeline::new(config.clone());
    Ok(run_requests(&pipeline, &requests).await)
}
