//! Input path expansion.
//!
//! A source path may be a single file, a directory (every visible file directly
//! inside it), or a glob pattern such as `events/2024-*/part-*.csv`. Results
//! are sorted so split order is deterministic.

use anyhow::{Context, Result, bail};
use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Expand a glob pattern into a sorted list of matching files.
///
/// Directories matched by the pattern are skipped. Zero matches is not an
/// error.
///
/// # Errors
/// Returns an error if the pattern is invalid or a matched entry cannot be
/// read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Expand a source path into the files to read.
///
/// Hidden files (leading `.` or `_`, e.g. `_SUCCESS`) inside a directory are
/// skipped, matching the usual committed-output layout.
///
/// # Errors
/// Returns an error if nothing matches, or the path cannot be listed.
pub fn expand_input(path: &str) -> Result<Vec<PathBuf>> {
    let files = if is_pattern(path) {
        expand_glob(path)?
    } else {
        let p = Path::new(path);
        if p.is_dir() {
            let mut files = Vec::new();
            for entry in fs::read_dir(p).with_context(|| format!("list {}", p.display()))? {
                let entry = entry.with_context(|| format!("list {}", p.display()))?;
                let hidden = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with('.') || n.starts_with('_'));
                if !hidden && entry.path().is_file() {
                    files.push(entry.path());
                }
            }
            files.sort();
            files
        } else if p.is_file() {
            vec![p.to_path_buf()]
        } else {
            Vec::new()
        }
    };
    if files.is_empty() {
        bail!("no input files found for {path}");
    }
    debug!(path, files = files.len(), "expanded input path");
    Ok(files)
}

fn is_pattern(path: &str) -> bool {
    path.contains(['*', '?', '['])
}
