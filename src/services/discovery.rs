//! Input file discovery for batch runs

use super::io::ImageIOService;
use crate::error::{BgStripError, Result};
use crate::pipeline::BatchFailure;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Images found for a batch plus the inputs that could not be used
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredInputs {
    pub files: Vec<PathBuf>,
    /// Missing paths, unsupported files and unreadable directory entries
    pub rejected: Vec<BatchFailure>,
}

impl DiscoveredInputs {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.rejected.is_empty()
    }

    fn reject(&mut self, path: &Path, error: String) {
        warn!(path = %path.display(), %error, "Skipping input");
        self.rejected.push(BatchFailure {
            path: path.to_path_buf(),
            error,
        });
    }
}

/// Expand files and directories into a sorted list of supported images
///
/// A bad input never aborts discovery. Missing paths and explicit files with
/// an unsupported extension end up in [`DiscoveredInputs::rejected`].
/// Directories are scanned one level deep unless `recursive` is set, and
/// `pattern` (a glob on the file name) filters what a scan picks up.
pub fn discover_inputs(
    inputs: &[PathBuf],
    recursive: bool,
    pattern: Option<&str>,
) -> Result<DiscoveredInputs> {
    let matcher = match pattern {
        Some(pat) => Some(glob::Pattern::new(pat).map_err(|e| {
            BgStripError::config_value_error("pattern", pat, &format!("valid glob ({})", e))
        })?),
        None => None,
    };

    let mut discovered = DiscoveredInputs::default();
    for input in inputs {
        if input.is_file() {
            if ImageIOService::is_supported_format(input) {
                discovered.files.push(input.clone());
            } else {
                discovered.reject(input, "Unsupported image format".to_string());
            }
        } else if input.is_dir() {
            let before = discovered.files.len();
            scan_directory(input, recursive, matcher.as_ref(), &mut discovered);
            debug!(
                dir = %input.display(),
                count = discovered.files.len() - before,
                "Scanned directory"
            );
        } else {
            discovered.reject(input, "Input path does not exist".to_string());
        }
    }

    discovered.files.sort();
    discovered.files.dedup();
    Ok(discovered)
}

fn matches(path: &Path, matcher: Option<&glob::Pattern>) -> bool {
    match matcher {
        Some(pattern) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| pattern.matches(name)),
        None => true,
    }
}

fn scan_directory(
    dir: &Path,
    recursive: bool,
    matcher: Option<&glob::Pattern>,
    discovered: &mut DiscoveredInputs,
) {
    let max_depth = if recursive { usize::MAX } else { 1 };

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                discovered.reject(&path, format!("Failed to read directory entry: {}", e));
                continue;
            },
        };
        let path = entry.path();
        if entry.file_type().is_file()
            && ImageIOService::is_supported_format(path)
            && matches(path, matcher)
            && !is_previous_output(path)
        {
            discovered.files.push(path.to_path_buf());
        }
    }
}

/// Results of an earlier run sitting next to their inputs
fn is_previous_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.ends_with(super::io::OUTPUT_SUFFIX))
}
