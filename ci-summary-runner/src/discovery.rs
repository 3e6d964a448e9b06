// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding result files under an input directory.

use crate::{
    config::DiscoveryConfig,
    errors::{DiscoveryError, PatternBuildError},
    helpers::plural,
};
use aho_corasick::AhoCorasick;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Decides which files under the input directory are result files.
///
/// Paths are matched relative to the input directory, so the name of the input directory itself
/// never causes a file to be included or excluded.
#[derive(Clone, Debug)]
pub struct DiscoveryFilter {
    extension: String,
    mode: FilterMode,
}

#[derive(Clone, Debug)]
enum FilterMode {
    All,
    OnlyFile(String),
    Include(Box<AhoCorasick>),
    Exclude(Box<AhoCorasick>),
}

impl DiscoveryFilter {
    /// Builds a filter from configuration.
    ///
    /// Precedence is `only-file`, then `include` (if non-empty), then `exclude`.
    pub fn new(config: &DiscoveryConfig) -> Result<Self, PatternBuildError> {
        let extension = config.extension.trim_start_matches('.').to_owned();

        let mode = if let Some(only_file) = config.only_file() {
            FilterMode::OnlyFile(only_file.to_owned())
        } else if let Some(include) = build_matcher("include", &config.include)? {
            FilterMode::Include(include)
        } else if let Some(exclude) = build_matcher("exclude", &config.exclude)? {
            FilterMode::Exclude(exclude)
        } else {
            FilterMode::All
        };

        Ok(Self { extension, mode })
    }

    /// The extension result files must have, without a leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns true if `path` has the result file extension.
    pub fn has_extension(&self, path: &Utf8Path) -> bool {
        path.extension() == Some(self.extension.as_str())
    }

    /// Returns true if a path (relative to the input directory) passes the name filters.
    ///
    /// The extension is not checked here.
    pub fn is_match(&self, relative_path: &str) -> bool {
        match &self.mode {
            FilterMode::All => true,
            FilterMode::OnlyFile(only_file) => relative_path.contains(only_file.as_str()),
            FilterMode::Include(include) => include.is_match(relative_path),
            FilterMode::Exclude(exclude) => !exclude.is_match(relative_path),
        }
    }
}

/// Builds a substring matcher, or returns `None` if there are no non-empty patterns.
pub(crate) fn build_matcher(
    kind: &'static str,
    patterns: &[String],
) -> Result<Option<Box<AhoCorasick>>, PatternBuildError> {
    let patterns: Vec<&str> = patterns
        .iter()
        .map(String::as_str)
        .filter(|pattern| !pattern.is_empty())
        .collect();
    if patterns.is_empty() {
        return Ok(None);
    }

    let matcher = AhoCorasick::new(&patterns).map_err(|err| PatternBuildError::new(kind, err))?;
    Ok(Some(Box::new(matcher)))
}

/// Recursively finds result files under `input_dir`.
///
/// Symlinks are followed, so a link to a regular file counts as a result file. Dangling links and
/// link cycles are logged and skipped. The returned paths are sorted.
/// Returns [`DiscoveryError::NoResultFiles`] if nothing is left after filtering.
pub fn discover_result_files(
    input_dir: &Utf8Path,
    filter: &DiscoveryFilter,
) -> Result<Vec<Utf8PathBuf>, DiscoveryError> {
    if !input_dir.exists() {
        return Err(DiscoveryError::InputNotFound {
            input_dir: input_dir.to_owned(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_broken_link(&err) => {
                warn!("skipping unreadable link: {err}");
                continue;
            }
            Err(err) => {
                return Err(DiscoveryError::Walk {
                    input_dir: input_dir.to_owned(),
                    err,
                });
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = Utf8PathBuf::from_path_buf(entry.into_path())
            .map_err(|path| DiscoveryError::NonUtf8Path { path })?;
        if !filter.has_extension(&path) {
            continue;
        }

        let relative = path.strip_prefix(input_dir).unwrap_or(&path);
        if filter.is_match(relative.as_str()) {
            files.push(path);
        } else {
            debug!("skipping {path}: filtered out by discovery settings");
        }
    }

    if files.is_empty() {
        return Err(DiscoveryError::NoResultFiles {
            input_dir: input_dir.to_owned(),
            extension: filter.extension().to_owned(),
        });
    }

    debug!(
        "extracting results from {} .{} {} in {input_dir}",
        files.len(),
        filter.extension(),
        plural::files_str(files.len()),
    );
    info!("list of result files to be processed:");
    for file in &files {
        info!(" -- {file}");
    }

    Ok(files)
}

fn is_broken_link(err: &walkdir::Error) -> bool {
    if err.loop_ancestor().is_some() {
        return true;
    }
    let dangling = err
        .io_error()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound);
    dangling && err.path().is_some_and(|path| path.is_symlink())
}
