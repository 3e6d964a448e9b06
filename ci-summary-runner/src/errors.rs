// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by ci-summary.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// An error that occurred while compiling a list of path substrings into a matcher.
#[derive(Debug, Error)]
#[error("failed to build {kind} pattern matcher")]
pub struct PatternBuildError {
    kind: &'static str,
    #[source]
    err: aho_corasick::BuildError,
}

impl PatternBuildError {
    pub(crate) fn new(kind: &'static str, err: aho_corasick::BuildError) -> Self {
        Self { kind, err }
    }
}

/// An error that occurred while discovering result files.
///
/// All of these are configuration errors: they are reported before any extraction begins.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The input directory does not exist.
    #[error("input directory `{input_dir}` not found")]
    InputNotFound {
        /// The input directory.
        input_dir: Utf8PathBuf,
    },

    /// No result files were left after filtering.
    #[error("found 0 .{extension} files in `{input_dir}`")]
    NoResultFiles {
        /// The input directory.
        input_dir: Utf8PathBuf,

        /// The extension searched for.
        extension: String,
    },

    /// Walking the input directory failed.
    #[error("error walking input directory `{input_dir}`")]
    Walk {
        /// The input directory.
        input_dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// A path under the input directory was not valid UTF-8.
    #[error("path `{}` is not valid UTF-8", path.display())]
    NonUtf8Path {
        /// The offending path.
        path: std::path::PathBuf,
    },
}

impl DiscoveryError {
    /// Returns true if this error indicates that no usable input was found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InputNotFound { .. } | Self::NoResultFiles { .. })
    }
}

/// A fatal error that occurred while extracting results from a file.
///
/// Problems with the input itself (malformed documents, suite name collisions, files with no
/// test cases) are not errors: they are reported as a
/// [`SkipReason`](crate::extract::SkipReason). An `ExtractionError` aborts the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    /// The result file could not be read.
    #[error("error reading result file `{path}`")]
    Read {
        /// The result file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Another worker panicked while holding the suite registry lock.
    #[error("suite registry lock poisoned while processing `{path}`")]
    RegistryPoisoned {
        /// The result file being processed.
        path: Utf8PathBuf,
    },

    /// A worker panicked.
    #[error("extraction worker panicked while processing `{path}`: {message}")]
    WorkerPanicked {
        /// The result file being processed.
        path: Utf8PathBuf,

        /// The panic message, if it was a string.
        message: String,
    },
}

/// An error that occurred while constructing a [`SummaryPipeline`](crate::pipeline::SummaryPipeline).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineBuildError {
    /// A discovery or extraction pattern list could not be compiled.
    #[error(transparent)]
    Pattern(#[from] PatternBuildError),

    /// The extraction worker pool could not be started.
    #[error("failed to build extraction worker pool")]
    Pool(#[source] rayon::ThreadPoolBuildError),
}

/// An error that occurred while writing the report.
///
/// The backup is written before the report is overwritten, so a failure here never loses the
/// previous report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    /// Creating an empty report shell failed.
    #[error("error creating report `{path}`")]
    CreateShell {
        /// The report path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Reading the existing report failed.
    #[error("error reading report `{path}`")]
    Read {
        /// The report path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Copying the existing report to its backup failed.
    #[error("error backing up report to `{backup}`")]
    Backup {
        /// The backup path.
        backup: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Writing the new report failed.
    #[error("error writing report `{path}`")]
    Write {
        /// The report path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: atomicwrites::Error<std::io::Error>,
    },
}

/// An error that occurred while writing the machine-readable summary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SummaryWriteError {
    /// Serializing the summary failed.
    #[error("error serializing run summary")]
    Serialize(#[source] serde_json::Error),

    /// Writing the summary file failed.
    #[error("error writing run summary to `{path}`")]
    Write {
        /// The summary path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: atomicwrites::Error<std::io::Error>,
    },
}

/// An error that aborted a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Discovering result files failed.
    #[error("result file discovery failed")]
    Discovery(#[from] DiscoveryError),

    /// An unexpected error occurred during extraction.
    #[error("result extraction failed")]
    Extraction(#[from] ExtractionError),

    /// Writing the report failed.
    #[error("report emission failed")]
    Report(#[from] ReportError),
}

/// Displays an error along with its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut next_error = self.error.source();
        while let Some(err) = next_error {
            write!(f, "\n  caused by: {err}")?;
            next_error = err.source();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_chain() {
        let err = PipelineError::Extraction(ExtractionError::Read {
            path: "results/a.xml".into(),
            err: std::io::Error::other("disk on fire"),
        });
        assert_eq!(
            DisplayErrorChain::new(&err).to_string(),
            "result extraction failed\n  caused by: error reading result file `results/a.xml`\n  \
             caused by: disk on fire"
        );
    }
}
