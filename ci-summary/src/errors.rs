// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use ci_summary_metadata::CiSummaryExitCode;
use ci_summary_runner::errors::{
    ConfigParseError, DiscoveryError, ExtractionError, PipelineBuildError, PipelineError,
    ReportError, SummaryWriteError,
};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that ci-summary knows how to report, with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("failed to parse log filter")]
    LogFilterParse {
        filter: String,
        #[source]
        err: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to create log file")]
    LogFileCreate {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("pipeline build error")]
    PipelineBuildError {
        #[from]
        err: PipelineBuildError,
    },
    #[error("discovery error")]
    DiscoveryError {
        #[from]
        err: DiscoveryError,
    },
    #[error("extraction error")]
    ExtractionError {
        #[from]
        err: ExtractionError,
    },
    #[error("report error")]
    ReportError {
        #[from]
        err: ReportError,
    },
    #[error("summary write error")]
    SummaryWriteError {
        #[from]
        err: SummaryWriteError,
    },
}

impl From<PipelineError> for ExpectedError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Discovery(err) => err.into(),
            PipelineError::Extraction(err) => err.into(),
            PipelineError::Report(err) => err.into(),
        }
    }
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::LogFilterParse { .. }
            | Self::LogFileCreate { .. }
            | Self::ConfigParseError { .. }
            | Self::PipelineBuildError { .. } => CiSummaryExitCode::SETUP_ERROR,
            Self::DiscoveryError { err } => {
                if err.is_not_found() {
                    CiSummaryExitCode::NO_RESULT_FILES
                } else {
                    CiSummaryExitCode::SETUP_ERROR
                }
            }
            Self::ExtractionError { .. } => CiSummaryExitCode::EXTRACTION_FAILED,
            Self::ReportError { .. } | Self::SummaryWriteError { .. } => {
                CiSummaryExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::LogFilterParse { filter, err } => {
                error!(
                    "failed to parse log filter `{}` from {}",
                    filter.style(styles.bold),
                    crate::output::LOG_ENV,
                );
                Some(err as &dyn Error)
            }
            Self::LogFileCreate { path, err } => {
                error!("failed to create log file `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config file `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::PipelineBuildError { err } => {
                error!("failed to set up the summary pipeline");
                Some(err as &dyn Error)
            }
            Self::DiscoveryError { err } => {
                match err {
                    DiscoveryError::InputNotFound { input_dir } => {
                        error!(
                            "cannot find input directory `{}`, aborting",
                            input_dir.style(styles.bold)
                        );
                    }
                    DiscoveryError::NoResultFiles {
                        input_dir,
                        extension,
                    } => {
                        error!(
                            "found 0 .{extension} files in `{}`, cannot proceed with extraction",
                            input_dir.style(styles.bold)
                        );
                    }
                    other => error!("{other}"),
                }
                err.source()
            }
            Self::ExtractionError { err } => {
                error!("unexpected error while extracting results, aborting");
                Some(err as &dyn Error)
            }
            Self::ReportError { err } => {
                error!("{err}");
                err.source()
            }
            Self::SummaryWriteError { err } => {
                error!("{err}");
                err.source()
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exit_codes() {
        let not_found: ExpectedError = PipelineError::Discovery(DiscoveryError::NoResultFiles {
            input_dir: "results".into(),
            extension: "xml".to_owned(),
        })
        .into();
        assert_eq!(not_found.process_exit_code(), CiSummaryExitCode::NO_RESULT_FILES);

        let missing: ExpectedError = DiscoveryError::InputNotFound {
            input_dir: "results".into(),
        }
        .into();
        assert_eq!(missing.process_exit_code(), CiSummaryExitCode::NO_RESULT_FILES);

        let fatal: ExpectedError = PipelineError::Extraction(ExtractionError::WorkerPanicked {
            path: "results/a.xml".into(),
            message: "oops".to_owned(),
        })
        .into();
        assert_eq!(fatal.process_exit_code(), CiSummaryExitCode::EXTRACTION_FAILED);

        let report: ExpectedError = ReportError::Read {
            path: "ci_summary.html".into(),
            err: std::io::Error::other("denied"),
        }
        .into();
        assert_eq!(report.process_exit_code(), CiSummaryExitCode::WRITE_OUTPUT_ERROR);
    }
}
