// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extracting test cases from a single result file.
//!
//! Each result file contributes to at most one suite. Problems with the file itself are reported
//! as a [`SkipReason`] and never abort the run; anything else is an [`ExtractionError`].

use crate::{
    config::ExtractConfig,
    discovery::build_matcher,
    errors::{ExtractionError, PatternBuildError},
    helpers::plural,
    registry::{ClaimError, SuiteCollision, SuiteRegistry},
};
use aho_corasick::AhoCorasick;
use camino::Utf8Path;
use ci_summary_junit::{Document, ParseError, TESTCASE_TAG, TestCase};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Options controlling how result files are read.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    skip_patterns: Vec<String>,
    skip_matcher: Option<Box<AhoCorasick>>,
    debug: bool,
}

impl ExtractOptions {
    /// Builds extraction options from configuration.
    pub fn new(config: &ExtractConfig) -> Result<Self, PatternBuildError> {
        let skip_patterns: Vec<String> = config
            .skip_files
            .iter()
            .filter(|pattern| !pattern.is_empty())
            .cloned()
            .collect();
        let skip_matcher = build_matcher("skip-files", &skip_patterns)?;
        Ok(Self {
            skip_patterns,
            skip_matcher,
            debug: false,
        })
    }

    /// If set, documents that yield no test cases are logged in full.
    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }

    /// Returns the skip pattern matching this file's name, if any.
    fn skip_pattern(&self, path: &Utf8Path) -> Option<&str> {
        let matcher = self.skip_matcher.as_ref()?;
        let file_name = path.file_name()?;
        let found = matcher.find(file_name)?;
        Some(self.skip_patterns[found.pattern().as_usize()].as_str())
    }
}

/// The result of processing one result file.
#[derive(Debug)]
pub enum FileOutcome {
    /// The file contributed test cases to a suite.
    Contributed {
        /// The suite the file claimed.
        suite: String,

        /// The number of test cases read.
        tests: usize,
    },

    /// The file was processed but contributed nothing.
    Skipped(SkipReason),
}

impl FileOutcome {
    /// Returns `(files, tests)` contributed by this file.
    pub fn counts(&self) -> (usize, usize) {
        match self {
            FileOutcome::Contributed { tests, .. } => (1, *tests),
            FileOutcome::Skipped(_) => (0, 0),
        }
    }
}

/// Why a result file contributed no test cases.
#[derive(Debug)]
pub enum SkipReason {
    /// The file could not be parsed.
    ParseFailed(ParseError),

    /// The document's root element has no `name` attribute.
    MissingSuiteName,

    /// Another file already claimed this file's suite name.
    Collision(SuiteCollision),

    /// The file name matched a skip pattern. Its suite name stays claimed.
    ExcludedFile {
        /// The pattern that matched.
        pattern: String,
    },

    /// The document contains no test cases. Its suite name stays claimed.
    NoTestCases {
        /// The suite the file claimed.
        suite: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ParseFailed(err) => write!(f, "parse failed: {err}"),
            SkipReason::MissingSuiteName => write!(f, "root element has no suite name"),
            SkipReason::Collision(collision) => write!(f, "{collision}"),
            SkipReason::ExcludedFile { pattern } => {
                write!(f, "file name matches skip pattern `{pattern}`")
            }
            SkipReason::NoTestCases { suite } => {
                write!(f, "no test cases found for suite `{suite}`")
            }
        }
    }
}

/// Reads result files into a shared [`SuiteRegistry`].
#[derive(Debug)]
pub struct ExtractionWorker<'a> {
    options: &'a ExtractOptions,
    registry: &'a SuiteRegistry,
}

impl<'a> ExtractionWorker<'a> {
    /// Creates a new worker.
    pub fn new(options: &'a ExtractOptions, registry: &'a SuiteRegistry) -> Self {
        Self { options, registry }
    }

    /// Processes a single result file.
    pub fn extract(&self, path: &Utf8Path) -> Result<FileOutcome, ExtractionError> {
        let bytes = fs_err::read(path).map_err(|err| ExtractionError::Read {
            path: path.to_owned(),
            err,
        })?;

        let document = match Document::from_bytes(&bytes) {
            Ok(document) => document,
            Err(err) => {
                error!("error on {path}: {err}. Skipping; results from this file will be missing");
                return Ok(FileOutcome::Skipped(SkipReason::ParseFailed(err)));
            }
        };

        let Some(suite_name) = document.root().attribute("name") else {
            error!(
                "root element <{}> of {path} has no suite name. Skipping",
                document.root().name()
            );
            return Ok(FileOutcome::Skipped(SkipReason::MissingSuiteName));
        };
        debug!("processing archive {path} for test suite {suite_name}");

        let mut claim = match self.registry.claim(suite_name, path) {
            Ok(claim) => claim,
            Err(ClaimError::Collision(collision)) => {
                error!(
                    "duplicate suite name `{suite_name}` in {path}{}. Skipping this file",
                    match &collision.existing_archive {
                        Some(existing) => format!(" (already claimed by {existing})"),
                        None => String::new(),
                    }
                );
                return Ok(FileOutcome::Skipped(SkipReason::Collision(collision)));
            }
            Err(ClaimError::Poisoned(_)) => {
                return Err(ExtractionError::RegistryPoisoned {
                    path: path.to_owned(),
                });
            }
        };

        if let Some(pattern) = self.options.skip_pattern(path) {
            debug!("skipping {path}: file name matches skip pattern `{pattern}`");
            return Ok(FileOutcome::Skipped(SkipReason::ExcludedFile {
                pattern: pattern.to_owned(),
            }));
        }

        let mut tests = 0;
        for element in document.root().descendants(TESTCASE_TAG) {
            claim.add_testcase(TestCase::from_element(suite_name, element, path));
            tests += 1;
        }

        if tests == 0 {
            warn!(
                "{path} parsed but contains no test cases. \
                 Add it to the discovery or extraction exclusions to skip it"
            );
            if self.options.debug {
                info!("contents of {path}:\n{}", String::from_utf8_lossy(&bytes));
            }
            return Ok(FileOutcome::Skipped(SkipReason::NoTestCases {
                suite: suite_name.to_owned(),
            }));
        }

        claim.add_file(path);
        let suite = claim.name().to_owned();
        claim
            .commit()
            .map_err(|_| ExtractionError::RegistryPoisoned {
                path: path.to_owned(),
            })?;
        debug!(
            "read {tests} {} from {path} into suite {suite}",
            plural::tests_str(tests)
        );

        Ok(FileOutcome::Contributed { suite, tests })
    }
}
