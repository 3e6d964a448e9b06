// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Machine-readable summary of a `ci-summary` run.
///
/// Written by `ci-summary --summary-json <PATH>`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunSummary {
    /// Aggregate totals across all suites.
    pub totals: TotalsSummary,

    /// Counts of result files that were skipped, by reason.
    pub skipped_files: SkippedFilesSummary,

    /// Per-suite counts, keyed by suite name.
    pub suites: BTreeMap<String, SuiteSummary>,
}

impl RunSummary {
    /// Parses a summary from JSON.
    pub fn parse_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes this summary as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Aggregate totals for a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TotalsSummary {
    /// The number of candidate result files examined.
    pub archives: usize,

    /// The number of result files that contributed test cases.
    pub files: usize,

    /// The number of suites in the registry.
    pub suites: usize,

    /// The number of test cases extracted.
    pub tests: usize,

    /// The number of passing test cases.
    pub passed: usize,

    /// The number of failing test cases (including errors).
    pub failed: usize,

    /// The number of skipped test cases.
    pub skipped: usize,
}

/// Counts of result files that did not contribute test cases.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SkippedFilesSummary {
    /// Files that could not be parsed.
    pub parse_failed: usize,

    /// Files whose root element had no suite name.
    pub missing_suite_name: usize,

    /// Files that declared a suite name already claimed by another file.
    pub collisions: usize,

    /// Files excluded by name after their suite was claimed.
    pub excluded: usize,

    /// Files that parsed but contained no test cases.
    pub no_test_cases: usize,
}

/// Counts for a single suite.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SuiteSummary {
    /// The number of passing test cases.
    pub passed: usize,

    /// The number of failing test cases (including errors).
    pub failed: usize,

    /// The number of skipped test cases.
    pub skipped: usize,

    /// The number of files that contributed test cases: 0 or 1.
    pub files: usize,

    /// The result file the suite was read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}
