// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `ci-summary` failures.
///
/// A run that completes exits with [`OK`](Self::OK), even if individual result files were
/// skipped or tests failed: the report is the place to look at those. The codes below are
/// produced when the run itself could not complete.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum CiSummaryExitCode {}

impl CiSummaryExitCode {
    /// No errors occurred and ci-summary exited normally.
    pub const OK: i32 = 0;

    /// The input directory does not exist, or no result files were left under it after
    /// filtering.
    pub const NO_RESULT_FILES: i32 = 4;

    /// A user issue happened while setting up a run, such as an invalid config file or log
    /// filter.
    pub const SETUP_ERROR: i32 = 96;

    /// An unexpected error occurred while extracting results. No report was written.
    pub const EXTRACTION_FAILED: i32 = 104;

    /// Writing the report, its backup, or the JSON summary produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
