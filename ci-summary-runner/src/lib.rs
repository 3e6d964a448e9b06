// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for `ci-summary`.
//!
//! A run discovers result files under an input directory, extracts them in parallel into a
//! [`SuiteRegistry`](registry::SuiteRegistry) that allows each suite name to be claimed once,
//! tallies the results, and appends failure details to an HTML report. See
//! [`SummaryPipeline`](pipeline::SummaryPipeline) for the entry point.

pub mod config;
pub mod discovery;
pub mod errors;
pub mod extract;
mod helpers;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod summary;
