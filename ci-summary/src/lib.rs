// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summarize JUnit XML results from a CI run into an HTML report.
//!
//! This crate holds the command-line front end: argument parsing, logging setup and mapping of
//! errors to exit codes. The pipeline itself lives in `ci-summary-runner`.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{Color, LOG_ENV, OutputContext, StderrStyles};
