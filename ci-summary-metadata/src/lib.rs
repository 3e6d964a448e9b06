// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Documented exit codes and machine-readable summaries for `ci-summary`.
//!
//! The types in this crate are stable and intended to be consumed by other tools in a CI
//! pipeline, for example to gate a merge on the number of failed tests.

mod exit_codes;
mod summary;

pub use exit_codes::*;
pub use summary::*;
