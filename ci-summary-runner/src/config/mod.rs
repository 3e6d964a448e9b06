// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for ci-summary.
//!
//! Configuration is layered: the default config embedded in the binary is read first, and an
//! optional user-provided TOML file is merged on top of it. Command-line overrides are applied
//! by the caller to the resulting [`CiSummaryConfig`].

mod imp;

pub use imp::*;
