// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read JUnit/XUnit result files into a suite-oriented data model.
//!
//! Result files are loaded into an owned element tree with [`Document`], and test cases are
//! located anywhere in that tree with [`Element::descendants`]. Each matching element becomes a
//! [`TestCase`], and cases are grouped into a [`TestSuite`].

mod document;
mod errors;
mod model;
mod reader;

pub use document::*;
pub use errors::*;
pub use model::*;
pub use reader::*;
