// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while reading a result document into a [`Document`](crate::Document).
///
/// Every variant describes a problem with the input itself, never with the reader.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The document is not well-formed XML, or cannot be decoded in its declared encoding.
    #[error("malformed XML")]
    Xml(#[from] quick_xml::Error),

    /// The document does not contain a root element.
    #[error("document has no root element")]
    NoRootElement,

    /// A second top-level element was found after the root element closed.
    #[error("unexpected element `<{name}>` after the root element")]
    MultipleRoots {
        /// The name of the extra element.
        name: String,
    },

    /// The document ended while elements were still open.
    #[error("unexpected end of document (`<{open}>` was never closed)")]
    UnexpectedEof {
        /// The innermost element that was still open.
        open: String,
    },
}
