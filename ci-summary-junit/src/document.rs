// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An owned element tree for result documents.

use crate::errors::ParseError;
use indexmap::IndexMap;
use quick_xml::{
    Decoder, Reader,
    escape::unescape,
    events::{BytesStart, Event},
};

/// A parsed result document.
///
/// Only elements, attributes and character data are retained. Comments, processing instructions
/// and the XML declaration are dropped.
#[derive(Clone, Debug)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parses a document from raw bytes.
    ///
    /// The character encoding is taken from a byte order mark or the `encoding` of the XML
    /// declaration, and defaults to UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        Self::read(Reader::from_reader(bytes))
    }

    /// Parses a document from a string.
    ///
    /// The whole document is materialized in memory. Mismatched end tags, truncated input and
    /// content after the root element are all reported as errors.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::read(Reader::from_str(text))
    }

    fn read(mut reader: Reader<&[u8]>) -> Result<Self, ParseError> {
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            // The decoder can change once the XML declaration has been read.
            let decoder = reader.decoder();
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => {
                    let element = Element::from_start(&start, decoder)?;
                    if stack.is_empty() {
                        ensure_single_root(root.as_ref(), &element)?;
                    }
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = Element::from_start(&start, decoder)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => {
                            ensure_single_root(root.as_ref(), &element)?;
                            root = Some(element);
                        }
                    }
                }
                Event::End(_) => {
                    // quick-xml has already checked that this matches the open element.
                    if let Some(element) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(element),
                            None => root = Some(element),
                        }
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let decoded = decoder.decode(&text).map_err(quick_xml::Error::from)?;
                        current
                            .text
                            .push_str(&unescape(&decoded).map_err(quick_xml::Error::from)?);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(current) = stack.last_mut() {
                        let decoded = decoder.decode(&cdata).map_err(quick_xml::Error::from)?;
                        current.text.push_str(&decoded);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(ParseError::UnexpectedEof {
                open: open.name.clone(),
            });
        }

        root.map(|root| Self { root })
            .ok_or(ParseError::NoRootElement)
    }

    /// Returns the root element.
    pub fn root(&self) -> &Element {
        &self.root
    }
}

fn ensure_single_root(root: Option<&Element>, next: &Element) -> Result<(), ParseError> {
    match root {
        Some(_) => Err(ParseError::MultipleRoots {
            name: next.name.clone(),
        }),
        None => Ok(()),
    }
}

/// A single element in a [`Document`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: IndexMap<String, String>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Creates a new element with no attributes, text or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Appends a child element.
    pub fn push_child(&mut self, child: Element) -> &mut Self {
        self.children.push(child);
        self
    }

    /// The tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unescaped value of an attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Character data directly inside this element (text and CDATA, concatenated).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The first direct child with the given tag name.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == tag)
    }

    /// Iterates over every element named `tag` in the subtree rooted at `self`, including
    /// `self`, in depth-first pre-order (document order).
    ///
    /// The walk is not limited to direct children: a `<testcase>` nested under a
    /// `<testsuites><testsuite>` wrapper is found just like one directly under the root.
    pub fn descendants<'a>(&'a self, tag: &'a str) -> Descendants<'a> {
        Descendants {
            stack: vec![self],
            tag,
        }
    }

    fn from_start(start: &BytesStart<'_>, decoder: Decoder) -> Result<Self, ParseError> {
        let mut attributes = IndexMap::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = decoder
                .decode(attribute.key.as_ref())
                .map_err(quick_xml::Error::from)?
                .into_owned();
            let value = attribute.decode_and_unescape_value(decoder)?.into_owned();
            attributes.insert(key, value);
        }

        let name = decoder
            .decode(start.name().as_ref())
            .map_err(quick_xml::Error::from)?
            .into_owned();
        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }
}

/// Iterator returned by [`Element::descendants`].
#[derive(Clone, Debug)]
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
    tag: &'a str,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(element) = self.stack.pop() {
            // Children are pushed in reverse so they pop in document order.
            self.stack.extend(element.children.iter().rev());
            if element.name == self.tag {
                return Some(element);
            }
        }
        None
    }
}
