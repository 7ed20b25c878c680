//! Owned XML element trees
//!
//! Models and algorithms serialize to an [`XmlElement`] and are rebuilt from
//! one. Documents are read and written with `quick-xml`. Text inside the root
//! is kept exactly as written; whitespace around the root is ignored.

use crate::error::XmlError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{BufRead, Write};

/// Child of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create empty element
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// With attribute (replaces an existing one of the same name)
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// With child element
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// With text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Set attribute value
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Attribute value by name
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with `name`
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.name == name)
    }

    /// Concatenated direct text content
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut element = Self::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn write_into<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        for child in &self.children {
            match child {
                XmlNode::Element(el) => el.write_into(writer)?,
                XmlNode::Text(text) => write_event(writer, Event::Text(BytesText::new(text)))?,
            }
        }
        write_event(writer, Event::End(BytesEnd::new(self.name.as_str())))
    }
}

/// A complete document: exactly one root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    /// Wrap a root element
    #[inline]
    #[must_use]
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Parse a document from a buffered reader
    ///
    /// # Errors
    /// - `XmlError::Parse` for syntax errors (mismatched tags included)
    /// - `XmlError::Malformed` for unclosed elements or several roots
    /// - `XmlError::Empty` if there is no root element
    pub fn parse<R: BufRead>(input: R) -> Result<Self, XmlError> {
        let mut reader = Reader::from_reader(input);

        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => stack.push(XmlElement::from_start(&e)?),
                Event::Empty(e) => {
                    let element = XmlElement::from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Malformed("unexpected end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let text = t.unescape()?.into_owned();
                    push_text(&mut stack, text)?;
                }
                Event::CData(c) => {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    push_text(&mut stack, text)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Malformed(format!("unclosed element <{}>", open.name)));
        }
        root.map(Self::new).ok_or(XmlError::Empty)
    }

    /// Write the document with an XML declaration
    ///
    /// # Errors
    /// Returns `XmlError::Write` if the sink fails
    pub fn write_to<W: Write>(&self, sink: W) -> Result<(), XmlError> {
        let mut writer = Writer::new(sink);
        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        self.root.write_into(&mut writer)
    }

    /// Serialize to bytes
    ///
    /// # Errors
    /// Returns `XmlError::Write` if the writer fails
    pub fn to_bytes(&self) -> Result<Vec<u8>, XmlError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

fn write_event<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Write(e.to_string()))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::Malformed("multiple root elements".to_string()));
    }
    *root = Some(element);
    Ok(())
}

/// Adjacent text (e.g. CDATA next to plain text) is merged into one node
fn push_text(stack: &mut [XmlElement], text: String) -> Result<(), XmlError> {
    if text.is_empty() {
        return Ok(());
    }
    let Some(parent) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(XmlError::Malformed("text outside the root element".to_string()));
    };
    match parent.children.last_mut() {
        Some(XmlNode::Text(previous)) => previous.push_str(&text),
        _ => parent.children.push(XmlNode::Text(text)),
    }
    Ok(())
}
