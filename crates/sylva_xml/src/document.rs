//! Parsed document model.

use crate::writer::XmlWriter;
use std::io;

/// A name/value attribute pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified attribute name.
    pub name: String,
    /// Unescaped attribute value.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified element name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<Attribute>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an element without attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    /// Adds a child node.
    #[must_use]
    pub fn with_child(mut self, child: impl Into<XmlNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Looks up an attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Iterates over child elements, skipping text.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }
}

/// A node in a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// An element.
    Element(XmlElement),
    /// Character data (already unescaped).
    Text(String),
}

impl XmlNode {
    /// Counts this node and all its descendants.
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        match self {
            XmlNode::Text(_) => 1,
            XmlNode::Element(e) => 1 + e.children.iter().map(XmlNode::descendant_count).sum::<usize>(),
        }
    }
}

impl From<XmlElement> for XmlNode {
    fn from(element: XmlElement) -> Self {
        XmlNode::Element(element)
    }
}

/// A parsed document with exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    /// Wraps a root element.
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Returns the root element.
    #[must_use]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Consumes the document and returns its root element.
    #[must_use]
    pub fn into_root(self) -> XmlElement {
        self.root
    }

    /// Total number of element and text nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 1;
        for child in &self.root.children {
            count += child.descendant_count();
        }
        count
    }

    /// Writes the document as compact XML.
    pub fn write_to<W: io::Write>(&self, out: W) -> io::Result<W> {
        let mut writer = XmlWriter::new(out);
        write_element(&mut writer, &self.root)?;
        writer.finish()
    }

    /// Renders the document as a compact XML string.
    #[must_use]
    pub fn to_xml_string(&self) -> String {
        // Writing into a Vec cannot fail.
        let bytes = self.write_to(Vec::new()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn write_element<W: io::Write>(writer: &mut XmlWriter<W>, element: &XmlElement) -> io::Result<()> {
    writer.open_element(
        &element.name,
        element
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_str())),
    )?;
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(writer, e)?,
            XmlNode::Text(t) => writer.text(t)?,
        }
    }
    writer.close_element()
}
