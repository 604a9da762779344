//! XML serialization of a committed revision.

use crate::error::{CoreError, CoreResult};
use crate::node::NodeKind;
use crate::trx::NodeReadTrx;
use crate::types::NodeKey;
use std::io::Write;
use sylva_xml::{XmlElement, XmlNode, XmlWriter};

/// Namespace of the `rest:` prefix used for node ids and the envelope.
pub const REST_NAMESPACE: &str = "https://sylva.dev/rest";

/// Attribute carrying the node key of an element.
pub const REST_ID_ATTRIBUTE: &str = "rest:id";

/// Returns true if `name` is reserved for the serializer's own markup.
#[must_use]
pub fn is_reserved_name(name: &str) -> bool {
    name == "xmlns:rest" || name.starts_with("rest:")
}

/// Checks that no element or attribute below `element` uses a reserved
/// name.
///
/// # Errors
///
/// `ReservedName` with the first offending name in document order.
pub fn check_reserved_names(element: &XmlElement) -> CoreResult<()> {
    let mut pending = vec![element];
    while let Some(element) = pending.pop() {
        let reserved = std::iter::once(element.name.as_str())
            .chain(element.attributes.iter().map(|a| a.name.as_str()))
            .find(|name| is_reserved_name(name));
        if let Some(name) = reserved {
            return Err(CoreError::ReservedName {
                name: name.to_string(),
            });
        }
        pending.extend(element.children.iter().rev().filter_map(|child| match child {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        }));
    }
    Ok(())
}

/// Serialization options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerOptions {
    /// Annotate every element with its node key.
    pub emit_ids: bool,
    /// Indent nested elements.
    pub pretty_print: bool,
    /// Wrap the document in `<rest:sequence><rest:item>`.
    pub rest_envelope: bool,
}

impl SerializerOptions {
    /// Options used for REST responses: ids and envelope enabled.
    #[must_use]
    pub const fn rest() -> Self {
        Self {
            emit_ids: true,
            pretty_print: false,
            rest_envelope: true,
        }
    }

    /// Sets pretty printing.
    #[must_use]
    pub const fn with_pretty_print(mut self, value: bool) -> Self {
        self.pretty_print = value;
        self
    }
}

enum Step {
    Enter(NodeKey),
    Exit,
}

/// Writes the node tree of a read transaction as XML.
///
/// ```rust,ignore
/// let out = XmlSerializer::new(&session.begin_read())
///     .emit_ids()
///     .rest_envelope()
///     .serialize(Vec::new())?;
/// ```
pub struct XmlSerializer<'a> {
    trx: &'a NodeReadTrx,
    options: SerializerOptions,
}

impl<'a> XmlSerializer<'a> {
    /// Creates a serializer with all options off.
    #[must_use]
    pub fn new(trx: &'a NodeReadTrx) -> Self {
        Self {
            trx,
            options: SerializerOptions::default(),
        }
    }

    /// Replaces all options.
    #[must_use]
    pub fn with_options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    /// Annotates elements with `rest:id`.
    #[must_use]
    pub fn emit_ids(mut self) -> Self {
        self.options.emit_ids = true;
        self
    }

    /// Indents nested elements.
    #[must_use]
    pub fn pretty_print(mut self) -> Self {
        self.options.pretty_print = true;
        self
    }

    /// Wraps the output in the REST envelope.
    #[must_use]
    pub fn rest_envelope(mut self) -> Self {
        self.options.rest_envelope = true;
        self
    }

    /// Serializes into `out` and returns it.
    pub fn serialize<W: Write>(self, out: W) -> CoreResult<W> {
        let mut writer = if self.options.pretty_print {
            XmlWriter::pretty(out)
        } else {
            XmlWriter::new(out)
        };

        if self.options.rest_envelope {
            writer.open_element("rest:sequence", [("xmlns:rest", REST_NAMESPACE)])?;
            writer.open_element("rest:item", [])?;
        }

        // Top-level elements declare the prefix themselves when no envelope
        // does it for them.
        let declare_at = if self.options.emit_ids && !self.options.rest_envelope {
            Some(NodeKey::DOCUMENT_ROOT)
        } else {
            None
        };

        let mut pending = vec![Step::Enter(NodeKey::DOCUMENT_ROOT)];
        while let Some(step) = pending.pop() {
            let key = match step {
                Step::Enter(key) => key,
                Step::Exit => {
                    writer.close_element()?;
                    continue;
                }
            };
            let Some(node) = self.trx.get(key) else {
                continue;
            };

            match &node.kind {
                NodeKind::Document => {}
                NodeKind::Text { value } => {
                    writer.text(value)?;
                    continue;
                }
                NodeKind::Element { name, attributes } => {
                    let id = key.to_string();
                    let mut attrs: Vec<(&str, &str)> = Vec::with_capacity(attributes.len() + 2);
                    if declare_at.is_some() && node.parent == declare_at {
                        attrs.push(("xmlns:rest", REST_NAMESPACE));
                    }
                    if self.options.emit_ids {
                        attrs.push((REST_ID_ATTRIBUTE, &id));
                    }
                    attrs.extend(attributes.iter().map(|(n, v)| (n.as_str(), v.as_str())));
                    writer.open_element(name, attrs)?;
                    pending.push(Step::Exit);
                }
            }
            pending.extend(node.children.iter().rev().map(|&child| Step::Enter(child)));
        }

        Ok(writer.finish()?)
    }

    /// Serializes into a string.
    pub fn to_xml_string(self) -> CoreResult<String> {
        let bytes = self.serialize(Vec::new())?;
        String::from_utf8(bytes).map_err(|e| CoreError::encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, ResourceConfig};
    use crate::Databases;
    use tempfile::tempdir;

    fn with_document<F: FnOnce(NodeReadTrx)>(xml: &str, f: F) {
        let temp = tempdir().unwrap();
        let databases = Databases::new().sync_on_write(false);
        let config = DatabaseConfig::in_root(temp.path(), "db").sync_on_write(false);
        databases.create_database(&config).unwrap();
        let db = databases.open_database(&config.path).unwrap();
        db.create_resource(&ResourceConfig::new("r")).unwrap();
        let session = db.open_resource("r").unwrap();
        let mut wtx = session.begin_write().unwrap();
        wtx.insert_subtree_as_first_child(&sylva_xml::parse(xml).unwrap())
            .unwrap();
        wtx.commit().unwrap();
        f(session.begin_read());
    }

    #[test]
    fn plain_output_matches_input() {
        with_document(r#"<a x="1"><b/>t &amp; u</a>"#, |rtx| {
            let out = XmlSerializer::new(&rtx).to_xml_string().unwrap();
            assert_eq!(out, r#"<a x="1"><b/>t &amp; u</a>"#);
        });
    }

    #[test]
    fn ids_declare_namespace_without_envelope() {
        with_document("<a><b/></a>", |rtx| {
            let out = XmlSerializer::new(&rtx).emit_ids().to_xml_string().unwrap();
            assert_eq!(
                out,
                r#"<a xmlns:rest="https://sylva.dev/rest" rest:id="1"><b rest:id="2"/></a>"#
            );
        });
    }

    #[test]
    fn rest_envelope_wraps_document() {
        with_document("<a><b/></a>", |rtx| {
            let out = XmlSerializer::new(&rtx)
                .with_options(SerializerOptions::rest())
                .to_xml_string()
                .unwrap();
            assert_eq!(
                out,
                r#"<rest:sequence xmlns:rest="https://sylva.dev/rest"><rest:item><a rest:id="1"><b rest:id="2"/></a></rest:item></rest:sequence>"#
            );
        });
    }

    #[test]
    fn pretty_print_indents() {
        with_document("<a><b>x</b><c/></a>", |rtx| {
            let out = XmlSerializer::new(&rtx).pretty_print().to_xml_string().unwrap();
            assert_eq!(out, "<a>\n  <b>x</b>\n  <c/>\n</a>");
        });
    }

    #[test]
    fn empty_document_serializes_empty_envelope() {
        let temp = tempdir().unwrap();
        let databases = Databases::new();
        let config = DatabaseConfig::in_root(temp.path(), "db");
        databases.create_database(&config).unwrap();
        let db = databases.open_database(&config.path).unwrap();
        db.create_resource(&ResourceConfig::new("r")).unwrap();
        let session = db.open_resource("r").unwrap();

        let rtx = session.begin_read();
        assert_eq!(XmlSerializer::new(&rtx).to_xml_string().unwrap(), "");
        let enveloped = XmlSerializer::new(&rtx).rest_envelope().to_xml_string().unwrap();
        assert_eq!(
            enveloped,
            r#"<rest:sequence xmlns:rest="https://sylva.dev/rest"><rest:item/></rest:sequence>"#
        );
    }
}
