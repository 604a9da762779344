//! XML parser.

use crate::document::{Attribute, XmlDocument, XmlElement, XmlNode};
use crate::error::{XmlError, XmlResult};

/// Maximum element nesting accepted from untrusted input.
/// Parsing is recursive, so this bounds stack usage.
pub const MAX_DEPTH: usize = 256;

/// Parses a document with default options.
///
/// Whitespace-only text between elements is dropped.
///
/// # Errors
///
/// Returns an error if the input is empty, not well-formed, or nests
/// deeper than [`MAX_DEPTH`].
pub fn parse(input: &str) -> XmlResult<XmlDocument> {
    Parser::new(input).parse()
}

/// A small non-validating XML parser.
///
/// Supports elements, attributes, character data, CDATA sections, the
/// predefined entities and numeric character references. The XML
/// declaration, processing instructions, comments and a DOCTYPE are
/// skipped.
pub struct Parser<'a> {
    input: &'a str,
    pos: usize,
    keep_whitespace: bool,
}

impl<'a> Parser<'a> {
    /// Creates a parser over the given input.
    pub fn new(input: &'a str) -> Self {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        Self {
            input,
            pos: 0,
            keep_whitespace: false,
        }
    }

    /// Keeps whitespace-only text nodes instead of dropping them.
    #[must_use]
    pub fn keep_whitespace(mut self, keep: bool) -> Self {
        self.keep_whitespace = keep;
        self
    }

    /// Parses the whole input as one document.
    pub fn parse(mut self) -> XmlResult<XmlDocument> {
        if self.input.trim().is_empty() {
            return Err(XmlError::EmptyDocument);
        }

        self.skip_misc()?;
        if self.at_end() {
            return Err(XmlError::EmptyDocument);
        }
        if !self.starts_with("<") {
            return Err(XmlError::syntax(self.pos, "content before root element"));
        }

        let root = self.parse_element(0)?;

        self.skip_misc()?;
        if !self.at_end() {
            return Err(XmlError::syntax(self.pos, "content after root element"));
        }

        Ok(XmlDocument::new(root))
    }

    fn parse_element(&mut self, depth: usize) -> XmlResult<XmlElement> {
        if depth >= MAX_DEPTH {
            return Err(XmlError::TooDeep { limit: MAX_DEPTH });
        }

        self.expect("<")?;
        let name = self.parse_name()?;
        let mut element = XmlElement::new(name);

        loop {
            let had_space = self.skip_whitespace();
            if self.starts_with("/>") {
                self.pos += 2;
                return Ok(element);
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            if self.at_end() {
                return Err(XmlError::UnexpectedEof { expected: "start tag" });
            }
            if !had_space {
                return Err(XmlError::syntax(self.pos, "expected whitespace before attribute"));
            }

            let attr_name = self.parse_name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            let value = self.parse_attribute_value()?;

            if element.attribute(&attr_name).is_some() {
                return Err(XmlError::DuplicateAttribute {
                    element: element.name,
                    name: attr_name,
                });
            }
            element.attributes.push(Attribute::new(attr_name, value));
        }

        self.parse_content(&mut element, depth)?;
        Ok(element)
    }

    fn parse_content(&mut self, element: &mut XmlElement, depth: usize) -> XmlResult<()> {
        let mut text = String::new();

        loop {
            if self.at_end() {
                return Err(XmlError::UnexpectedEof {
                    expected: "closing tag",
                });
            }

            if self.starts_with("</") {
                self.flush_text(element, &mut text);
                let tag_pos = self.pos;
                self.pos += 2;
                let found = self.parse_name()?;
                self.skip_whitespace();
                self.expect(">")?;
                if found != element.name {
                    return Err(XmlError::MismatchedTag {
                        expected: element.name.clone(),
                        found,
                        position: tag_pos,
                    });
                }
                return Ok(());
            } else if self.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let end = self.find("]]>", "CDATA section")?;
                text.push_str(&self.input[self.pos..end]);
                self.pos = end + 3;
            } else if self.starts_with("<!--") {
                self.skip_comment()?;
            } else if self.starts_with("<?") {
                self.skip_processing_instruction()?;
            } else if self.starts_with("<") {
                self.flush_text(element, &mut text);
                let child = self.parse_element(depth + 1)?;
                element.children.push(XmlNode::Element(child));
            } else {
                self.parse_char_data(&mut text)?;
            }
        }
    }

    fn flush_text(&self, element: &mut XmlElement, text: &mut String) {
        if text.is_empty() {
            return;
        }
        if self.keep_whitespace || !text.trim().is_empty() {
            element.children.push(XmlNode::Text(std::mem::take(text)));
        } else {
            text.clear();
        }
    }

    fn parse_char_data(&mut self, out: &mut String) -> XmlResult<()> {
        while let Some(c) = self.peek() {
            match c {
                '<' => break,
                '&' => {
                    let decoded = self.parse_reference()?;
                    out.push(decoded);
                }
                _ => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
        Ok(())
    }

    fn parse_attribute_value(&mut self) -> XmlResult<String> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            Some(_) => return Err(XmlError::syntax(self.pos, "expected quoted attribute value")),
            None => return Err(XmlError::UnexpectedEof {
                expected: "attribute value",
            }),
        };
        self.pos += 1;

        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(XmlError::UnexpectedEof {
                        expected: "attribute value",
                    })
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some('<') => return Err(XmlError::syntax(self.pos, "'<' in attribute value")),
                Some('&') => value.push(self.parse_reference()?),
                Some(c) => {
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn parse_reference(&mut self) -> XmlResult<char> {
        let start = self.pos;
        self.pos += 1;
        let end = self.find(";", "entity reference")?;
        let entity = &self.input[self.pos..end];
        self.pos = end + 1;

        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => {
                if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok().and_then(char::from_u32)
                } else {
                    None
                }
            }
        };

        decoded.ok_or_else(|| XmlError::UnknownEntity {
            entity: entity.to_string(),
            position: start,
        })
    }

    fn parse_name(&mut self) -> XmlResult<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {
                self.pos += c.len_utf8();
            }
            Some(_) => return Err(XmlError::syntax(self.pos, "invalid name start")),
            None => return Err(XmlError::UnexpectedEof { expected: "name" }),
        }
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.') {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// Skips whitespace, comments, processing instructions and a DOCTYPE.
    fn skip_misc(&mut self) -> XmlResult<()> {
        loop {
            self.skip_whitespace();
            if self.starts_with("<!--") {
                self.skip_comment()?;
            } else if self.starts_with("<?") {
                self.skip_processing_instruction()?;
            } else if self.starts_with("<!DOCTYPE") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_comment(&mut self) -> XmlResult<()> {
        self.pos += 4;
        let end = self.find("-->", "comment")?;
        self.pos = end + 3;
        Ok(())
    }

    fn skip_processing_instruction(&mut self) -> XmlResult<()> {
        self.pos += 2;
        let end = self.find("?>", "processing instruction")?;
        self.pos = end + 2;
        Ok(())
    }

    fn skip_doctype(&mut self) -> XmlResult<()> {
        let mut brackets = 0usize;
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            match c {
                '[' => brackets += 1,
                ']' => brackets = brackets.saturating_sub(1),
                '>' if brackets == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(XmlError::UnexpectedEof { expected: "DOCTYPE" })
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.pos > start
    }

    fn expect(&mut self, token: &str) -> XmlResult<()> {
        if self.starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else if self.at_end() {
            Err(XmlError::UnexpectedEof { expected: "markup" })
        } else {
            Err(XmlError::syntax(self.pos, format!("expected '{token}'")))
        }
    }

    fn find(&self, needle: &str, expected: &'static str) -> XmlResult<usize> {
        self.input[self.pos..]
            .find(needle)
            .map(|offset| self.pos + offset)
            .ok_or(XmlError::UnexpectedEof { expected })
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    #[inline]
    fn starts_with(&self, token: &str) -> bool {
        self.input[self.pos..].starts_with(token)
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements() {
        let doc = parse("<a><b/></a>").unwrap();
        assert_eq!(doc.root().name, "a");
        let children: Vec<_> = doc.root().child_elements().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "b");
        assert_eq!(doc.node_count(), 2);
    }

    #[test]
    fn parses_attributes_and_entities() {
        let doc = parse(r#"<item id='7' title="a &amp; b">x &lt; y &#65;&#x42;</item>"#).unwrap();
        let root = doc.root();
        assert_eq!(root.attribute("id"), Some("7"));
        assert_eq!(root.attribute("title"), Some("a & b"));
        assert_eq!(root.children, vec![XmlNode::Text("x < y AB".into())]);
    }

    #[test]
    fn skips_prolog_comments_and_doctype() {
        let input = r#"<?xml version="1.0"?>
<!DOCTYPE note [ <!ELEMENT note ANY> ]>
<!-- leading -->
<note><!-- inner --><to>Tove</to></note>
<!-- trailing -->"#;
        let doc = parse(input).unwrap();
        assert_eq!(doc.root().name, "note");
        assert_eq!(doc.root().children.len(), 1);
    }

    #[test]
    fn cdata_merges_with_text() {
        let doc = parse("<a>one <![CDATA[<two>]]> three</a>").unwrap();
        assert_eq!(doc.root().children, vec![XmlNode::Text("one <two> three".into())]);
    }

    #[test]
    fn whitespace_between_elements_is_dropped_by_default() {
        let doc = parse("<a>\n  <b/>\n</a>").unwrap();
        assert_eq!(doc.root().children.len(), 1);

        let doc = Parser::new("<a>\n  <b/>\n</a>")
            .keep_whitespace(true)
            .parse()
            .unwrap();
        assert_eq!(doc.root().children.len(), 3);
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse(""), Err(XmlError::EmptyDocument));
        assert_eq!(parse("  \n\t "), Err(XmlError::EmptyDocument));
        assert_eq!(parse("<!-- only a comment -->"), Err(XmlError::EmptyDocument));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            parse("<a><b></a>"),
            Err(XmlError::MismatchedTag { .. })
        ));
        assert!(matches!(parse("<a>"), Err(XmlError::UnexpectedEof { .. })));
        assert!(matches!(parse("text"), Err(XmlError::Syntax { .. })));
        assert!(matches!(parse("<a/><b/>"), Err(XmlError::Syntax { .. })));
        assert!(matches!(
            parse("<a x='1' x='2'/>"),
            Err(XmlError::DuplicateAttribute { .. })
        ));
        assert!(matches!(
            parse("<a>&nbsp;</a>"),
            Err(XmlError::UnknownEntity { .. })
        ));
        assert!(matches!(parse("<a x='1'y='2'/>"), Err(XmlError::Syntax { .. })));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let input = "<a>".repeat(MAX_DEPTH + 1);
        assert_eq!(parse(&input), Err(XmlError::TooDeep { limit: MAX_DEPTH }));
    }

    #[test]
    fn compact_output_reparses_to_same_document() {
        let input = r#"<r a="&quot;q&quot;"><x>1 &amp; 2</x><y/></r>"#;
        let doc = parse(input).unwrap();
        let again = parse(&doc.to_xml_string()).unwrap();
        assert_eq!(doc, again);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn whitespace_only_input_is_empty(ws in "[ \t\r\n]{0,32}") {
                prop_assert_eq!(parse(&ws), Err(XmlError::EmptyDocument));
            }

            #[test]
            fn text_content_survives_escaping(text in "[^\u{0}-\u{8}\u{b}\u{c}\u{e}-\u{1f}]{1,64}") {
                prop_assume!(!text.trim().is_empty());
                let doc = XmlDocument::new(XmlElement::new("t").with_child(XmlNode::Text(text.clone())));
                let parsed = parse(&doc.to_xml_string()).unwrap();
                prop_assert_eq!(parsed.root().children.clone(), vec![XmlNode::Text(text)]);
            }
        }
    }
}
