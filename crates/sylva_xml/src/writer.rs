//! Streaming XML writer.

use std::borrow::Cow;
use std::io::{self, Write};

const INDENT: &str = "  ";

/// Escapes character data for use between tags.
#[must_use]
pub fn escape_text(text: &str) -> Cow<'_, str> {
    escape(text, false)
}

/// Escapes an attribute value for use inside double quotes.
#[must_use]
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    escape(value, true)
}

fn escape(input: &str, attribute: bool) -> Cow<'_, str> {
    let needs_escape = |c: char| match c {
        '&' | '<' | '>' => true,
        '"' | '\n' | '\t' | '\r' => attribute,
        _ => false,
    };
    if !input.chars().any(needs_escape) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\t' if attribute => out.push_str("&#9;"),
            '\r' if attribute => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

struct Frame {
    name: String,
    has_children: bool,
    has_text: bool,
}

/// Writes well-formed XML to any [`Write`] sink.
///
/// Start tags are left open until the first child or text arrives so that
/// empty elements are written as `<name/>`. With pretty printing enabled,
/// element-only content is indented two spaces per level; elements that
/// contain text are kept on one line so the text is not altered.
pub struct XmlWriter<W: Write> {
    out: W,
    pretty: bool,
    stack: Vec<Frame>,
    start_tag_open: bool,
    written_any: bool,
}

impl<W: Write> XmlWriter<W> {
    /// Creates a compact writer.
    pub fn new(out: W) -> Self {
        Self {
            out,
            pretty: false,
            stack: Vec::new(),
            start_tag_open: false,
            written_any: false,
        }
    }

    /// Creates a writer that indents nested elements.
    pub fn pretty(out: W) -> Self {
        Self {
            pretty: true,
            ..Self::new(out)
        }
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Opens an element with the given attributes.
    pub fn open_element<'a, I>(&mut self, name: &str, attributes: I) -> io::Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.close_start_tag()?;

        let parent_has_text = match self.stack.last_mut() {
            Some(parent) => {
                parent.has_children = true;
                parent.has_text
            }
            None => false,
        };
        if self.pretty && self.written_any && !parent_has_text {
            self.newline(self.stack.len())?;
        }

        write!(self.out, "<{name}")?;
        for (attr, value) in attributes {
            write!(self.out, " {attr}=\"{}\"", escape_attribute(value))?;
        }
        self.start_tag_open = true;
        self.written_any = true;
        self.stack.push(Frame {
            name: name.to_string(),
            has_children: false,
            has_text: false,
        });
        Ok(())
    }

    /// Writes escaped character data into the current element.
    pub fn text(&mut self, text: &str) -> io::Result<()> {
        self.close_start_tag()?;
        if let Some(frame) = self.stack.last_mut() {
            frame.has_text = true;
        }
        self.out.write_all(escape_text(text).as_bytes())?;
        self.written_any = true;
        Ok(())
    }

    /// Closes the innermost open element.
    pub fn close_element(&mut self) -> io::Result<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no open element"))?;

        if self.start_tag_open {
            self.start_tag_open = false;
            return self.out.write_all(b"/>");
        }

        if self.pretty && frame.has_children && !frame.has_text {
            self.newline(self.stack.len())?;
        }
        write!(self.out, "</{}>", frame.name)
    }

    /// Closes any open elements and returns the underlying sink.
    pub fn finish(mut self) -> io::Result<W> {
        while !self.stack.is_empty() {
            self.close_element()?;
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn close_start_tag(&mut self) -> io::Result<()> {
        if self.start_tag_open {
            self.start_tag_open = false;
            self.out.write_all(b">")?;
        }
        Ok(())
    }

    fn newline(&mut self, depth: usize) -> io::Result<()> {
        self.out.write_all(b"\n")?;
        for _ in 0..depth {
            self.out.write_all(INDENT.as_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(pretty: bool, f: impl FnOnce(&mut XmlWriter<Vec<u8>>) -> io::Result<()>) -> String {
        let mut writer = if pretty {
            XmlWriter::pretty(Vec::new())
        } else {
            XmlWriter::new(Vec::new())
        };
        f(&mut writer).unwrap();
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn escapes_text_and_attributes() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attribute("say \"hi\""), "say &quot;hi&quot;");
        assert!(matches!(escape_text("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn empty_elements_self_close() {
        let out = render(false, |w| {
            w.open_element("a", [("id", "1")])?;
            w.open_element("b", [])?;
            w.close_element()?;
            w.close_element()
        });
        assert_eq!(out, r#"<a id="1"><b/></a>"#);
    }

    #[test]
    fn pretty_indents_element_content() {
        let out = render(true, |w| {
            w.open_element("a", [])?;
            w.open_element("b", [])?;
            w.text("x")?;
            w.close_element()?;
            w.open_element("c", [])?;
            w.close_element()?;
            w.close_element()
        });
        assert_eq!(out, "<a>\n  <b>x</b>\n  <c/>\n</a>");
    }

    #[test]
    fn finish_closes_open_elements() {
        let out = render(false, |w| {
            w.open_element("a", [])?;
            w.open_element("b", [])?;
            w.text("t")
        });
        assert_eq!(out, "<a><b>t</b></a>");
    }

    #[test]
    fn close_without_open_is_error() {
        let mut writer = XmlWriter::new(Vec::new());
        assert!(writer.close_element().is_err());
    }
}
