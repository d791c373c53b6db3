//! Streaming XML output.
//!
//! [`XmlEmitter`] is the node-stream interface every output stage speaks:
//! the raw writer, the streaming canonicalizer and the signature writer that
//! sits in front of both. [`XmlWriter`] is the quick-xml backed
//! implementation that produces bytes.

use crate::scope::NamespaceScope;
use crate::qualified_name;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use std::borrow::Cow;
use std::io::Write;
use sundby_core::Error;

/// A sink for XML node events.
///
/// Namespace declarations are implied by names: starting an element or
/// writing an attribute in a namespace that is not bound to the given prefix
/// in the current scope declares it on the element being written.
pub trait XmlEmitter {
    /// Open an element.
    fn start_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace: Option<&str>,
    ) -> Result<(), Error>;

    /// Add an attribute to the element just opened.
    fn write_attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace: Option<&str>,
        value: &str,
    ) -> Result<(), Error>;

    /// Declare a namespace on the element just opened.
    fn write_namespace(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), Error>;

    /// Write character data.
    fn write_text(&mut self, text: &str) -> Result<(), Error>;

    /// Write a comment.
    fn write_comment(&mut self, text: &str) -> Result<(), Error>;

    /// Close the innermost element, self-closing it when it has no content.
    fn end_element(&mut self) -> Result<(), Error>;

    /// Close the innermost element, always with a separate end tag.
    fn end_element_full(&mut self) -> Result<(), Error>;

    /// Push buffered output to the underlying sink.
    fn flush(&mut self) -> Result<(), Error>;
}

/// A quick-xml backed [`XmlEmitter`] writing to any `io::Write`.
pub struct XmlWriter<W: Write> {
    writer: quick_xml::Writer<W>,
    scope: NamespaceScope,
    pending: Option<BytesStart<'static>>,
    open: Vec<String>,
}

impl<W: Write> XmlWriter<W> {
    /// Create a writer over `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            writer: quick_xml::Writer::new(inner),
            scope: NamespaceScope::new(),
            pending: None,
            open: Vec::new(),
        }
    }

    /// Write the XML declaration.
    pub fn write_declaration(&mut self) -> Result<(), Error> {
        if !self.open.is_empty() {
            return Err(Error::XmlStructure("declaration after the root element".into()));
        }
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    /// Emit a pending start tag, if any, so that the output ends at a
    /// content position.
    pub fn close_start_tag(&mut self) -> Result<(), Error> {
        if let Some(start) = self.pending.take() {
            self.emit(Event::Start(start))?;
        }
        Ok(())
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Finish writing and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), Error> {
        self.writer
            .write_event(event)
            .map_err(|e| Error::XmlWrite(e.to_string()))
    }

    fn pending_mut(&mut self) -> Result<&mut BytesStart<'static>, Error> {
        self.pending
            .as_mut()
            .ok_or_else(|| Error::XmlStructure("no start tag open for attributes".into()))
    }

    fn push_raw_attribute(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let escaped = escape_attr(value);
        self.pending_mut()?.push_attribute(Attribute {
            key: QName(name.as_bytes()),
            value: Cow::Borrowed(escaped.as_bytes()),
        });
        Ok(())
    }

    fn push_declaration(&mut self, prefix: &str, uri: &str) -> Result<(), Error> {
        if self.scope.declare(prefix, uri)? {
            let name = if prefix.is_empty() {
                "xmlns".to_owned()
            } else {
                format!("xmlns:{prefix}")
            };
            self.push_raw_attribute(&name, uri)?;
        }
        Ok(())
    }

    fn close(&mut self, self_close: bool) -> Result<(), Error> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| Error::XmlStructure("end_element with no open element".into()))?;
        match self.pending.take() {
            Some(start) if self_close => self.emit(Event::Empty(start))?,
            Some(start) => {
                self.emit(Event::Start(start))?;
                self.emit(Event::End(BytesEnd::new(name)))?;
            }
            None => self.emit(Event::End(BytesEnd::new(name)))?,
        }
        self.scope.pop();
        Ok(())
    }
}

impl<W: Write> XmlEmitter for XmlWriter<W> {
    fn start_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace: Option<&str>,
    ) -> Result<(), Error> {
        self.close_start_tag()?;
        self.scope.push();
        let decl = self.scope.resolve_element(prefix, namespace)?;
        let name = qualified_name(prefix, local_name);
        self.pending = Some(BytesStart::new(name.clone()));
        self.open.push(name);
        if let Some((p, uri)) = decl {
            self.push_declaration(&p, &uri)?;
        }
        Ok(())
    }

    fn write_attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace: Option<&str>,
        value: &str,
    ) -> Result<(), Error> {
        if self.pending.is_none() {
            return Err(Error::XmlStructure(format!(
                "attribute {local_name} written outside a start tag"
            )));
        }
        if let Some((p, uri)) = self.scope.resolve_attribute(prefix, namespace)? {
            self.push_declaration(&p, &uri)?;
        }
        self.push_raw_attribute(&qualified_name(prefix, local_name), value)
    }

    fn write_namespace(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), Error> {
        if self.pending.is_none() {
            return Err(Error::XmlStructure("namespace declared outside a start tag".into()));
        }
        self.push_declaration(prefix.unwrap_or(""), uri)
    }

    fn write_text(&mut self, text: &str) -> Result<(), Error> {
        if self.open.is_empty() {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(Error::XmlStructure("text outside the root element".into()));
        }
        self.close_start_tag()?;
        let escaped = escape_text(text);
        self.emit(Event::Text(BytesText::from_escaped(escaped)))
    }

    fn write_comment(&mut self, text: &str) -> Result<(), Error> {
        if text.contains("--") || text.ends_with('-') {
            return Err(Error::XmlStructure("comment text contains '--'".into()));
        }
        self.close_start_tag()?;
        self.emit(Event::Comment(BytesText::from_escaped(text)))
    }

    fn end_element(&mut self) -> Result<(), Error> {
        self.close(true)
    }

    fn end_element_full(&mut self) -> Result<(), Error> {
        self.close(false)
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.writer.get_mut().flush()?;
        Ok(())
    }
}

/// Escape character data so that parsing gives back exactly `s`.
///
/// `\r` is written as a character reference, otherwise end-of-line handling
/// on the reading side would turn it into `\n`.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an attribute value so that parsing gives back exactly `s`.
///
/// Whitespace characters other than space are written as character
/// references so that attribute-value normalization leaves them alone.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}
