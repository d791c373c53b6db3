#![forbid(unsafe_code)]

//! Replay serialized XML as a node stream into an [`XmlEmitter`].
//!
//! Used to push a finished (signed) document into the caller's emitter and
//! to drive the signature writer from an existing document. The XML
//! declaration, processing instructions and DOCTYPE are not replayed.

use crate::scope::NamespaceScope;
use crate::split_qname;
use crate::writer::XmlEmitter;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use sundby_core::Error;

/// Parse `xml` and forward every node to `sink`.
///
/// Returns the number of elements replayed.
pub fn replay(xml: &[u8], sink: &mut dyn XmlEmitter) -> Result<usize, Error> {
    let mut reader = Reader::from_reader(xml);
    let mut scope = NamespaceScope::new();
    let mut depth = 0usize;
    let mut elements = 0usize;

    loop {
        match reader.read_event().map_err(parse_err)? {
            Event::Start(start) => {
                replay_start(&start, &mut scope, sink)?;
                depth += 1;
                elements += 1;
            }
            Event::Empty(start) => {
                replay_start(&start, &mut scope, sink)?;
                sink.end_element()?;
                scope.pop();
                elements += 1;
            }
            Event::End(_) => {
                sink.end_element_full()?;
                scope.pop();
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::XmlParse("unbalanced end tag".into()))?;
            }
            Event::Text(text) => {
                if depth > 0 {
                    let raw = normalize_line_ends(utf8(&text)?);
                    sink.write_text(&unescape(&raw).map_err(parse_err)?)?;
                }
            }
            Event::CData(data) => {
                sink.write_text(&normalize_line_ends(utf8(&data)?))?;
            }
            Event::Comment(comment) => {
                if depth > 0 {
                    sink.write_comment(&normalize_line_ends(utf8(&comment)?))?;
                }
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if depth != 0 {
        return Err(Error::XmlParse("unexpected end of document".into()));
    }
    Ok(elements)
}

fn replay_start(
    start: &BytesStart<'_>,
    scope: &mut NamespaceScope,
    sink: &mut dyn XmlEmitter,
) -> Result<(), Error> {
    let mut declarations = Vec::new();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(parse_err)?;
        let key = utf8(attr.key.as_ref())?.to_owned();
        let value = unescape(&normalize_attribute(utf8(&attr.value)?))
            .map_err(parse_err)?
            .into_owned();
        if key == "xmlns" {
            declarations.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((prefix.to_owned(), value));
        } else {
            attributes.push((key, value));
        }
    }

    scope.push();
    for (prefix, uri) in &declarations {
        scope.declare(prefix, uri)?;
    }

    let qname = utf8(start.name().as_ref())?.to_owned();
    let (prefix, local) = split_qname(&qname);
    let namespace = match prefix {
        Some(p) => Some(
            scope
                .lookup(p)
                .ok_or_else(|| Error::XmlParse(format!("unbound element prefix: {p}")))?,
        ),
        None => scope.lookup(""),
    };
    sink.start_element(prefix, local, namespace)?;

    for (prefix, uri) in &declarations {
        let prefix = (!prefix.is_empty()).then_some(prefix.as_str());
        sink.write_namespace(prefix, uri)?;
    }
    for (name, value) in &attributes {
        let (prefix, local) = split_qname(name);
        let namespace = match prefix {
            Some(p) => Some(
                scope
                    .lookup(p)
                    .ok_or_else(|| Error::XmlParse(format!("unbound attribute prefix: {p}")))?,
            ),
            None => None,
        };
        sink.write_attribute(prefix, local, namespace, value)?;
    }
    Ok(())
}

/// End-of-line handling: `\r\n` and a lone `\r` read as `\n`.
fn normalize_line_ends(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Attribute-value normalization: literal whitespace other than space reads
/// as a space. Character references are resolved afterwards and keep their
/// character.
fn normalize_attribute(raw: &str) -> Cow<'_, str> {
    let is_break = |c: char| matches!(c, '\t' | '\n' | '\r');
    if raw.contains(is_break) {
        Cow::Owned(raw.replace("\r\n", " ").replace(is_break, " "))
    } else {
        Cow::Borrowed(raw)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(bytes).map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))
}

fn parse_err(e: impl std::fmt::Display) -> Error {
    Error::XmlParse(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XmlWriter;

    fn roundtrip(xml: &str) -> String {
        let mut w = XmlWriter::new(Vec::new());
        replay(xml.as_bytes(), &mut w).unwrap();
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn test_replay_preserves_structure() {
        let xml = r#"<p:R xmlns:p="urn:p" ID="_1"><p:S a="x &amp; y">t&lt;</p:S><!--c--><e/></p:R>"#;
        assert_eq!(roundtrip(xml), xml);
    }

    #[test]
    fn test_replay_normalizes_line_ends_and_attribute_whitespace() {
        let out = roundtrip("<a v=\"x\r\ny\tz\nw\">l1\r\nl2\rl3<!--c\r\n--></a>");
        assert_eq!(out, "<a v=\"x y z w\">l1\nl2\nl3<!--c\n--></a>");
    }

    #[test]
    fn test_replay_keeps_character_references() {
        let xml = "<a v=\"x&#xA;y&#x9;\">l1&#xD;</a>";
        assert_eq!(roundtrip(xml), "<a v=\"x&#xA;y&#x9;\">l1&#xD;</a>");
    }

    #[test]
    fn test_replay_skips_declaration() {
        let out = roundtrip("<?xml version=\"1.0\"?>\n<a>b</a>");
        assert_eq!(out, "<a>b</a>");
    }

    #[test]
    fn test_replay_counts_elements() {
        let mut w = XmlWriter::new(Vec::new());
        let n = replay(b"<a><b/><c><d/></c></a>", &mut w).unwrap();
        assert_eq!(n, 4);
    }

    #[test]
    fn test_replay_rejects_unbound_prefix() {
        let mut w = XmlWriter::new(Vec::new());
        assert!(replay(b"<x:a/>", &mut w).is_err());
    }

    #[test]
    fn test_replay_rejects_truncated() {
        let mut w = XmlWriter::new(Vec::new());
        assert!(replay(b"<a><b>", &mut w).is_err());
    }
}
