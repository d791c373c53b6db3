#![forbid(unsafe_code)]

//! Streaming exclusive canonicalization.
//!
//! [`ExcC14nStream`] is an [`XmlEmitter`] that produces exclusive C14N bytes
//! (without comments) directly from emitter calls. It resolves names through
//! the same [`NamespaceScope`] rules as the raw writer, so for a given call
//! sequence its output equals what the document-subset canonicalizer
//! produces from the raw writer's serialization.

use crate::render::{self, Attr};
use std::collections::BTreeMap;
use sundby_core::Error;
use sundby_xml::{qualified_name, NamespaceScope, XmlEmitter};

struct PendingElement {
    prefix: String,
    qname: String,
    attrs: Vec<Attr>,
}

/// Exclusive C14N over a stream of emitter calls.
pub struct ExcC14nStream {
    output: Vec<u8>,
    scope: NamespaceScope,
    inclusive_prefixes: Vec<String>,
    pending: Option<PendingElement>,
    open: Vec<String>,
    rendered: Vec<BTreeMap<String, String>>,
    finished: bool,
}

impl ExcC14nStream {
    pub fn new(inclusive_prefixes: &[String]) -> Self {
        Self {
            output: Vec::new(),
            scope: NamespaceScope::new(),
            inclusive_prefixes: inclusive_prefixes.to_vec(),
            pending: None,
            open: Vec::new(),
            rendered: vec![BTreeMap::new()],
            finished: false,
        }
    }

    /// Canonical bytes produced so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Namespace bindings in scope at the current position.
    pub fn in_scope(&self) -> BTreeMap<String, String> {
        self.scope.in_scope()
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Complete canonicalization and return the canonical bytes.
    ///
    /// Fails if elements are still open.
    pub fn finish(&mut self) -> Result<Vec<u8>, Error> {
        if !self.open.is_empty() {
            return Err(Error::Canonicalization(format!(
                "{} element(s) still open",
                self.open.len()
            )));
        }
        self.finished = true;
        Ok(std::mem::take(&mut self.output))
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.finished {
            return Err(Error::Canonicalization("stream already finished".into()));
        }
        Ok(())
    }

    fn flush_start_tag(&mut self) -> Result<(), Error> {
        let Some(mut element) = self.pending.take() else {
            return Ok(());
        };
        element.attrs.sort();
        let in_scope = self.scope.in_scope();
        let utilized =
            render::utilized_prefixes(&element.prefix, &element.attrs, &self.inclusive_prefixes);
        let parent_rendered = self
            .rendered
            .last()
            .ok_or_else(|| Error::Canonicalization("rendered namespace stack empty".into()))?;
        let decls = render::namespace_decls(&utilized, &in_scope, parent_rendered);
        let child_rendered = render::child_rendered(parent_rendered, &decls);
        render::write_start_tag(&mut self.output, &element.qname, &decls, &element.attrs);
        self.rendered.push(child_rendered);
        self.open.push(element.qname);
        Ok(())
    }

    fn declare(&mut self, decl: Option<(String, String)>) -> Result<(), Error> {
        if let Some((prefix, uri)) = decl {
            self.scope.declare(&prefix, &uri)?;
        }
        Ok(())
    }
}

impl XmlEmitter for ExcC14nStream {
    fn start_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace: Option<&str>,
    ) -> Result<(), Error> {
        self.check_open()?;
        self.flush_start_tag()?;
        self.scope.push();
        let decl = self.scope.resolve_element(prefix, namespace)?;
        self.declare(decl)?;
        self.pending = Some(PendingElement {
            prefix: prefix.unwrap_or("").to_owned(),
            qname: qualified_name(prefix, local_name),
            attrs: Vec::new(),
        });
        Ok(())
    }

    fn write_attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace: Option<&str>,
        value: &str,
    ) -> Result<(), Error> {
        self.check_open()?;
        if self.pending.is_none() {
            return Err(Error::XmlStructure(format!(
                "attribute {local_name} written outside a start tag"
            )));
        }
        let decl = self.scope.resolve_attribute(prefix, namespace)?;
        self.declare(decl)?;
        let prefix = prefix.unwrap_or("");
        let ns_uri = match namespace {
            Some(uri) => uri.to_owned(),
            None if prefix.is_empty() => String::new(),
            None => self.scope.lookup(prefix).unwrap_or("").to_owned(),
        };
        if let Some(element) = self.pending.as_mut() {
            element.attrs.push(Attr {
                ns_uri,
                prefix: prefix.to_owned(),
                local_name: local_name.to_owned(),
                value: value.to_owned(),
            });
        }
        Ok(())
    }

    fn write_namespace(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), Error> {
        self.check_open()?;
        if self.pending.is_none() {
            return Err(Error::XmlStructure("namespace declared outside a start tag".into()));
        }
        self.scope.declare(prefix.unwrap_or(""), uri)?;
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> Result<(), Error> {
        self.check_open()?;
        self.flush_start_tag()?;
        if self.open.is_empty() {
            return Ok(());
        }
        self.output
            .extend_from_slice(crate::escape::escape_text(text).as_bytes());
        Ok(())
    }

    fn write_comment(&mut self, _text: &str) -> Result<(), Error> {
        self.check_open()?;
        self.flush_start_tag()
    }

    fn end_element(&mut self) -> Result<(), Error> {
        self.check_open()?;
        self.flush_start_tag()?;
        let qname = self
            .open
            .pop()
            .ok_or_else(|| Error::XmlStructure("end_element with no open element".into()))?;
        render::write_end_tag(&mut self.output, &qname);
        self.rendered.pop();
        self.scope.pop();
        Ok(())
    }

    fn end_element_full(&mut self) -> Result<(), Error> {
        self.end_element()
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
