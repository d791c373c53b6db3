#![forbid(unsafe_code)]

//! Namespace scope tracking shared by every emitter.
//!
//! The raw writer and the streaming canonicalizer must agree on exactly which
//! prefix is bound to which URI at every point of the output, otherwise the
//! canonical bytes digested while writing would diverge from what a verifier
//! reconstructs from the serialized document. Both therefore resolve names
//! through the same [`NamespaceScope`].

use std::collections::BTreeMap;
use sundby_core::{ns, Error};

/// A stack of per-element namespace declarations.
#[derive(Debug, Clone, Default)]
pub struct NamespaceScope {
    frames: Vec<Vec<(String, String)>>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a frame for a new element.
    pub fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Close the innermost element's frame.
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Look up the URI bound to `prefix` ("" for the default namespace).
    ///
    /// An undeclared default namespace (`xmlns=""`) is reported as `None`.
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(ns::XML);
        }
        for frame in self.frames.iter().rev() {
            if let Some((_, uri)) = frame.iter().rev().find(|(p, _)| p == prefix) {
                return if uri.is_empty() { None } else { Some(uri) };
            }
        }
        None
    }

    /// The URI declared for `prefix` on the innermost frame only.
    pub fn declared_here(&self, prefix: &str) -> Option<&str> {
        self.frames
            .last()?
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Declarations made on the innermost frame, in declaration order.
    pub fn current_declarations(&self) -> &[(String, String)] {
        self.frames.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record a declaration on the innermost frame.
    ///
    /// Returns `Ok(true)` when the declaration is new, `Ok(false)` when the
    /// identical declaration already exists on this frame.
    pub fn declare(&mut self, prefix: &str, uri: &str) -> Result<bool, Error> {
        if prefix == "xmlns" || (prefix == "xml" && uri != ns::XML) {
            return Err(Error::XmlStructure(format!("reserved prefix: {prefix}")));
        }
        if !prefix.is_empty() && uri.is_empty() {
            return Err(Error::XmlStructure(format!(
                "prefix {prefix} cannot be bound to the empty namespace"
            )));
        }
        match self.declared_here(prefix) {
            Some(existing) if existing == uri => Ok(false),
            Some(existing) => Err(Error::XmlStructure(format!(
                "prefix '{prefix}' already bound to {existing} on this element"
            ))),
            None => {
                let frame = self
                    .frames
                    .last_mut()
                    .ok_or_else(|| Error::XmlStructure("namespace declaration outside an element".into()))?;
                frame.push((prefix.to_owned(), uri.to_owned()));
                Ok(true)
            }
        }
    }

    /// All bindings in scope, closest declaration winning. The `xml` prefix
    /// and undeclared defaults are omitted.
    pub fn in_scope(&self) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();
        for frame in &self.frames {
            for (prefix, uri) in frame {
                if uri.is_empty() {
                    result.remove(prefix);
                } else {
                    result.insert(prefix.clone(), uri.clone());
                }
            }
        }
        result
    }

    /// Work out the declaration needed for an element name.
    ///
    /// Must be called after [`push`](Self::push) for the element. Returns the
    /// `(prefix, uri)` pair the emitter has to declare on the element, if any.
    pub fn resolve_element(
        &self,
        prefix: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Option<(String, String)>, Error> {
        let p = prefix.unwrap_or("");
        match namespace {
            Some(uri) => {
                if p == "xml" {
                    return Err(Error::XmlStructure("elements cannot use the xml prefix".into()));
                }
                if !p.is_empty() && uri.is_empty() {
                    return Err(Error::XmlStructure(format!(
                        "prefix {p} cannot be bound to the empty namespace"
                    )));
                }
                if self.lookup(p).unwrap_or("") == uri {
                    Ok(None)
                } else {
                    Ok(Some((p.to_owned(), uri.to_owned())))
                }
            }
            None if p.is_empty() => {
                if self.lookup("").is_some() {
                    Ok(Some((String::new(), String::new())))
                } else {
                    Ok(None)
                }
            }
            None => {
                if self.lookup(p).is_some() {
                    Ok(None)
                } else {
                    Err(Error::XmlStructure(format!("unbound element prefix: {p}")))
                }
            }
        }
    }

    /// Work out the declaration needed for an attribute name.
    pub fn resolve_attribute(
        &self,
        prefix: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Option<(String, String)>, Error> {
        match prefix.unwrap_or("") {
            "" => match namespace {
                Some(uri) if !uri.is_empty() => Err(Error::XmlStructure(format!(
                    "attribute in namespace {uri} needs a prefix"
                ))),
                _ => Ok(None),
            },
            "xml" => match namespace {
                None => Ok(None),
                Some(uri) if uri == ns::XML => Ok(None),
                Some(uri) => Err(Error::XmlStructure(format!("xml prefix bound to {uri}"))),
            },
            "xmlns" => Err(Error::XmlStructure(
                "namespace declarations must be written with write_namespace".into(),
            )),
            p => match namespace {
                Some(uri) if self.lookup(p) == Some(uri) => Ok(None),
                Some(uri) => Ok(Some((p.to_owned(), uri.to_owned()))),
                None if self.lookup(p).is_some() => Ok(None),
                None => Err(Error::XmlStructure(format!("unbound attribute prefix: {p}"))),
            },
        }
    }
}
