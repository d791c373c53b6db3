#![forbid(unsafe_code)]

//! Shared rendering for exclusive C14N output.
//!
//! Both the document-subset canonicalizer and the streaming one reduce an
//! element to the same inputs (qualified name, attributes, in-scope
//! namespaces, what the nearest output ancestor rendered) and go through
//! the functions here, so they cannot disagree on namespace selection or
//! ordering.

use crate::escape;
use std::collections::{BTreeMap, BTreeSet};

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for default namespace).
    pub prefix: String,
    /// The namespace URI ("" to undeclare the default namespace).
    pub uri: String,
}

impl NsDecl {
    /// Render this namespace declaration to a string.
    pub fn render(&self) -> String {
        if self.prefix.is_empty() {
            format!(" xmlns=\"{}\"", escape::escape_attr(&self.uri))
        } else {
            format!(
                " xmlns:{}=\"{}\"",
                self.prefix,
                escape::escape_attr(&self.uri)
            )
        }
    }
}

impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Default namespace first, then by prefix.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// The namespace URI of the attribute ("" for no namespace).
    pub ns_uri: String,
    /// The prefix as written ("" for none).
    pub prefix: String,
    pub local_name: String,
    pub value: String,
}

impl Attr {
    pub fn qualified_name(&self) -> String {
        sundby_xml::qualified_name(Some(&self.prefix), &self.local_name)
    }

    /// Render this attribute to a string.
    pub fn render(&self) -> String {
        format!(
            " {}=\"{}\"",
            self.qualified_name(),
            escape::escape_attr(&self.value)
        )
    }
}

impl Ord for Attr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Unqualified attributes first, sorted by local name; then by
        // (namespace URI, local name).
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then(self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Prefixes visibly utilized by an element.
///
/// That is the element's own prefix ("" when unprefixed), the prefixes of
/// its qualified attributes, and everything in the InclusiveNamespaces
/// PrefixList (`#default` standing for the default namespace).
pub fn utilized_prefixes(
    element_prefix: &str,
    attrs: &[Attr],
    inclusive_prefixes: &[String],
) -> BTreeSet<String> {
    let mut utilized = BTreeSet::new();
    utilized.insert(element_prefix.to_owned());
    for attr in attrs {
        if !attr.prefix.is_empty() {
            utilized.insert(attr.prefix.clone());
        }
    }
    for p in inclusive_prefixes {
        if p == "#default" {
            utilized.insert(String::new());
        } else {
            utilized.insert(p.clone());
        }
    }
    utilized
}

/// Namespace declarations to output on an element, sorted.
///
/// `rendered` holds the bindings already in effect in the output at the
/// nearest output ancestor.
pub fn namespace_decls(
    utilized: &BTreeSet<String>,
    in_scope: &BTreeMap<String, String>,
    rendered: &BTreeMap<String, String>,
) -> Vec<NsDecl> {
    let mut decls = Vec::new();
    for prefix in utilized {
        if prefix == "xml" {
            continue;
        }
        match in_scope.get(prefix) {
            Some(uri) => {
                if rendered.get(prefix) != Some(uri) {
                    decls.push(NsDecl {
                        prefix: prefix.clone(),
                        uri: uri.clone(),
                    });
                }
            }
            None if prefix.is_empty() => {
                if rendered.get("").is_some_and(|uri| !uri.is_empty()) {
                    decls.push(NsDecl {
                        prefix: String::new(),
                        uri: String::new(),
                    });
                }
            }
            None => {}
        }
    }
    decls.sort();
    decls
}

/// Rendered bindings seen by the children of an element that output `decls`.
pub fn child_rendered(
    rendered: &BTreeMap<String, String>,
    decls: &[NsDecl],
) -> BTreeMap<String, String> {
    let mut next = rendered.clone();
    for decl in decls {
        next.insert(decl.prefix.clone(), decl.uri.clone());
    }
    next
}

/// Write a canonical start tag. `attrs` must already be sorted.
pub fn write_start_tag(out: &mut Vec<u8>, qname: &str, decls: &[NsDecl], attrs: &[Attr]) {
    out.push(b'<');
    out.extend_from_slice(qname.as_bytes());
    for decl in decls {
        out.extend_from_slice(decl.render().as_bytes());
    }
    for attr in attrs {
        out.extend_from_slice(attr.render().as_bytes());
    }
    out.push(b'>');
}

pub fn write_end_tag(out: &mut Vec<u8>, qname: &str) {
    out.extend_from_slice(b"</");
    out.extend_from_slice(qname.as_bytes());
    out.push(b'>');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(ns: &str, prefix: &str, local: &str) -> Attr {
        Attr {
            ns_uri: ns.into(),
            prefix: prefix.into(),
            local_name: local.into(),
            value: String::new(),
        }
    }

    #[test]
    fn test_attribute_order() {
        let mut attrs = vec![
            attr("urn:b", "b", "x"),
            attr("", "", "z"),
            attr("urn:a", "q", "y"),
            attr("", "", "a"),
        ];
        attrs.sort();
        let names: Vec<String> = attrs.iter().map(Attr::qualified_name).collect();
        assert_eq!(names, ["a", "z", "q:y", "b:x"]);
    }

    #[test]
    fn test_namespace_decls_skip_rendered() {
        let in_scope: BTreeMap<String, String> =
            [("p".to_owned(), "urn:p".to_owned()), ("q".to_owned(), "urn:q".to_owned())].into();
        let rendered: BTreeMap<String, String> = [("p".to_owned(), "urn:p".to_owned())].into();
        let utilized = utilized_prefixes("p", &[attr("urn:q", "q", "a")], &[]);
        let decls = namespace_decls(&utilized, &in_scope, &rendered);
        assert_eq!(decls, vec![NsDecl { prefix: "q".into(), uri: "urn:q".into() }]);
    }

    #[test]
    fn test_default_namespace_undeclared() {
        let rendered: BTreeMap<String, String> = [(String::new(), "urn:d".to_owned())].into();
        let utilized = utilized_prefixes("", &[], &[]);
        let decls = namespace_decls(&utilized, &BTreeMap::new(), &rendered);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].render(), " xmlns=\"\"");
    }

    #[test]
    fn test_inclusive_prefix_only_when_in_scope() {
        let in_scope: BTreeMap<String, String> = [("x".to_owned(), "urn:x".to_owned())].into();
        let utilized = utilized_prefixes("p", &[], &["x".into(), "y".into()]);
        let decls = namespace_decls(&utilized, &in_scope, &BTreeMap::new());
        assert_eq!(decls, vec![NsDecl { prefix: "x".into(), uri: "urn:x".into() }]);
    }
}
