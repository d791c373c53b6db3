#![forbid(unsafe_code)]

//! Same-document reference resolution.
//!
//! Only the patterns enveloped signatures use are supported: `#id-value`
//! URIs and the ancestor-or-self axis.

use std::collections::HashMap;
use sundby_core::Error;

/// Parse a same-document reference (e.g., `#foo` → `foo`).
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    uri.strip_prefix('#').filter(|id| !id.is_empty())
}

/// Resolve an ID value in a parsed document using a pre-built ID map.
pub fn resolve_id<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    id_map: &HashMap<String, roxmltree::NodeId>,
    id: &str,
) -> Result<roxmltree::Node<'a, 'input>, Error> {
    id_map
        .get(id)
        .and_then(|nid| doc.get_node(*nid))
        .ok_or_else(|| Error::InvalidUri(format!("ID not found: {id}")))
}

/// Check if `ancestor` is an ancestor-or-self of `node`.
pub fn is_ancestor_or_self(
    ancestor: roxmltree::Node<'_, '_>,
    node: roxmltree::Node<'_, '_>,
) -> bool {
    node.ancestors().any(|n| n.id() == ancestor.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_same_document_ref() {
        assert_eq!(parse_same_document_ref("#_abc"), Some("_abc"));
        assert_eq!(parse_same_document_ref("#"), None);
        assert_eq!(parse_same_document_ref("http://x/#a"), None);
    }

    #[test]
    fn test_ancestor_or_self() {
        let doc = roxmltree::Document::parse("<a><b><c/></b></a>").unwrap();
        let a = doc.root_element();
        let c = a.descendants().find(|n| n.has_tag_name("c")).unwrap();
        assert!(is_ancestor_or_self(a, c));
        assert!(is_ancestor_or_self(c, c));
        assert!(!is_ancestor_or_self(c, a));
    }
}
