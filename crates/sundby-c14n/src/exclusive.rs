#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N) over a parsed document.
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only "visibly utilized" namespace declarations are output. A namespace is
//! visibly utilized if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList, OR
//! 4. It's the default namespace and the element is in that namespace.

use crate::escape;
use crate::render::{self, Attr};
use roxmltree::{Document, Node, NodeType};
use std::collections::BTreeMap;
use sundby_core::{ns, Error};
use sundby_xml::document::{attribute_prefix, element_prefix};
use sundby_xml::nodeset::NodeSet;

/// Canonicalize using Exclusive C14N 1.0.
pub fn canonicalize(
    doc: &Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    canonicalize_in_context(doc, with_comments, node_set, inclusive_prefixes, &BTreeMap::new())
}

/// Canonicalize as if the document were embedded where `inherited`
/// namespace bindings are in scope.
///
/// Only bindings named in the InclusiveNamespaces PrefixList can be affected
/// by the surrounding context, so this is how a fragment serialized on its
/// own yields the bytes a verifier computes for it in place.
pub fn canonicalize_in_context(
    doc: &Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
    inherited: &BTreeMap<String, String>,
) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    let ctx = ExcC14nContext {
        with_comments,
        node_set,
        inclusive_prefixes,
        inherited,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct ExcC14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive_prefixes: &'a [String],
    inherited: &'a BTreeMap<String, String>,
}

impl ExcC14nContext<'_> {
    fn is_visible(&self, node: Node<'_, '_>) -> bool {
        match self.node_set {
            None => true,
            Some(set) => set.contains(node),
        }
    }

    fn process_node(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered_ns)?;
                }
            }
            NodeType::Element => self.process_element(node, output, rendered_ns)?,
            NodeType::Text => {
                if self.is_visible(node) {
                    let text = node.text().unwrap_or("");
                    output.extend_from_slice(escape::escape_text(text).as_bytes());
                }
            }
            NodeType::Comment => {
                if self.with_comments && self.is_visible(node) {
                    let text = node.text().unwrap_or("");
                    self.top_level_break_before(node, output);
                    output.extend_from_slice(b"<!--");
                    output.extend_from_slice(text.as_bytes());
                    output.extend_from_slice(b"-->");
                    self.top_level_break_after(node, output);
                }
            }
            NodeType::PI => {
                if let Some(pi) = node.pi().filter(|_| self.is_visible(node)) {
                    self.top_level_break_before(node, output);
                    output.extend_from_slice(b"<?");
                    output.extend_from_slice(pi.target.as_bytes());
                    if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
                        output.push(b' ');
                        output.extend_from_slice(escape::escape_pi(value).as_bytes());
                    }
                    output.extend_from_slice(b"?>");
                    self.top_level_break_after(node, output);
                }
            }
        }
        Ok(())
    }

    fn top_level_break_before(&self, node: Node<'_, '_>, output: &mut Vec<u8>) {
        if is_top_level(node) && node.prev_siblings().skip(1).any(|s| s.is_element()) {
            output.push(b'\n');
        }
    }

    fn top_level_break_after(&self, node: Node<'_, '_>, output: &mut Vec<u8>) {
        if is_top_level(node) && node.next_siblings().skip(1).any(|s| s.is_element()) {
            output.push(b'\n');
        }
    }

    fn process_element(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(node) {
            // Children of an element outside the node set still see the
            // bindings of the nearest output ancestor.
            for child in node.children() {
                self.process_node(child, output, rendered_ns)?;
            }
            return Ok(());
        }

        let prefix = element_prefix(node).unwrap_or("");
        let local = node.tag_name().name();
        let qname = sundby_xml::qualified_name(Some(prefix), local);

        let mut attrs: Vec<Attr> = node
            .attributes()
            .map(|attr| Attr {
                ns_uri: attr.namespace().unwrap_or("").to_owned(),
                prefix: attribute_prefix(node, &attr).unwrap_or("").to_owned(),
                local_name: attr.name().to_owned(),
                value: attr.value().to_owned(),
            })
            .collect();
        if attrs.iter().any(|a| !a.ns_uri.is_empty() && a.prefix.is_empty()) {
            return Err(Error::Canonicalization(format!(
                "no prefix bound for an attribute namespace on <{qname}>"
            )));
        }
        attrs.sort();

        let in_scope = self.in_scope_namespaces(node);
        let utilized = render::utilized_prefixes(prefix, &attrs, self.inclusive_prefixes);
        let decls = render::namespace_decls(&utilized, &in_scope, rendered_ns);

        render::write_start_tag(output, &qname, &decls, &attrs);
        let child_rendered = render::child_rendered(rendered_ns, &decls);
        for child in node.children() {
            self.process_node(child, output, &child_rendered)?;
        }
        render::write_end_tag(output, &qname);
        Ok(())
    }

    fn in_scope_namespaces(&self, node: Node<'_, '_>) -> BTreeMap<String, String> {
        let mut result = self.inherited.clone();
        for namespace in node.namespaces() {
            let prefix = namespace.name().unwrap_or("");
            if prefix == "xml" || namespace.uri() == ns::XML {
                continue;
            }
            result.insert(prefix.to_owned(), namespace.uri().to_owned());
        }
        if !node.namespaces().any(|n| n.name().is_none()) && node_undeclares_default(node) {
            result.remove("");
        }
        result
    }
}

/// Whether the element's own start tag carries `xmlns=""`.
fn node_undeclares_default(node: Node<'_, '_>) -> bool {
    node.lookup_namespace_uri(None).is_none()
        && node.ancestors().skip(1).any(|a| a.is_element() && a.lookup_namespace_uri(None).is_some())
}

fn is_top_level(node: Node<'_, '_>) -> bool {
    node.parent().is_some_and(|p| p.node_type() == NodeType::Root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str) -> String {
        let doc = Document::parse(xml).unwrap();
        String::from_utf8(canonicalize(&doc, false, None, &[]).unwrap()).unwrap()
    }

    #[test]
    fn test_unused_namespaces_dropped() {
        let xml = r#"<p:a xmlns:p="urn:p" xmlns:unused="urn:u" z="1" b="2"><p:b/></p:a>"#;
        assert_eq!(c14n(xml), r#"<p:a xmlns:p="urn:p" b="2" z="1"><p:b></p:b></p:a>"#);
    }

    #[test]
    fn test_namespace_pushed_to_first_user() {
        let xml = r#"<a xmlns:q="urn:q"><b><q:c/></b></a>"#;
        assert_eq!(c14n(xml), r#"<a><b><q:c xmlns:q="urn:q"></q:c></b></a>"#);
    }

    #[test]
    fn test_comments_removed_and_text_escaped() {
        let xml = "<a><!--x-->1 &gt; 0 &amp;&#xD;</a>";
        assert_eq!(c14n(xml), "<a>1 &gt; 0 &amp;&#xD;</a>");
    }

    #[test]
    fn test_with_comments_and_top_level_pi() {
        let xml = "<?pi data?><a><!--x--></a>";
        let doc = Document::parse(xml).unwrap();
        let out = canonicalize(&doc, true, None, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<?pi data?>\n<a><!--x--></a>");
    }

    #[test]
    fn test_subset_excludes_subtree() {
        let xml = r#"<r ID="1"><keep/><drop><x/></drop>t</r>"#;
        let doc = Document::parse(xml).unwrap();
        let root = doc.root_element();
        let mut set = NodeSet::tree_without_comments(root);
        let drop = root.children().find(|n| n.has_tag_name("drop")).unwrap();
        set.remove_subtree(drop);
        let out = canonicalize(&doc, false, Some(&set), &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"<r ID="1"><keep></keep>t</r>"#);
    }

    #[test]
    fn test_inclusive_prefix_from_context() {
        let xml = r#"<ds:S xmlns:ds="urn:ds"/>"#;
        let doc = Document::parse(xml).unwrap();
        let inherited: BTreeMap<String, String> = [("p".to_owned(), "urn:p".to_owned())].into();
        let out =
            canonicalize_in_context(&doc, false, None, &["p".to_owned()], &inherited).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<ds:S xmlns:ds="urn:ds" xmlns:p="urn:p"></ds:S>"#
        );
    }

    #[test]
    fn test_default_namespace_undeclaration() {
        let xml = r#"<a xmlns="urn:d"><b xmlns=""/></a>"#;
        assert_eq!(c14n(xml), r#"<a xmlns="urn:d"><b xmlns=""></b></a>"#);
    }
}
