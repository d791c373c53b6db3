#![forbid(unsafe_code)]

//! XML document wrapper over roxmltree with ID attribute registration.

use std::collections::HashMap;
use sundby_core::Error;

/// ID attribute names recognised on every element.
pub const DEFAULT_ID_ATTRS: [&str; 3] = ["Id", "ID", "id"];

/// An owned XML document. Stores the text and pre-computed metadata.
///
/// To work with the parsed tree, call [`XmlDocument::parse_doc`] which
/// returns a temporary `roxmltree::Document` borrowing from the text.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    text: String,
    root_name: String,
    root_namespace: Option<String>,
    extra_id_attrs: Vec<String>,
}

impl XmlDocument {
    /// Parse and validate XML from a string, taking ownership.
    pub fn parse(text: String) -> Result<Self, Error> {
        let (root_name, root_namespace) = {
            let doc = parse_text(&text)?;
            let root = doc.root_element();
            (
                root.tag_name().name().to_owned(),
                root.tag_name().namespace().map(str::to_owned),
            )
        };
        Ok(Self {
            text,
            root_name,
            root_namespace,
            extra_id_attrs: Vec::new(),
        })
    }

    /// Parse and validate XML from bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?
            .to_owned();
        Self::parse(text)
    }

    /// Get the raw XML text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Local name of the root element.
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Namespace URI of the root element.
    pub fn root_namespace(&self) -> Option<&str> {
        self.root_namespace.as_deref()
    }

    /// Register an additional ID attribute name (e.g., `"AssertionID"`).
    pub fn add_id_attr(&mut self, name: &str) {
        self.extra_id_attrs.push(name.to_owned());
    }

    /// Parse the document and return a temporary `roxmltree::Document`.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>, Error> {
        parse_text(&self.text)
    }

    /// Build the ID → NodeId mapping for a parsed document.
    ///
    /// An ID value carried by more than one element is an error: resolving
    /// it would depend on document order, which is what wrapping attacks
    /// exploit.
    pub fn build_id_map(
        &self,
        doc: &roxmltree::Document<'_>,
    ) -> Result<HashMap<String, roxmltree::NodeId>, Error> {
        let mut map = HashMap::new();
        let names = DEFAULT_ID_ATTRS
            .iter()
            .copied()
            .chain(self.extra_id_attrs.iter().map(String::as_str));
        let names: Vec<&str> = names.collect();
        for node in doc.descendants().filter(|n| n.is_element()) {
            for name in &names {
                if let Some(val) = node.attribute(*name) {
                    if let Some(previous) = map.insert(val.to_owned(), node.id()) {
                        if previous != node.id() {
                            return Err(Error::XmlStructure(format!("duplicate ID value: {val}")));
                        }
                    }
                }
            }
        }
        Ok(map)
    }

    /// Find the first descendant element with the given local name and namespace.
    pub fn find_element<'a, 'input>(
        doc: &'a roxmltree::Document<'input>,
        ns: &str,
        local_name: &str,
    ) -> Option<roxmltree::Node<'a, 'input>> {
        doc.descendants().find(|n| is_element(*n, ns, local_name))
    }

    /// Find all descendant elements with the given local name and namespace.
    pub fn find_elements<'a, 'input>(
        doc: &'a roxmltree::Document<'input>,
        ns: &str,
        local_name: &str,
    ) -> Vec<roxmltree::Node<'a, 'input>> {
        doc.descendants()
            .filter(|n| is_element(*n, ns, local_name))
            .collect()
    }
}

fn parse_text(text: &str) -> Result<roxmltree::Document<'_>, Error> {
    roxmltree::Document::parse_with_options(text, crate::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))
}

/// Whether `node` is an element with the given namespace and local name.
pub fn is_element(node: roxmltree::Node<'_, '_>, ns: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace().unwrap_or("") == ns
}

/// First child element of `parent` with the given namespace and local name.
pub fn find_child_element<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    parent.children().find(|n| is_element(*n, ns, local_name))
}

/// All child elements of `parent` with the given namespace and local name.
pub fn find_child_elements<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    parent
        .children()
        .filter(|n| is_element(*n, ns, local_name))
        .collect()
}

/// Prefix of an element as written in the source text.
pub fn element_prefix<'input>(node: roxmltree::Node<'_, 'input>) -> Option<&'input str> {
    let text = node.document().input_text();
    let tag = text.get(node.range())?.strip_prefix('<')?;
    let end = tag
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(tag.len());
    crate::split_qname(&tag[..end]).0
}

/// Prefix bound to an attribute's namespace on `node`.
pub fn attribute_prefix<'input>(
    node: roxmltree::Node<'_, 'input>,
    attr: &roxmltree::Attribute<'_, 'input>,
) -> Option<&'input str> {
    let uri = attr.namespace()?;
    if uri == sundby_core::ns::XML {
        return Some("xml");
    }
    node.namespaces()
        .filter(|n| n.name().is_some() && n.uri() == uri)
        .find_map(|n| n.name())
}
