#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes the ancestor `<Signature>` element from the node set.

use crate::pipeline::{Transform, TransformData};
use roxmltree::NodeId;
use sundby_core::{algorithm, Error};

/// The enveloped signature transform: removes the `<Signature>` element
/// and its descendants from the node set.
pub struct EnvelopedSignatureTransform {
    signature: NodeId,
}

impl EnvelopedSignatureTransform {
    /// Create with the id of the Signature element to remove.
    pub fn new(signature: NodeId) -> Self {
        Self { signature }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute<'a, 'input>(
        &self,
        input: TransformData<'a, 'input>,
    ) -> Result<TransformData<'a, 'input>, Error> {
        match input {
            TransformData::Xml { doc, mut node_set } => {
                let sig = doc.get_node(self.signature).ok_or_else(|| {
                    Error::Transform("signature node not in this document".into())
                })?;
                node_set.remove_subtree(sig);
                Ok(TransformData::Xml { doc, node_set })
            }
            TransformData::Binary(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sundby_xml::NodeSet;

    #[test]
    fn test_removes_signature_subtree() {
        let doc = roxmltree::Document::parse("<a><s><x/></s><b/></a>").unwrap();
        let s = doc.descendants().find(|n| n.has_tag_name("s")).unwrap();
        let all = NodeSet::tree_with_comments(doc.root());
        let before = all.len();
        let out = EnvelopedSignatureTransform::new(s.id())
            .execute(TransformData::Xml { doc: &doc, node_set: all })
            .unwrap();
        let TransformData::Xml { node_set, .. } = out else {
            panic!("expected a node set");
        };
        assert_eq!(node_set.len(), before - 2);
        assert!(!node_set.contains(s));
    }

    #[test]
    fn test_binary_input_rejected() {
        let doc = roxmltree::Document::parse("<a/>").unwrap();
        let t = EnvelopedSignatureTransform::new(doc.root_element().id());
        assert!(t.execute(TransformData::Binary(Vec::new())).is_err());
    }
}
