#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use crate::enveloped::EnvelopedSignatureTransform;
use roxmltree::{Document, NodeId};
use sundby_c14n::C14nMode;
use sundby_core::{algorithm, Error};
use sundby_xml::NodeSet;

/// Data flowing through the transform pipeline.
pub enum TransformData<'a, 'input> {
    /// A node set over a parsed document (for XML-aware transforms).
    Xml {
        doc: &'a Document<'input>,
        node_set: NodeSet,
    },
    /// Raw octets.
    Binary(Vec<u8>),
}

impl TransformData<'_, '_> {
    /// Convert to octets. A node set left over at the end of a chain is
    /// serialized with exclusive c14n, comments omitted.
    pub fn into_binary(self) -> Result<Vec<u8>, Error> {
        match self {
            TransformData::Binary(data) => Ok(data),
            TransformData::Xml { doc, node_set } => {
                sundby_c14n::canonicalize_doc(doc, C14nMode::Exclusive, Some(&node_set), &[])
            }
        }
    }
}

/// Trait for individual transforms.
pub trait Transform: Send {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    /// Execute the transform on the given data.
    fn execute<'a, 'input>(
        &self,
        input: TransformData<'a, 'input>,
    ) -> Result<TransformData<'a, 'input>, Error>;
}

/// A pipeline of transforms executed in sequence.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform to the pipeline.
    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Execute all transforms in order.
    pub fn execute<'a, 'input>(
        &self,
        input: TransformData<'a, 'input>,
    ) -> Result<TransformData<'a, 'input>, Error> {
        let mut data = input;
        for transform in &self.transforms {
            data = transform.execute(data)?;
        }
        Ok(data)
    }

    /// Algorithm URIs in execution order.
    pub fn uris(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.uri()).collect()
    }

    /// Number of transforms in the pipeline.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// Build the transform named by `uri`.
///
/// `signature` is the enclosing `<Signature>` element, needed by the
/// enveloped-signature transform.
pub fn transform_for_uri(
    uri: &str,
    inclusive_prefixes: Vec<String>,
    signature: NodeId,
) -> Result<Box<dyn Transform>, Error> {
    if uri == algorithm::ENVELOPED_SIGNATURE {
        return Ok(Box::new(EnvelopedSignatureTransform::new(signature)));
    }
    match C14nMode::from_uri(uri) {
        Some(mode) => Ok(Box::new(C14nTransform::new(mode, inclusive_prefixes))),
        None => Err(Error::UnsupportedAlgorithm(format!("transform: {uri}"))),
    }
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute<'a, 'input>(
        &self,
        input: TransformData<'a, 'input>,
    ) -> Result<TransformData<'a, 'input>, Error> {
        let bytes = match input {
            TransformData::Xml { doc, node_set } => sundby_c14n::canonicalize_doc(
                doc,
                self.mode,
                Some(&node_set),
                &self.inclusive_prefixes,
            )?,
            TransformData::Binary(data) => sundby_c14n::canonicalize(
                std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?,
                self.mode,
                None,
                &self.inclusive_prefixes,
            )?,
        };
        Ok(TransformData::Binary(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sundby_core::ns;

    const SIGNED: &str = concat!(
        r#"<r:Root xmlns:r="urn:r" ID="_a"><r:Item>v</r:Item><!--note-->"#,
        r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/></ds:Signature>"#,
        r#"</r:Root>"#
    );

    #[test]
    fn test_enveloped_then_exc_c14n() {
        let doc = Document::parse(SIGNED).unwrap();
        let sig = doc
            .descendants()
            .find(|n| n.has_tag_name((ns::DSIG, ns::node::SIGNATURE)))
            .unwrap();

        let mut pipeline = TransformPipeline::new();
        pipeline.push(transform_for_uri(algorithm::ENVELOPED_SIGNATURE, Vec::new(), sig.id()).unwrap());
        pipeline.push(transform_for_uri(algorithm::EXC_C14N, Vec::new(), sig.id()).unwrap());
        assert_eq!(pipeline.uris(), vec![algorithm::ENVELOPED_SIGNATURE, algorithm::EXC_C14N]);

        let input = TransformData::Xml {
            doc: &doc,
            node_set: NodeSet::tree_with_comments(doc.root_element()),
        };
        let out = pipeline.execute(input).unwrap().into_binary().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<r:Root xmlns:r="urn:r" ID="_a"><r:Item>v</r:Item></r:Root>"#
        );
    }

    #[test]
    fn test_binary_input_is_reparsed() {
        let t = C14nTransform::new(C14nMode::Exclusive, Vec::new());
        let out = t
            .execute(TransformData::Binary(b"<a   b='1'/>".to_vec()))
            .unwrap()
            .into_binary()
            .unwrap();
        assert_eq!(out, br#"<a b="1"></a>"#);
    }

    #[test]
    fn test_unknown_transform() {
        let doc = Document::parse("<a/>").unwrap();
        let err = transform_for_uri("http://www.w3.org/2000/09/xmldsig#base64", Vec::new(), doc.root().id());
        assert!(matches!(err, Err(Error::UnsupportedAlgorithm(_))));
    }
}
