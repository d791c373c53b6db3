#![forbid(unsafe_code)]

//! Enveloped XML-DSig signature verification.
//!
//! Processing order:
//! 1. Parse the document, register ID attributes (duplicates are rejected)
//! 2. Read `<SignedInfo>`: CanonicalizationMethod, SignatureMethod
//! 3. Check the single `<Reference>` points at the element enclosing the
//!    signature, run its transforms, compute the digest, compare
//! 4. Resolve the verification key from `<KeyInfo>`
//! 5. Canonicalize `<SignedInfo>`
//! 6. Verify `<SignatureValue>`

use crate::context::DsigContext;
use base64::Engine;
use sundby_c14n::C14nMode;
use sundby_core::{ns, Error};
use sundby_crypto::digest;
use sundby_transforms::{transform_for_uri, TransformData, TransformPipeline};
use sundby_xml::document::{find_child_element, find_child_elements};
use sundby_xml::nodeset::NodeSet;
use sundby_xml::{xpath, XmlDocument};

/// Result of signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// Signature is valid and covers the element with this ID.
    Valid { signed_id: String },
    /// Signature is invalid.
    Invalid { reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }

    /// ID of the signed element, for a valid signature.
    pub fn signed_id(&self) -> Option<&str> {
        match self {
            VerifyResult::Valid { signed_id } => Some(signed_id),
            VerifyResult::Invalid { .. } => None,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        VerifyResult::Invalid {
            reason: reason.into(),
        }
    }
}

fn decode_b64(text: &str, what: &str) -> Result<Vec<u8>, Error> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(&clean)
        .map_err(|e| Error::Base64(format!("{what}: {e}")))
}

fn algorithm_of<'a>(node: roxmltree::Node<'a, '_>, what: &str) -> Result<&'a str, Error> {
    node.attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute(format!("Algorithm on {what}")))
}

/// Verify the enveloped signature of a signed XML document.
///
/// Structural problems (malformed XML, duplicate IDs, missing elements,
/// unsupported algorithms) are errors; a signature that is well-formed but
/// does not check out is `Ok(VerifyResult::Invalid)`.
pub fn verify(ctx: &DsigContext, xml: &str) -> Result<VerifyResult, Error> {
    let mut document = XmlDocument::parse(xml.to_owned())?;
    for name in &ctx.id_attrs {
        document.add_id_attr(name);
    }
    let doc = document.parse_doc()?;
    let id_map = document.build_id_map(&doc)?;

    let signatures = XmlDocument::find_elements(&doc, ns::DSIG, ns::node::SIGNATURE);
    let sig_node = match signatures.as_slice() {
        [] => return Err(Error::MissingElement("Signature".into())),
        [one] => *one,
        _ => return Ok(VerifyResult::invalid("more than one Signature element")),
    };

    let signed_info = find_child_element(sig_node, ns::DSIG, ns::node::SIGNED_INFO)
        .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;

    let c14n_method_node =
        find_child_element(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)
            .ok_or_else(|| Error::MissingElement("CanonicalizationMethod".into()))?;
    let c14n_uri = algorithm_of(c14n_method_node, "CanonicalizationMethod")?;
    let c14n_mode = C14nMode::from_uri(c14n_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {c14n_uri}")))?;
    let inclusive_prefixes = read_inclusive_prefixes(c14n_method_node);

    let sig_method_node = find_child_element(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)
        .ok_or_else(|| Error::MissingElement("SignatureMethod".into()))?;
    let sig_method_uri = algorithm_of(sig_method_node, "SignatureMethod")?;

    // 3. The single Reference
    let references = find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE);
    let [reference] = references.as_slice() else {
        return Ok(VerifyResult::invalid(format!(
            "expected exactly one Reference, found {}",
            references.len()
        )));
    };
    let uri = reference.attribute(ns::attr::URI).unwrap_or("");
    let Some(id) = xpath::parse_same_document_ref(uri) else {
        return Ok(VerifyResult::invalid(format!(
            "Reference URI is not a same-document ID reference: {uri:?}"
        )));
    };
    let target = xpath::resolve_id(&doc, &id_map, id)?;
    if sig_node.parent_element().map(|p| p.id()) != Some(target.id()) {
        return Ok(VerifyResult::invalid(format!(
            "Reference {uri} does not enclose the Signature"
        )));
    }

    let digest_uri = find_child_element(*reference, ns::DSIG, ns::node::DIGEST_METHOD)
        .ok_or_else(|| Error::MissingElement("DigestMethod".into()))
        .and_then(|n| algorithm_of(n, "DigestMethod"))?;
    let expected_digest = find_child_element(*reference, ns::DSIG, ns::node::DIGEST_VALUE)
        .ok_or_else(|| Error::MissingElement("DigestValue".into()))
        .and_then(|n| decode_b64(n.text().unwrap_or(""), "DigestValue"))?;

    let mut pipeline = TransformPipeline::new();
    if let Some(transforms) = find_child_element(*reference, ns::DSIG, ns::node::TRANSFORMS) {
        for t in find_child_elements(transforms, ns::DSIG, ns::node::TRANSFORM) {
            pipeline.push(transform_for_uri(
                algorithm_of(t, "Transform")?,
                read_inclusive_prefixes(t),
                sig_node.id(),
            )?);
        }
    }
    let input = TransformData::Xml {
        doc: &doc,
        node_set: NodeSet::tree_with_comments(target),
    };
    let bytes = pipeline.execute(input)?.into_binary()?;
    let computed = digest::digest(digest_uri, &bytes)?;
    if computed != expected_digest {
        return Ok(VerifyResult::invalid(format!(
            "URI={uri}: expected digest does not match computed digest"
        )));
    }

    // 4. Resolve verification key
    let key_info_node = find_child_element(sig_node, ns::DSIG, ns::node::KEY_INFO);
    let key = sundby_keys::keyinfo::resolve_key_info(
        key_info_node,
        &ctx.keys_manager,
        ctx.trust_inline_keys,
    )?;
    let verification_key = key
        .to_signing_key()
        .ok_or_else(|| Error::Key("key cannot verify signatures".into()))?;

    // 5. Canonicalize SignedInfo
    let signed_info_set = if c14n_mode.with_comments() {
        NodeSet::tree_with_comments(signed_info)
    } else {
        NodeSet::tree_without_comments(signed_info)
    };
    let c14n_signed_info = sundby_c14n::canonicalize_doc(
        &doc,
        c14n_mode,
        Some(&signed_info_set),
        &inclusive_prefixes,
    )?;

    // 6. SignatureValue
    let sig_value = find_child_element(sig_node, ns::DSIG, ns::node::SIGNATURE_VALUE)
        .ok_or_else(|| Error::MissingElement("SignatureValue".into()))
        .and_then(|n| decode_b64(n.text().unwrap_or(""), "SignatureValue"))?;

    let sig_alg = sundby_crypto::sign::from_uri(sig_method_uri)?;
    if sig_alg.verify(&verification_key, &c14n_signed_info, &sig_value)? {
        tracing::debug!(signed_id = id, "signature verified");
        Ok(VerifyResult::Valid {
            signed_id: id.to_owned(),
        })
    } else {
        Ok(VerifyResult::invalid("signature value verification failed"))
    }
}

fn read_inclusive_prefixes(node: roxmltree::Node<'_, '_>) -> Vec<String> {
    find_child_element(node, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|n| n.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sundby_keys::{Key, KeyData, KeyUsage, KeysManager};

    fn ctx() -> DsigContext {
        let mut mgr = KeysManager::new();
        mgr.add_key(Key::new(KeyData::Hmac(b"k".to_vec()), KeyUsage::Any));
        DsigContext::new(mgr)
    }

    #[test]
    fn test_missing_signature_is_error() {
        assert!(matches!(
            verify(&ctx(), "<a ID=\"_1\"/>"),
            Err(Error::MissingElement(_))
        ));
    }

    #[test]
    fn test_detached_reference_rejected() {
        let xml = format!(
            concat!(
                r#"<r><a ID="_1"/><ds:Signature xmlns:ds="{ds}"><ds:SignedInfo>"#,
                r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
                r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#hmac-sha256"/>"#,
                r##"<ds:Reference URI="#_1"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"##,
                r#"<ds:DigestValue>AA==</ds:DigestValue></ds:Reference></ds:SignedInfo>"#,
                r#"<ds:SignatureValue>AA==</ds:SignatureValue></ds:Signature></r>"#
            ),
            ds = ns::DSIG
        );
        let result = verify(&ctx(), &xml).unwrap();
        assert!(!result.is_valid());
        assert!(result.signed_id().is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let xml = r#"<a ID="_1"><b ID="_1"/></a>"#;
        assert!(verify(&ctx(), xml).is_err());
    }
}
