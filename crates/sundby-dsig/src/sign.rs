#![forbid(unsafe_code)]

//! Signing of existing documents.
//!
//! An already serialized document is replayed node by node through a
//! [`SignatureWriter`], so it is signed by exactly the code path used for
//! envelopes written directly.

use crate::serializer::SerializerConfig;
use crate::writer::{SignatureWriter, SignedEnvelope};
use sundby_core::Error;
use sundby_keys::SigningCredential;
use sundby_xml::document::DEFAULT_ID_ATTRS;
use sundby_xml::{replay, XmlDocument, XmlWriter};

/// Enveloped-sign `xml`.
///
/// `reference_id` defaults to the root element's `ID`/`Id`/`id` attribute.
/// Returns the signed document with an XML declaration, and the splice
/// report.
pub fn sign_document(
    xml: &str,
    credential: &SigningCredential,
    reference_id: Option<&str>,
    config: SerializerConfig,
) -> Result<(String, SignedEnvelope), Error> {
    let reference_id = match reference_id {
        Some(id) => id.to_owned(),
        None => root_id(xml)?,
    };

    let mut inner = XmlWriter::new(Vec::new());
    inner.write_declaration()?;
    let mut writer = SignatureWriter::new(inner, credential, &reference_id, config)?;
    replay::replay(xml.as_bytes(), &mut writer)?;
    let envelope = writer
        .signed_envelope()
        .cloned()
        .ok_or_else(|| Error::XmlStructure("document has no root element".into()))?;
    let signed = String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| Error::XmlWrite(format!("signed document is not UTF-8: {e}")))?;
    Ok((signed, envelope))
}

fn root_id(xml: &str) -> Result<String, Error> {
    let document = XmlDocument::parse(xml.to_owned())?;
    let doc = document.parse_doc()?;
    let root = doc.root_element();
    DEFAULT_ID_ATTRS
        .iter()
        .find_map(|name| root.attribute(*name))
        .map(str::to_owned)
        .ok_or_else(|| Error::Construction("root element has no ID attribute to reference".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DsigContext;
    use crate::verify::verify;
    use std::sync::Arc;
    use sundby_core::algorithm;
    use sundby_keys::{AsymmetricKey, Key, KeyData, KeyInfoOptions, KeyUsage, KeysManager};

    const DOC: &str = concat!(
        r#"<?xml version="1.0"?>"#,
        "\n",
        r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
        r#"xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_req42" Version="2.0">"#,
        "\n  <saml:Issuer>https://sp.example.org</saml:Issuer>\n",
        "  <!-- comment -->\n",
        r#"  <samlp:NameIDPolicy AllowCreate="true"/>"#,
        "\n</samlp:AuthnRequest>"
    );

    fn rsa_key() -> Key {
        let pk = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let public = pk.to_public_key();
        Key::new(
            KeyData::Rsa {
                private: Some(pk),
                public,
            },
            KeyUsage::Any,
        )
    }

    #[test]
    fn test_sign_existing_document_rsa() {
        let key = rsa_key();
        let credential = SigningCredential::new(
            Arc::new(AsymmetricKey::new(key.clone()).unwrap()),
            algorithm::RSA_SHA256,
        )
        .with_key_info(Some(KeyInfoOptions {
            key_name: false,
            key_value: true,
            x509_certificate: false,
        }));

        let (signed, envelope) =
            sign_document(DOC, &credential, None, SerializerConfig::default()).unwrap();
        assert!(signed.starts_with("<?xml"));
        assert!(envelope.signature_xml().contains("<ds:RSAKeyValue>"));
        assert!(envelope.xml[..envelope.signature_offset].ends_with("<samlp:NameIDPolicy AllowCreate=\"true\"/>\n"));

        let mut manager = KeysManager::new();
        manager.add_key(key);
        let result = verify(&DsigContext::new(manager), &signed).unwrap();
        assert_eq!(result.signed_id(), Some("_req42"));

        // The inline RSAKeyValue alone is enough when inline keys are trusted.
        let ctx = DsigContext {
            trust_inline_keys: true,
            ..DsigContext::default()
        };
        assert!(verify(&ctx, &signed).unwrap().is_valid());
    }

    #[test]
    fn test_root_without_id() {
        let key = rsa_key();
        let credential =
            SigningCredential::new(Arc::new(AsymmetricKey::new(key).unwrap()), algorithm::RSA_SHA256);
        let err = sign_document("<a/>", &credential, None, SerializerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }
}
