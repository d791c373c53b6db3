#![forbid(unsafe_code)]

//! Writes [`Signature`] descriptors to an [`XmlEmitter`].
//!
//! All output choices come from an explicit [`SerializerConfig`]; there is
//! no process-wide default serializer.

use crate::reference::{KeyInfo, Signature, SignedInfo, Transform};
use sundby_core::{ns, Error};
use sundby_keys::KeyInfoItem;
use sundby_xml::{XmlEmitter, XmlWriter};

const EC_PREFIX: &str = "ec";
const DSIG11_PREFIX: &str = "dsig11";

/// How a signature is serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerConfig {
    /// Prefix for XML-DSig elements. Empty puts them in the default namespace.
    pub prefix: String,
    /// Emit `<KeyInfo>` when the credential provides content for it.
    pub emit_key_info: bool,
    /// InclusiveNamespaces PrefixList for both the reference transform and
    /// SignedInfo canonicalization.
    pub inclusive_prefixes: Vec<String>,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            prefix: ns::DSIG_PREFIX.to_owned(),
            emit_key_info: true,
            inclusive_prefixes: Vec::new(),
        }
    }
}

impl SerializerConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_key_info(mut self, emit: bool) -> Self {
        self.emit_key_info = emit;
        self
    }

    pub fn with_inclusive_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inclusive_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }
}

pub struct SignatureSerializer<'a> {
    config: &'a SerializerConfig,
}

impl<'a> SignatureSerializer<'a> {
    pub fn new(config: &'a SerializerConfig) -> Self {
        Self { config }
    }

    fn prefix(&self) -> Option<&str> {
        Some(self.config.prefix.as_str()).filter(|p| !p.is_empty())
    }

    fn start(&self, out: &mut dyn XmlEmitter, local: &str) -> Result<(), Error> {
        out.start_element(self.prefix(), local, Some(ns::DSIG))
    }

    fn text_element(&self, out: &mut dyn XmlEmitter, local: &str, text: &str) -> Result<(), Error> {
        self.start(out, local)?;
        out.write_text(text)?;
        out.end_element()
    }

    fn algorithm_element(
        &self,
        out: &mut dyn XmlEmitter,
        local: &str,
        method: &Transform,
    ) -> Result<(), Error> {
        self.start(out, local)?;
        out.write_attribute(None, ns::attr::ALGORITHM, None, &method.algorithm)?;
        if let Some(list) = method.prefix_list() {
            out.start_element(Some(EC_PREFIX), ns::node::INCLUSIVE_NAMESPACES, Some(ns::EXC_C14N))?;
            out.write_attribute(None, ns::attr::PREFIX_LIST, None, &list)?;
            out.end_element()?;
        }
        out.end_element()
    }

    /// Write a complete `<Signature>` element.
    pub fn write_signature(&self, out: &mut dyn XmlEmitter, signature: &Signature) -> Result<(), Error> {
        self.start(out, ns::node::SIGNATURE)?;
        self.write_signed_info(out, &signature.signed_info)?;
        self.text_element(out, ns::node::SIGNATURE_VALUE, &signature.signature_value_b64())?;
        if self.config.emit_key_info {
            if let Some(key_info) = signature.key_info.as_ref().filter(|k| !k.items.is_empty()) {
                self.write_key_info(out, key_info)?;
            }
        }
        out.end_element()
    }

    pub fn write_signed_info(&self, out: &mut dyn XmlEmitter, signed_info: &SignedInfo) -> Result<(), Error> {
        self.start(out, ns::node::SIGNED_INFO)?;
        self.algorithm_element(out, ns::node::CANONICALIZATION_METHOD, &signed_info.canonicalization)?;

        self.start(out, ns::node::SIGNATURE_METHOD)?;
        out.write_attribute(None, ns::attr::ALGORITHM, None, &signed_info.signature_method)?;
        out.end_element()?;

        let reference = &signed_info.reference;
        self.start(out, ns::node::REFERENCE)?;
        out.write_attribute(None, ns::attr::URI, None, reference.uri())?;
        self.start(out, ns::node::TRANSFORMS)?;
        for transform in reference.transforms() {
            self.algorithm_element(out, ns::node::TRANSFORM, transform)?;
        }
        out.end_element()?;
        self.start(out, ns::node::DIGEST_METHOD)?;
        out.write_attribute(None, ns::attr::ALGORITHM, None, reference.digest_method())?;
        out.end_element()?;
        self.text_element(out, ns::node::DIGEST_VALUE, &reference.digest_value_b64())?;
        out.end_element()?;

        out.end_element()
    }

    pub fn write_key_info(&self, out: &mut dyn XmlEmitter, key_info: &KeyInfo) -> Result<(), Error> {
        self.start(out, ns::node::KEY_INFO)?;
        for item in &key_info.items {
            match item {
                KeyInfoItem::KeyName(name) => self.text_element(out, ns::node::KEY_NAME, name)?,
                KeyInfoItem::RsaKeyValue { modulus, exponent } => {
                    self.start(out, ns::node::KEY_VALUE)?;
                    self.start(out, ns::node::RSA_KEY_VALUE)?;
                    self.text_element(out, ns::node::RSA_MODULUS, modulus)?;
                    self.text_element(out, ns::node::RSA_EXPONENT, exponent)?;
                    out.end_element()?;
                    out.end_element()?;
                }
                KeyInfoItem::EcKeyValue { curve, public_key } => {
                    let dsig11 = Some(DSIG11_PREFIX);
                    self.start(out, ns::node::KEY_VALUE)?;
                    out.start_element(dsig11, ns::node::EC_KEY_VALUE, Some(ns::DSIG11))?;
                    out.start_element(dsig11, ns::node::NAMED_CURVE, Some(ns::DSIG11))?;
                    out.write_attribute(None, ns::attr::URI, None, curve)?;
                    out.end_element()?;
                    out.start_element(dsig11, ns::node::PUBLIC_KEY, Some(ns::DSIG11))?;
                    out.write_text(public_key)?;
                    out.end_element()?;
                    out.end_element()?;
                    out.end_element()?;
                }
                KeyInfoItem::X509Certificate(chain) => {
                    self.start(out, ns::node::X509_DATA)?;
                    for cert in chain {
                        self.text_element(out, ns::node::X509_CERTIFICATE, cert)?;
                    }
                    out.end_element()?;
                }
            }
        }
        out.end_element()
    }

    /// `<SignedInfo>` serialized on its own, declaring every namespace it uses.
    pub fn signed_info_xml(&self, signed_info: &SignedInfo) -> Result<String, Error> {
        self.standalone(|out| self.write_signed_info(out, signed_info))
    }

    /// `<Signature>` serialized on its own, declaring every namespace it uses.
    pub fn signature_xml(&self, signature: &Signature) -> Result<String, Error> {
        self.standalone(|out| self.write_signature(out, signature))
    }

    fn standalone(
        &self,
        write: impl FnOnce(&mut dyn XmlEmitter) -> Result<(), Error>,
    ) -> Result<String, Error> {
        let mut writer = XmlWriter::new(Vec::new());
        write(&mut writer)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::XmlWrite(format!("serialized signature is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;
    use sundby_core::algorithm;

    fn signature(prefixes: &[String]) -> Signature {
        let reference = Reference::enveloped("_r1", algorithm::SHA256, vec![1, 2, 3], prefixes);
        Signature {
            signed_info: SignedInfo::new(algorithm::HMAC_SHA256, reference, prefixes),
            signature_value: vec![4, 5, 6],
            key_info: Some(KeyInfo {
                items: vec![KeyInfoItem::KeyName("k1".into())],
            }),
        }
    }

    #[test]
    fn test_signature_layout() {
        let config = SerializerConfig::default();
        let xml = SignatureSerializer::new(&config)
            .signature_xml(&signature(&[]))
            .unwrap();
        assert_eq!(
            xml,
            concat!(
                r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">"#,
                r#"<ds:SignedInfo>"#,
                r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
                r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#hmac-sha256"/>"#,
                r##"<ds:Reference URI="#_r1"><ds:Transforms>"##,
                r#"<ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>"#,
                r#"<ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
                r#"</ds:Transforms>"#,
                r#"<ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#,
                r#"<ds:DigestValue>AQID</ds:DigestValue>"#,
                r#"</ds:Reference></ds:SignedInfo>"#,
                r#"<ds:SignatureValue>BAUG</ds:SignatureValue>"#,
                r#"<ds:KeyInfo><ds:KeyName>k1</ds:KeyName></ds:KeyInfo>"#,
                r#"</ds:Signature>"#
            )
        );
    }

    #[test]
    fn test_prefix_list_and_default_namespace() {
        let config = SerializerConfig::default()
            .with_prefix("")
            .with_key_info(false)
            .with_inclusive_prefixes(["saml"]);
        let xml = SignatureSerializer::new(&config)
            .signature_xml(&signature(&config.inclusive_prefixes))
            .unwrap();
        assert!(xml.starts_with(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">"#));
        assert!(xml.contains(
            r#"<ec:InclusiveNamespaces xmlns:ec="http://www.w3.org/2001/10/xml-exc-c14n#" PrefixList="saml"/>"#
        ));
        assert!(!xml.contains("KeyInfo"));
    }
}
