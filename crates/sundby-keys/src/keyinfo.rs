#![forbid(unsafe_code)]

//! KeyInfo handling.
//!
//! The write side turns a key into the list of [`KeyInfoItem`]s a signature
//! serializer emits under `<ds:KeyInfo>`. The read side extracts inline key
//! material (`KeyValue`, `X509Certificate`) from a parsed `<ds:KeyInfo>`.

use crate::key::{Key, KeyData, KeyUsage};
use crate::manager::KeysManager;
use base64::Engine;
use rsa::traits::PublicKeyParts;
use sundby_core::{ns, Error};
use sundby_xml::document::{find_child_element, find_child_elements};

/// NamedCurve URI for P-256.
pub const CURVE_P256: &str = "urn:oid:1.2.840.10045.3.1.7";
/// NamedCurve URI for P-384.
pub const CURVE_P384: &str = "urn:oid:1.3.132.0.34";

/// What to put into `<KeyInfo>` when signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfoOptions {
    /// Emit `<KeyName>` with the key's name, when it has one.
    pub key_name: bool,
    /// Emit `<KeyValue>` with the public key.
    pub key_value: bool,
    /// Emit `<X509Data>` with the certificate chain, when there is one.
    pub x509_certificate: bool,
}

impl Default for KeyInfoOptions {
    fn default() -> Self {
        Self {
            key_name: true,
            key_value: false,
            x509_certificate: true,
        }
    }
}

/// One child of `<KeyInfo>`, with binary values already base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInfoItem {
    KeyName(String),
    RsaKeyValue { modulus: String, exponent: String },
    EcKeyValue { curve: &'static str, public_key: String },
    X509Certificate(Vec<String>),
}

/// Build the KeyInfo content for `key`.
///
/// Symmetric keys never expose a value; they are identified by name only.
pub fn key_info_items(key: &Key, options: &KeyInfoOptions) -> Vec<KeyInfoItem> {
    let engine = base64::engine::general_purpose::STANDARD;
    let mut items = Vec::new();

    if options.key_name {
        if let Some(name) = key.name.as_deref().filter(|n| !n.is_empty()) {
            items.push(KeyInfoItem::KeyName(name.to_owned()));
        }
    }

    if options.key_value {
        match &key.data {
            KeyData::Rsa { public, .. } => items.push(KeyInfoItem::RsaKeyValue {
                modulus: engine.encode(public.n().to_bytes_be()),
                exponent: engine.encode(public.e().to_bytes_be()),
            }),
            KeyData::EcP256 { public, .. } => items.push(KeyInfoItem::EcKeyValue {
                curve: CURVE_P256,
                public_key: engine.encode(public.to_encoded_point(false).as_bytes()),
            }),
            KeyData::EcP384 { public, .. } => items.push(KeyInfoItem::EcKeyValue {
                curve: CURVE_P384,
                public_key: engine.encode(public.to_encoded_point(false).as_bytes()),
            }),
            KeyData::Hmac(_) | KeyData::Aes(_) => {}
        }
    }

    if options.x509_certificate && !key.x509_chain.is_empty() && key.data.is_asymmetric() {
        items.push(KeyInfoItem::X509Certificate(
            key.x509_chain.iter().map(|der| engine.encode(der)).collect(),
        ));
    }

    items
}

fn decode_b64(text: &str, what: &str) -> Result<Vec<u8>, Error> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.is_empty() {
        return Err(Error::Base64(format!("{what}: empty value")));
    }
    base64::engine::general_purpose::STANDARD
        .decode(&clean)
        .map_err(|e| Error::Base64(format!("{what}: {e}")))
}

/// Resolve the verification key for a `<KeyInfo>` element.
///
/// A `<KeyName>` known to the manager wins. Otherwise inline key material is
/// used only when `trust_inline` is set, since a key carried by the message
/// proves nothing about who signed it. Falls back to the manager's first key.
pub fn resolve_key_info(
    key_info_node: Option<roxmltree::Node<'_, '_>>,
    manager: &KeysManager,
    trust_inline: bool,
) -> Result<Key, Error> {
    if let Some(node) = key_info_node {
        for name_node in find_child_elements(node, ns::DSIG, ns::node::KEY_NAME) {
            let name = name_node.text().unwrap_or("").trim();
            if let Some(key) = manager.find_by_name(name) {
                return Ok(key.clone());
            }
        }
        if trust_inline {
            if let Some(key) = extract_key_value(node) {
                return Ok(key);
            }
        }
    }
    manager.first_key().cloned()
}

/// Try to extract an inline key from `<KeyInfo>` (RSA or EC KeyValue, or
/// X509Certificate).
pub fn extract_key_value(key_info_node: roxmltree::Node<'_, '_>) -> Option<Key> {
    for child in key_info_node.children().filter(|n| n.is_element()) {
        if child.tag_name().namespace() != Some(ns::DSIG) {
            continue;
        }
        match child.tag_name().name() {
            ns::node::KEY_VALUE => {
                if let Ok(key) = parse_rsa_key_value(child) {
                    return Some(key);
                }
                if let Ok(key) = parse_ec_key_value(child) {
                    return Some(key);
                }
            }
            ns::node::X509_DATA => {
                if let Some(key) = extract_x509_certificate(child) {
                    return Some(key);
                }
            }
            _ => {}
        }
    }
    None
}

/// First `<X509Certificate>` is taken as the leaf; the rest form the chain.
fn extract_x509_certificate(x509_data_node: roxmltree::Node<'_, '_>) -> Option<Key> {
    let ders: Vec<Vec<u8>> = find_child_elements(x509_data_node, ns::DSIG, ns::node::X509_CERTIFICATE)
        .into_iter()
        .filter_map(|n| decode_b64(n.text().unwrap_or(""), "X509Certificate").ok())
        .collect();
    let leaf = ders.first()?;
    let key = crate::loader::load_x509_cert_der(leaf).ok()?;
    Some(key.with_x509_chain(ders))
}

/// Extract an RSA public key from a `<KeyValue><RSAKeyValue>` element.
pub fn parse_rsa_key_value(key_value_node: roxmltree::Node<'_, '_>) -> Result<Key, Error> {
    let rsa_kv = find_child_element(key_value_node, ns::DSIG, ns::node::RSA_KEY_VALUE)
        .ok_or_else(|| Error::MissingElement("RSAKeyValue".into()))?;
    let modulus = find_child_element(rsa_kv, ns::DSIG, ns::node::RSA_MODULUS)
        .and_then(|n| n.text())
        .ok_or_else(|| Error::MissingElement("Modulus".into()))?;
    let exponent = find_child_element(rsa_kv, ns::DSIG, ns::node::RSA_EXPONENT)
        .and_then(|n| n.text())
        .ok_or_else(|| Error::MissingElement("Exponent".into()))?;

    let n = rsa::BigUint::from_bytes_be(&decode_b64(modulus, "Modulus")?);
    let e = rsa::BigUint::from_bytes_be(&decode_b64(exponent, "Exponent")?);
    let public = rsa::RsaPublicKey::new(n, e)
        .map_err(|err| Error::Key(format!("invalid RSA public key: {err}")))?;
    Ok(Key::new(
        KeyData::Rsa { private: None, public },
        KeyUsage::Verify,
    ))
}

/// Extract an EC public key from a `<KeyValue><ECKeyValue>` element.
pub fn parse_ec_key_value(key_value_node: roxmltree::Node<'_, '_>) -> Result<Key, Error> {
    let ec_kv = find_child_element(key_value_node, ns::DSIG11, ns::node::EC_KEY_VALUE)
        .ok_or_else(|| Error::MissingElement("ECKeyValue".into()))?;
    let curve_uri = find_child_element(ec_kv, ns::DSIG11, ns::node::NAMED_CURVE)
        .ok_or_else(|| Error::MissingElement("NamedCurve".into()))?
        .attribute(ns::attr::URI)
        .ok_or_else(|| Error::MissingAttribute("URI on NamedCurve".into()))?;
    let point = find_child_element(ec_kv, ns::DSIG11, ns::node::PUBLIC_KEY)
        .and_then(|n| n.text())
        .ok_or_else(|| Error::MissingElement("PublicKey".into()))?;
    let point = decode_b64(point, "EC PublicKey")?;

    match curve_uri {
        CURVE_P256 => {
            let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| Error::Key(format!("invalid P-256 point: {e}")))?;
            Ok(Key::new(
                KeyData::EcP256 { private: None, public: vk },
                KeyUsage::Verify,
            ))
        }
        CURVE_P384 => {
            let vk = p384::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| Error::Key(format!("invalid P-384 point: {e}")))?;
            Ok(Key::new(
                KeyData::EcP384 { private: None, public: vk },
                KeyUsage::Verify,
            ))
        }
        _ => Err(Error::UnsupportedAlgorithm(format!("EC curve: {curve_uri}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p256_key() -> Key {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        Key::new(
            KeyData::EcP256 {
                public: *sk.verifying_key(),
                private: Some(sk),
            },
            KeyUsage::Sign,
        )
        .with_name("idp-signing")
    }

    #[test]
    fn test_items_follow_options() {
        let key = p256_key();
        let items = key_info_items(&key, &KeyInfoOptions::default());
        assert_eq!(items, vec![KeyInfoItem::KeyName("idp-signing".into())]);

        let opts = KeyInfoOptions {
            key_name: false,
            key_value: true,
            x509_certificate: false,
        };
        let items = key_info_items(&key, &opts);
        assert!(matches!(items.as_slice(), [KeyInfoItem::EcKeyValue { curve: CURVE_P256, .. }]));
    }

    #[test]
    fn test_symmetric_key_value_never_exposed() {
        let key = Key::new(KeyData::Hmac(b"secret".to_vec()), KeyUsage::Any);
        let opts = KeyInfoOptions {
            key_name: true,
            key_value: true,
            x509_certificate: true,
        };
        assert!(key_info_items(&key, &opts).is_empty());
    }

    #[test]
    fn test_ec_key_value_roundtrip() {
        let key = p256_key();
        let opts = KeyInfoOptions {
            key_name: false,
            key_value: true,
            x509_certificate: false,
        };
        let items = key_info_items(&key, &opts);
        let [KeyInfoItem::EcKeyValue { curve, public_key }] = items.as_slice()
        else {
            panic!("expected one EC key value");
        };
        let xml = format!(
            r#"<ds:KeyInfo xmlns:ds="{}" xmlns:dsig11="{}"><ds:KeyValue><dsig11:ECKeyValue><dsig11:NamedCurve URI="{curve}"/><dsig11:PublicKey>{public_key}</dsig11:PublicKey></dsig11:ECKeyValue></ds:KeyValue></ds:KeyInfo>"#,
            ns::DSIG,
            ns::DSIG11
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let extracted = extract_key_value(doc.root_element()).unwrap();
        let (KeyData::EcP256 { public: a, .. }, KeyData::EcP256 { public: b, .. }) =
            (&extracted.data, &key.data)
        else {
            panic!("expected P-256 keys");
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolve_prefers_named_manager_key() {
        let mut manager = KeysManager::new();
        manager.add_key(Key::new(KeyData::Hmac(b"a".to_vec()), KeyUsage::Any).with_name("first"));
        manager.add_key(Key::new(KeyData::Hmac(b"b".to_vec()), KeyUsage::Any).with_name("second"));
        let xml = format!(
            r#"<ds:KeyInfo xmlns:ds="{}"><ds:KeyName>second</ds:KeyName></ds:KeyInfo>"#,
            ns::DSIG
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let key = resolve_key_info(Some(doc.root_element()), &manager, false).unwrap();
        assert_eq!(key.name.as_deref(), Some("second"));
        let fallback = resolve_key_info(None, &manager, false).unwrap();
        assert_eq!(fallback.name.as_deref(), Some("first"));
    }
}
