#![forbid(unsafe_code)]

//! Signature value objects.
//!
//! Immutable descriptors of the `<Signature>` element the writer produces:
//! a single same-document [`Reference`] with the enveloped-signature and
//! exclusive c14n transforms, the [`SignedInfo`] around it, and the
//! [`Signature`] with its value and optional [`KeyInfo`].

use base64::Engine;
use sundby_core::algorithm;
use sundby_keys::KeyInfoItem;

/// A transform or canonicalization method: algorithm URI plus the
/// InclusiveNamespaces PrefixList for exclusive c14n.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    pub algorithm: String,
    pub inclusive_prefixes: Vec<String>,
}

impl Transform {
    pub fn enveloped_signature() -> Self {
        Self {
            algorithm: algorithm::ENVELOPED_SIGNATURE.to_owned(),
            inclusive_prefixes: Vec::new(),
        }
    }

    pub fn exc_c14n(inclusive_prefixes: &[String]) -> Self {
        Self {
            algorithm: algorithm::EXC_C14N.to_owned(),
            inclusive_prefixes: inclusive_prefixes.to_vec(),
        }
    }

    /// `PrefixList` attribute value, `None` when the list is empty.
    pub fn prefix_list(&self) -> Option<String> {
        if self.inclusive_prefixes.is_empty() {
            None
        } else {
            Some(self.inclusive_prefixes.join(" "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    uri: String,
    digest_method: String,
    digest_value: Vec<u8>,
    transforms: Vec<Transform>,
}

impl Reference {
    /// Reference to the element carrying `reference_id`, which encloses the
    /// signature.
    pub fn enveloped(
        reference_id: &str,
        digest_method: &str,
        digest_value: Vec<u8>,
        inclusive_prefixes: &[String],
    ) -> Self {
        Self {
            uri: format!("#{reference_id}"),
            digest_method: digest_method.to_owned(),
            digest_value,
            transforms: vec![
                Transform::enveloped_signature(),
                Transform::exc_c14n(inclusive_prefixes),
            ],
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn digest_method(&self) -> &str {
        &self.digest_method
    }

    pub fn digest_value(&self) -> &[u8] {
        &self.digest_value
    }

    pub fn digest_value_b64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.digest_value)
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInfo {
    pub canonicalization: Transform,
    pub signature_method: String,
    pub reference: Reference,
}

impl SignedInfo {
    /// SignedInfo canonicalized with exclusive c14n using the same prefix
    /// list as the reference.
    pub fn new(signature_method: &str, reference: Reference, inclusive_prefixes: &[String]) -> Self {
        Self {
            canonicalization: Transform::exc_c14n(inclusive_prefixes),
            signature_method: signature_method.to_owned(),
            reference,
        }
    }
}

/// `<KeyInfo>` content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInfo {
    pub items: Vec<KeyInfoItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub signed_info: SignedInfo,
    pub signature_value: Vec<u8>,
    pub key_info: Option<KeyInfo>,
}

impl Signature {
    pub fn signature_value_b64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.signature_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enveloped_reference_shape() {
        let prefixes = vec!["saml".to_owned(), "xs".to_owned()];
        let r = Reference::enveloped("_abc", algorithm::SHA256, vec![0xde, 0xad], &prefixes);
        assert_eq!(r.uri(), "#_abc");
        assert_eq!(r.digest_value_b64(), "3q0=");
        let uris: Vec<&str> = r.transforms().iter().map(|t| t.algorithm.as_str()).collect();
        assert_eq!(uris, [algorithm::ENVELOPED_SIGNATURE, algorithm::EXC_C14N]);
        assert_eq!(r.transforms()[1].prefix_list().as_deref(), Some("saml xs"));
        assert_eq!(r.transforms()[0].prefix_list(), None);
    }
}
