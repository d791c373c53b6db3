#![forbid(unsafe_code)]

//! Signing credentials.

use crate::keyinfo::{KeyInfoItem, KeyInfoOptions};
use crate::security_key::SecurityKey;
use std::sync::Arc;
use sundby_core::{algorithm, Error};
use sundby_crypto::{HashProvider, SignProvider, SigningKey};

/// A key plus the algorithms to sign with and what to publish in `<KeyInfo>`.
///
/// Algorithm URIs are not checked here; an unsupported digest or signature
/// algorithm surfaces as [`Error::Signing`] when a provider is requested.
#[derive(Clone)]
pub struct SigningCredential {
    key: Arc<dyn SecurityKey>,
    signature_algorithm: String,
    digest_algorithm: String,
    key_info: Option<KeyInfoOptions>,
}

impl SigningCredential {
    /// Digest defaults to the one paired with `signature_algorithm`, or
    /// SHA-256. KeyInfo defaults to [`KeyInfoOptions::default`].
    pub fn new(key: Arc<dyn SecurityKey>, signature_algorithm: impl Into<String>) -> Self {
        let signature_algorithm = signature_algorithm.into();
        let digest_algorithm = algorithm::digest_for_signature(&signature_algorithm)
            .unwrap_or(algorithm::SHA256)
            .to_owned();
        Self {
            key,
            signature_algorithm,
            digest_algorithm,
            key_info: Some(KeyInfoOptions::default()),
        }
    }

    /// Replace the signature algorithm. The digest algorithm is kept.
    pub fn with_signature_algorithm(mut self, uri: impl Into<String>) -> Self {
        self.signature_algorithm = uri.into();
        self
    }

    pub fn with_digest_algorithm(mut self, uri: impl Into<String>) -> Self {
        self.digest_algorithm = uri.into();
        self
    }

    /// `None` omits `<KeyInfo>` entirely.
    pub fn with_key_info(mut self, options: Option<KeyInfoOptions>) -> Self {
        self.key_info = options;
        self
    }

    pub fn key(&self) -> &dyn SecurityKey {
        self.key.as_ref()
    }

    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    pub fn digest_algorithm(&self) -> &str {
        &self.digest_algorithm
    }

    pub fn key_info_options(&self) -> Option<&KeyInfoOptions> {
        self.key_info.as_ref()
    }

    /// Whether the key holds private (or secret) material usable for signing.
    pub fn can_sign(&self) -> bool {
        self.key.signing_key().is_some_and(|k| k.can_sign())
    }

    /// Signing material, or [`Error::Signing`] when the key has none.
    pub fn signing_key(&self) -> Result<SigningKey, Error> {
        self.key
            .signing_key()
            .filter(SigningKey::can_sign)
            .ok_or_else(|| Error::Signing("credential key cannot produce signatures".into()))
    }

    /// Acquire a hash provider for the digest algorithm.
    pub fn hash_provider(&self) -> Result<HashProvider, Error> {
        self.key
            .crypto_provider()
            .hash_algorithm(&self.digest_algorithm)
            .map_err(Error::into_signing)
    }

    /// Acquire a signature provider, after checking the key supports the
    /// signature algorithm.
    pub fn sign_provider(&self) -> Result<SignProvider, Error> {
        if !self.key.is_supported_algorithm(&self.signature_algorithm) {
            return Err(Error::Signing(format!(
                "key does not support signature algorithm {}",
                self.signature_algorithm
            )));
        }
        self.key
            .crypto_provider()
            .signature_provider(&self.signature_algorithm)
            .map_err(Error::into_signing)
    }

    /// KeyInfo content for this credential, empty when KeyInfo is disabled.
    pub fn key_info(&self) -> Vec<KeyInfoItem> {
        self.key_info
            .as_ref()
            .map(|opts| self.key.key_info_material(opts))
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredential")
            .field("key", self.key.key())
            .field("signature_algorithm", &self.signature_algorithm)
            .field("digest_algorithm", &self.digest_algorithm)
            .field("key_info", &self.key_info)
            .finish()
    }
}
