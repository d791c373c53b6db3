#![forbid(unsafe_code)]

//! The [`SecurityKey`] capability.
//!
//! Signing code never touches key material directly: it asks a
//! `SecurityKey` whether an algorithm applies, obtains providers from the
//! key's [`CryptoProvider`] and hands them the [`SigningKey`].

use crate::key::{Key, KeyData};
use crate::keyinfo::{self, KeyInfoItem, KeyInfoOptions};
use std::sync::Arc;
use sundby_core::{algorithm, Error};
use sundby_crypto::{keytransport, keywrap, CryptoProvider, RustCryptoProvider, SigningKey};

/// Whether a key is a key pair or a shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Asymmetric,
    Symmetric,
}

/// Key material together with the crypto backend that operates on it.
pub trait SecurityKey: Send + Sync {
    /// The wrapped key.
    fn key(&self) -> &Key;

    fn kind(&self) -> KeyKind;

    /// The backend that hands out hash and signature providers for this key.
    fn crypto_provider(&self) -> &dyn CryptoProvider;

    /// Whether `uri` names a signature or key-encryption algorithm this
    /// asymmetric key can perform.
    fn is_asymmetric_algorithm(&self, uri: &str) -> bool;

    /// Whether `uri` names a signature or key-wrap algorithm this symmetric
    /// key can perform.
    fn is_symmetric_algorithm(&self, uri: &str) -> bool;

    /// Encrypt a content key for transport.
    fn encrypt_key(&self, algorithm: &str, key_data: &[u8]) -> Result<Vec<u8>, Error>;

    /// Recover a content key encrypted with [`SecurityKey::encrypt_key`].
    fn decrypt_key(&self, algorithm: &str, wrapped: &[u8]) -> Result<Vec<u8>, Error>;

    /// Key size in bits.
    fn key_size(&self) -> usize {
        self.key().data.size_bits()
    }

    /// Digests are always supported; other algorithms depend on the key.
    fn is_supported_algorithm(&self, uri: &str) -> bool {
        algorithm::DIGESTS.contains(&uri)
            || self.is_asymmetric_algorithm(uri)
            || self.is_symmetric_algorithm(uri)
    }

    /// Material for signature algorithms, `None` when the key has none.
    fn signing_key(&self) -> Option<SigningKey> {
        self.key().to_signing_key()
    }

    /// What to publish in `<KeyInfo>` for this key.
    fn key_info_material(&self, options: &KeyInfoOptions) -> Vec<KeyInfoItem> {
        keyinfo::key_info_items(self.key(), options)
    }
}

fn default_provider() -> Arc<dyn CryptoProvider> {
    Arc::new(RustCryptoProvider)
}

/// RSA or EC key pair (or public key), optionally with a certificate chain.
#[derive(Clone)]
pub struct AsymmetricKey {
    key: Key,
    provider: Arc<dyn CryptoProvider>,
}

impl AsymmetricKey {
    pub fn new(key: Key) -> Result<Self, Error> {
        if !key.data.is_asymmetric() {
            return Err(Error::Key(format!("{:?} is not an asymmetric key", key.data)));
        }
        Ok(Self {
            key,
            provider: default_provider(),
        })
    }

    /// Use a different crypto backend.
    pub fn with_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.provider = provider;
        self
    }
}

impl std::fmt::Debug for AsymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsymmetricKey").field("key", &self.key).finish()
    }
}

impl SecurityKey for AsymmetricKey {
    fn key(&self) -> &Key {
        &self.key
    }

    fn kind(&self) -> KeyKind {
        KeyKind::Asymmetric
    }

    fn crypto_provider(&self) -> &dyn CryptoProvider {
        self.provider.as_ref()
    }

    fn is_asymmetric_algorithm(&self, uri: &str) -> bool {
        match &self.key.data {
            KeyData::Rsa { .. } => matches!(
                uri,
                algorithm::RSA_SHA1
                    | algorithm::RSA_SHA224
                    | algorithm::RSA_SHA256
                    | algorithm::RSA_SHA384
                    | algorithm::RSA_SHA512
                    | algorithm::RSA_PKCS1
                    | algorithm::RSA_OAEP
            ),
            KeyData::EcP256 { .. } => uri == algorithm::ECDSA_SHA256,
            KeyData::EcP384 { .. } => uri == algorithm::ECDSA_SHA384,
            _ => false,
        }
    }

    fn is_symmetric_algorithm(&self, _uri: &str) -> bool {
        false
    }

    fn encrypt_key(&self, algorithm: &str, key_data: &[u8]) -> Result<Vec<u8>, Error> {
        let public = self
            .key
            .rsa_public_key()
            .ok_or_else(|| Error::Key("key transport requires an RSA key".into()))?;
        keytransport::from_uri(algorithm)?.encrypt(public, key_data)
    }

    fn decrypt_key(&self, algorithm: &str, wrapped: &[u8]) -> Result<Vec<u8>, Error> {
        let private = self
            .key
            .rsa_private_key()
            .ok_or_else(|| Error::Key("key transport requires an RSA private key".into()))?;
        keytransport::from_uri(algorithm)?.decrypt(private, wrapped)
    }
}

/// HMAC or AES secret.
#[derive(Clone)]
pub struct SymmetricKey {
    key: Key,
    provider: Arc<dyn CryptoProvider>,
}

impl SymmetricKey {
    pub fn new(key: Key) -> Result<Self, Error> {
        match key.symmetric_key_bytes() {
            Some(bytes) if !bytes.is_empty() => Ok(Self {
                key,
                provider: default_provider(),
            }),
            Some(_) => Err(Error::Key("empty symmetric key".into())),
            None => Err(Error::Key(format!("{:?} is not a symmetric key", key.data))),
        }
    }

    /// Use a different crypto backend.
    pub fn with_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.provider = provider;
        self
    }

    fn secret(&self) -> &[u8] {
        self.key.symmetric_key_bytes().unwrap_or_default()
    }

    fn kek_for(&self, algorithm: &str) -> Result<Box<dyn keywrap::KeyWrapAlgorithm>, Error> {
        if !matches!(self.key.data, KeyData::Aes(_)) {
            return Err(Error::Key("key wrap requires an AES key".into()));
        }
        keywrap::from_uri(algorithm)
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey").field("key", &self.key).finish()
    }
}

impl SecurityKey for SymmetricKey {
    fn key(&self) -> &Key {
        &self.key
    }

    fn kind(&self) -> KeyKind {
        KeyKind::Symmetric
    }

    fn crypto_provider(&self) -> &dyn CryptoProvider {
        self.provider.as_ref()
    }

    fn is_asymmetric_algorithm(&self, _uri: &str) -> bool {
        false
    }

    fn is_symmetric_algorithm(&self, uri: &str) -> bool {
        match &self.key.data {
            KeyData::Hmac(_) => algorithm::SYMMETRIC_SIGNATURES.contains(&uri),
            KeyData::Aes(bytes) => match uri {
                algorithm::KW_AES128 => bytes.len() == 16,
                algorithm::KW_AES192 => bytes.len() == 24,
                algorithm::KW_AES256 => bytes.len() == 32,
                _ => false,
            },
            _ => false,
        }
    }

    fn encrypt_key(&self, algorithm: &str, key_data: &[u8]) -> Result<Vec<u8>, Error> {
        self.kek_for(algorithm)?.wrap(self.secret(), key_data)
    }

    fn decrypt_key(&self, algorithm: &str, wrapped: &[u8]) -> Result<Vec<u8>, Error> {
        self.kek_for(algorithm)?.unwrap(self.secret(), wrapped)
    }
}

/// Wrap a loaded key in the matching [`SecurityKey`] implementation.
pub fn into_security_key(key: Key) -> Result<Arc<dyn SecurityKey>, Error> {
    if key.data.is_asymmetric() {
        Ok(Arc::new(AsymmetricKey::new(key)?))
    } else {
        Ok(Arc::new(SymmetricKey::new(key)?))
    }
}
