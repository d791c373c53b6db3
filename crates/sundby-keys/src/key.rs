#![forbid(unsafe_code)]

//! Key types and data structures.

use rsa::traits::PublicKeyParts;
use sundby_crypto::SigningKey;

/// Usage flags for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Sign,
    Verify,
    Any,
}

/// The underlying key data.
#[derive(Clone)]
pub enum KeyData {
    Rsa {
        private: Option<rsa::RsaPrivateKey>,
        public: rsa::RsaPublicKey,
    },
    EcP256 {
        private: Option<p256::ecdsa::SigningKey>,
        public: p256::ecdsa::VerifyingKey,
    },
    EcP384 {
        private: Option<p384::ecdsa::SigningKey>,
        public: p384::ecdsa::VerifyingKey,
    },
    Hmac(Vec<u8>),
    Aes(Vec<u8>),
}

impl KeyData {
    /// Whether this is asymmetric key material.
    pub fn is_asymmetric(&self) -> bool {
        matches!(self, Self::Rsa { .. } | Self::EcP256 { .. } | Self::EcP384 { .. })
    }

    /// Whether the private half (or the secret, for symmetric keys) is present.
    pub fn has_private(&self) -> bool {
        match self {
            Self::Rsa { private, .. } => private.is_some(),
            Self::EcP256 { private, .. } => private.is_some(),
            Self::EcP384 { private, .. } => private.is_some(),
            Self::Hmac(k) | Self::Aes(k) => !k.is_empty(),
        }
    }

    /// Key size in bits: modulus size for RSA, curve size for EC, secret
    /// length for symmetric keys.
    pub fn size_bits(&self) -> usize {
        match self {
            Self::Rsa { public, .. } => public.size() * 8,
            Self::EcP256 { .. } => 256,
            Self::EcP384 { .. } => 384,
            Self::Hmac(k) | Self::Aes(k) => k.len() * 8,
        }
    }
}

impl std::fmt::Debug for KeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let half = if self.has_private() { "private+public" } else { "public" };
        match self {
            Self::Rsa { .. } => write!(f, "RSA-{} {half} key", self.size_bits()),
            Self::EcP256 { .. } => write!(f, "EC P-256 {half} key"),
            Self::EcP384 { .. } => write!(f, "EC P-384 {half} key"),
            Self::Hmac(k) => write!(f, "HMAC key ({} bytes)", k.len()),
            Self::Aes(k) => write!(f, "AES key ({} bytes)", k.len()),
        }
    }
}

/// A named key with associated data.
#[derive(Debug, Clone)]
pub struct Key {
    /// Optional name for key lookup and `<KeyName>`.
    pub name: Option<String>,
    pub data: KeyData,
    pub usage: KeyUsage,
    /// Optional X.509 certificate chain (DER-encoded), leaf first.
    pub x509_chain: Vec<Vec<u8>>,
}

impl Key {
    pub fn new(data: KeyData, usage: KeyUsage) -> Self {
        Self {
            name: None,
            data,
            usage,
            x509_chain: Vec::new(),
        }
    }

    /// Set the key name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a DER certificate chain, leaf first.
    pub fn with_x509_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.x509_chain = chain;
        self
    }

    /// Convert to a `SigningKey` for use with signature algorithms.
    ///
    /// Public-only asymmetric keys convert to verification material.
    /// AES keys have no signature use.
    pub fn to_signing_key(&self) -> Option<SigningKey> {
        match &self.data {
            KeyData::Rsa { private: Some(pk), .. } => Some(SigningKey::Rsa(pk.clone())),
            KeyData::Rsa { public, .. } => Some(SigningKey::RsaPublic(public.clone())),
            KeyData::EcP256 { private: Some(sk), .. } => Some(SigningKey::EcP256(sk.clone())),
            KeyData::EcP256 { public, .. } => Some(SigningKey::EcP256Public(*public)),
            KeyData::EcP384 { private: Some(sk), .. } => Some(SigningKey::EcP384(sk.clone())),
            KeyData::EcP384 { public, .. } => Some(SigningKey::EcP384Public(*public)),
            KeyData::Hmac(k) => Some(SigningKey::Hmac(k.clone())),
            KeyData::Aes(_) => None,
        }
    }

    /// Get the raw symmetric key bytes (for AES, HMAC).
    pub fn symmetric_key_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            KeyData::Hmac(k) | KeyData::Aes(k) => Some(k),
            _ => None,
        }
    }

    /// Get the RSA public key if available.
    pub fn rsa_public_key(&self) -> Option<&rsa::RsaPublicKey> {
        match &self.data {
            KeyData::Rsa { public, .. } => Some(public),
            _ => None,
        }
    }

    /// Get the RSA private key if available.
    pub fn rsa_private_key(&self) -> Option<&rsa::RsaPrivateKey> {
        match &self.data {
            KeyData::Rsa { private: Some(pk), .. } => Some(pk),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_and_signing_conversion() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let key = Key::new(
            KeyData::EcP256 {
                public: *sk.verifying_key(),
                private: Some(sk),
            },
            KeyUsage::Sign,
        );
        assert_eq!(key.data.size_bits(), 256);
        assert!(key.to_signing_key().is_some_and(|k| k.can_sign()));

        let aes = Key::new(KeyData::Aes(vec![0; 16]), KeyUsage::Any);
        assert_eq!(aes.data.size_bits(), 128);
        assert!(aes.to_signing_key().is_none());
        assert!(!aes.data.is_asymmetric());
    }

    #[test]
    fn test_debug_hides_material() {
        let key = KeyData::Hmac(b"secret".to_vec());
        assert_eq!(format!("{key:?}"), "HMAC key (6 bytes)");
    }
}
