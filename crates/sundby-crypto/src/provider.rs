#![forbid(unsafe_code)]

//! Crypto provider factory.
//!
//! A [`CryptoProvider`] hands out short-lived [`HashProvider`] and
//! [`SignProvider`] values for one operation. They are owned: the caller
//! acquires one right before hashing or signing and it is released when it
//! goes out of scope, on the error path as much as on success. A provider
//! can carry a release hook so that pooled or hardware-backed
//! implementations (and tests) observe the release.

use crate::digest::{self, DigestAlgorithm};
use crate::sign::{self, SignatureAlgorithm, SigningKey};
use sundby_core::Error;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Factory for hash and signature providers.
pub trait CryptoProvider: Send + Sync {
    /// Acquire a hash provider for a digest algorithm URI.
    fn hash_algorithm(&self, uri: &str) -> Result<HashProvider, Error>;

    /// Acquire a signature provider for a signature algorithm URI.
    fn signature_provider(&self, uri: &str) -> Result<SignProvider, Error>;
}

/// The default provider, backed by the RustCrypto implementations in this
/// crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

impl CryptoProvider for RustCryptoProvider {
    fn hash_algorithm(&self, uri: &str) -> Result<HashProvider, Error> {
        Ok(HashProvider::new(digest::from_uri(uri)?))
    }

    fn signature_provider(&self, uri: &str) -> Result<SignProvider, Error> {
        Ok(SignProvider::new(sign::from_uri(uri)?))
    }
}

/// A scoped hash computation.
pub struct HashProvider {
    inner: Option<Box<dyn DigestAlgorithm>>,
    uri: &'static str,
    on_release: Option<ReleaseHook>,
}

impl HashProvider {
    pub fn new(inner: Box<dyn DigestAlgorithm>) -> Self {
        let uri = inner.uri();
        Self {
            inner: Some(inner),
            uri,
            on_release: None,
        }
    }

    /// Attach a hook run exactly once when the provider is released.
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn uri(&self) -> &'static str {
        self.uri
    }

    pub fn update(&mut self, data: &[u8]) {
        if let Some(inner) = self.inner.as_mut() {
            inner.update(data);
        }
    }

    /// Finish the hash. The provider is released on return.
    pub fn finalize(mut self) -> Result<Vec<u8>, Error> {
        let inner = self
            .inner
            .take()
            .ok_or_else(|| Error::Crypto("hash provider already finalized".into()))?;
        Ok(inner.finalize())
    }

    /// Hash `data` in one shot.
    pub fn digest(mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.update(data);
        self.finalize()
    }
}

impl Drop for HashProvider {
    fn drop(&mut self) {
        tracing::trace!(algorithm = self.uri(), "hash provider released");
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

/// A scoped signature operation.
pub struct SignProvider {
    inner: Box<dyn SignatureAlgorithm>,
    on_release: Option<ReleaseHook>,
}

impl SignProvider {
    pub fn new(inner: Box<dyn SignatureAlgorithm>) -> Self {
        Self {
            inner,
            on_release: None,
        }
    }

    /// Attach a hook run exactly once when the provider is released.
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn uri(&self) -> &'static str {
        self.inner.uri()
    }

    pub fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.inner.sign(key, data)
    }

    pub fn verify(&self, key: &SigningKey, data: &[u8], signature: &[u8]) -> Result<bool, Error> {
        self.inner.verify(key, data, signature)
    }
}

impl Drop for SignProvider {
    fn drop(&mut self) {
        tracing::trace!(algorithm = self.uri(), "signature provider released");
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}
