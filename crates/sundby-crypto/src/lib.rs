#![forbid(unsafe_code)]

//! Cryptographic algorithm implementations for sundby.
//!
//! Digests, signatures, AES key wrap and RSA key transport, plus the
//! [`CryptoProvider`] factory through which signing code acquires scoped
//! hash and signature providers.

pub mod digest;
pub mod keytransport;
pub mod keywrap;
pub mod provider;
pub mod sign;

pub use digest::DigestAlgorithm;
pub use provider::{CryptoProvider, HashProvider, RustCryptoProvider, SignProvider};
pub use sign::SigningKey;
