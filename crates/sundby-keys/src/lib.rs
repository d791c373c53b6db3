#![forbid(unsafe_code)]

//! Key management for sundby.
//!
//! Loads keys from PEM, DER, X.509 certificates and raw bytes, wraps them in
//! the [`SecurityKey`] capability used for signing, and handles `<KeyInfo>`
//! in both directions. A [`KeysManager`] provides named lookup for
//! verification.

pub mod credential;
pub mod key;
pub mod keyinfo;
pub mod loader;
pub mod manager;
pub mod security_key;

pub use credential::SigningCredential;
pub use key::{Key, KeyData, KeyUsage};
pub use keyinfo::{KeyInfoItem, KeyInfoOptions};
pub use manager::KeysManager;
pub use security_key::{into_security_key, AsymmetricKey, KeyKind, SecurityKey, SymmetricKey};
