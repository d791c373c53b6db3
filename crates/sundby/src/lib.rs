#![forbid(unsafe_code)]

//! Signed XML envelopes over the HTTP-POST binding.
//!
//! This crate re-exports the sundby workspace. Most callers only need
//! [`PostBinding`], [`ProtocolMessage`] and a [`SigningCredential`]:
//!
//! ```no_run
//! use sundby::{MessageRole, PostBinding, ProtocolMessage, SigningCredential};
//!
//! # fn main() -> Result<(), sundby::Error> {
//! let key = sundby::keys::loader::load_key_file(std::path::Path::new("idp.pem"))?;
//! let credential = SigningCredential::new(
//!     sundby::keys::into_security_key(key)?,
//!     sundby::core::algorithm::RSA_SHA256,
//! );
//! let message = ProtocolMessage::new(
//!     MessageRole::Response,
//!     "https://sp.example.org/acs",
//!     std::fs::read_to_string("response.xml")?,
//! )?
//! .with_signing(credential, "_response1")?;
//! let bound = PostBinding::new().bind(&message)?;
//! println!("{}", bound.html);
//! # Ok(())
//! # }
//! ```

pub use sundby_binding as binding;
pub use sundby_c14n as c14n;
pub use sundby_core as core;
pub use sundby_crypto as crypto;
pub use sundby_dsig as dsig;
pub use sundby_keys as keys;
pub use sundby_transforms as transforms;
pub use sundby_xml as xml;

pub use sundby_binding::{
    BindingRequest, BoundMessage, MessageRole, PostBinding, ProtocolMessage, TrustLevel,
    UnbindResult, XmlContent,
};
pub use sundby_core::{Error, Result};
pub use sundby_dsig::{
    sign_document, verify, DsigContext, SerializerConfig, SignatureWriter, SignedEnvelope,
    VerifyResult,
};
pub use sundby_keys::{Key, KeysManager, SigningCredential};
