#![forbid(unsafe_code)]

//! Enveloped XML Digital Signatures.
//!
//! [`SignatureWriter`] signs an envelope while it is being written;
//! [`sign_document`] signs an already serialized one through the same
//! writer; [`verify`] checks an enveloped signature independently of how it
//! was produced.

pub mod context;
pub mod reference;
pub mod serializer;
pub mod sign;
pub mod verify;
pub mod writer;

pub use context::DsigContext;
pub use reference::{KeyInfo, Reference, Signature, SignedInfo, Transform};
pub use serializer::{SerializerConfig, SignatureSerializer};
pub use sign::sign_document;
pub use verify::{verify, VerifyResult};
pub use writer::{SignatureWriter, SignedEnvelope};
