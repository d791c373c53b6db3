#![forbid(unsafe_code)]

//! HTTP-POST protocol binding.
//!
//! [`PostBinding::bind`] serializes a [`ProtocolMessage`] (signing it through
//! a [`SignatureWriter`](sundby_dsig::SignatureWriter) when it carries a
//! credential) into an auto-submitting HTML form. [`PostBinding::unbind`]
//! decodes a posted form back into an [`UnbindResult`] without verifying it.

pub mod form;
pub mod message;
pub mod post;
pub mod request;
pub mod result;

pub use message::{EnvelopeEmitter, MessageRole, ProtocolMessage, XmlContent};
pub use post::{BoundMessage, PostBinding};
pub use request::BindingRequest;
pub use result::{TrustLevel, UnbindResult};
