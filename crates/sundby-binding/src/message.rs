#![forbid(unsafe_code)]

//! Outbound protocol messages.

use std::fmt;
use std::sync::Arc;
use sundby_core::{ns, Error};
use sundby_dsig::{SerializerConfig, SignatureWriter};
use sundby_keys::SigningCredential;
use sundby_xml::{replay, XmlEmitter, XmlWriter};

/// Which side of the exchange a message is; selects the form field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageRole {
    Request,
    Response,
}

impl MessageRole {
    /// The form field carrying a message of this role.
    pub fn field_name(&self) -> &'static str {
        match self {
            MessageRole::Request => ns::form::SAML_REQUEST,
            MessageRole::Response => ns::form::SAML_RESPONSE,
        }
    }

    /// The role whose form field is `name`.
    pub fn from_field_name(name: &str) -> Option<Self> {
        match name {
            ns::form::SAML_REQUEST => Some(MessageRole::Request),
            ns::form::SAML_RESPONSE => Some(MessageRole::Response),
            _ => None,
        }
    }
}

/// An emitter a message body is written into.
///
/// When the message is signed the body goes through a [`SignatureWriter`]
/// and [`mark_signature_position`](Self::mark_signature_position) places the
/// signature; otherwise marking is a no-op.
pub trait EnvelopeEmitter: XmlEmitter {
    fn mark_signature_position(&mut self) -> Result<(), Error>;

    fn as_emitter(&mut self) -> &mut dyn XmlEmitter;
}

impl<E: XmlEmitter> EnvelopeEmitter for SignatureWriter<'_, E> {
    fn mark_signature_position(&mut self) -> Result<(), Error> {
        SignatureWriter::mark_signature_position(self)
    }

    fn as_emitter(&mut self) -> &mut dyn XmlEmitter {
        self
    }
}

impl<W: std::io::Write> EnvelopeEmitter for XmlWriter<W> {
    fn mark_signature_position(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn as_emitter(&mut self) -> &mut dyn XmlEmitter {
        self
    }
}

type BodyWriter = dyn Fn(&mut dyn EnvelopeEmitter) -> Result<(), Error> + Send + Sync;

/// The XML body of a message.
#[derive(Clone)]
pub enum XmlContent {
    /// A serialized document, replayed node by node.
    Text(String),
    /// A closure writing the body element by element.
    Writer(Arc<BodyWriter>),
}

impl XmlContent {
    pub fn writer<F>(f: F) -> Self
    where
        F: Fn(&mut dyn EnvelopeEmitter) -> Result<(), Error> + Send + Sync + 'static,
    {
        XmlContent::Writer(Arc::new(f))
    }

    /// Write the body into `out`.
    pub fn write_to(&self, out: &mut dyn EnvelopeEmitter) -> Result<(), Error> {
        match self {
            XmlContent::Text(xml) => replay::replay(xml.as_bytes(), out.as_emitter()).map(|_| ()),
            XmlContent::Writer(f) => f(out),
        }
    }
}

impl fmt::Debug for XmlContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlContent::Text(xml) => f.debug_tuple("Text").field(&xml.len()).finish(),
            XmlContent::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl From<String> for XmlContent {
    fn from(xml: String) -> Self {
        XmlContent::Text(xml)
    }
}

impl From<&str> for XmlContent {
    fn from(xml: &str) -> Self {
        XmlContent::Text(xml.to_owned())
    }
}

/// A message ready to be bound to a transport.
#[derive(Clone)]
pub struct ProtocolMessage {
    role: MessageRole,
    destination: String,
    content: XmlContent,
    relay_state: Option<String>,
    signing: Option<(SigningCredential, String)>,
    signature_algorithm: Option<String>,
    serializer_config: SerializerConfig,
}

impl ProtocolMessage {
    /// Fails with [`Error::Construction`] if `destination` is empty.
    pub fn new(
        role: MessageRole,
        destination: impl Into<String>,
        content: impl Into<XmlContent>,
    ) -> Result<Self, Error> {
        let destination = destination.into();
        if destination.is_empty() {
            return Err(Error::Construction("destination must not be empty".into()));
        }
        Ok(Self {
            role,
            destination,
            content: content.into(),
            relay_state: None,
            signing: None,
            signature_algorithm: None,
            serializer_config: SerializerConfig::default(),
        })
    }

    pub fn with_relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }

    /// Sign the body with `credential`, referencing the root element whose
    /// ID is `reference_id`.
    pub fn with_signing(
        mut self,
        credential: SigningCredential,
        reference_id: impl Into<String>,
    ) -> Result<Self, Error> {
        let reference_id = reference_id.into();
        if reference_id.is_empty() {
            return Err(Error::Construction("reference id must not be empty".into()));
        }
        self.signing = Some((credential, reference_id));
        Ok(self)
    }

    /// Override the credential's signature algorithm.
    pub fn with_signature_algorithm(mut self, uri: impl Into<String>) -> Self {
        self.signature_algorithm = Some(uri.into());
        self
    }

    pub fn with_serializer_config(mut self, config: SerializerConfig) -> Self {
        self.serializer_config = config;
        self
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn content(&self) -> &XmlContent {
        &self.content
    }

    pub fn relay_state(&self) -> Option<&str> {
        self.relay_state.as_deref()
    }

    pub fn reference_id(&self) -> Option<&str> {
        self.signing.as_ref().map(|(_, id)| id.as_str())
    }

    pub fn is_signed(&self) -> bool {
        self.signing.is_some()
    }

    /// Signature algorithm the body will be signed with, if signed.
    pub fn signature_algorithm(&self) -> Option<&str> {
        let (credential, _) = self.signing.as_ref()?;
        Some(
            self.signature_algorithm
                .as_deref()
                .unwrap_or_else(|| credential.signature_algorithm()),
        )
    }

    /// Serialize the body, signing it when a credential is set.
    ///
    /// The output starts with an XML declaration.
    pub fn serialize(&self) -> Result<String, Error> {
        let mut inner = XmlWriter::new(Vec::new());
        inner.write_declaration()?;

        let bytes = match &self.signing {
            Some((credential, reference_id)) => {
                let overridden;
                let credential = match &self.signature_algorithm {
                    Some(uri) => {
                        overridden = credential.clone().with_signature_algorithm(uri.as_str());
                        &overridden
                    }
                    None => credential,
                };
                let mut writer = SignatureWriter::new(
                    inner,
                    credential,
                    reference_id,
                    self.serializer_config.clone(),
                )?;
                self.content.write_to(&mut writer)?;
                if writer.signed_envelope().is_none() {
                    return Err(Error::XmlStructure("message body has no root element".into()));
                }
                writer.into_inner().into_inner()
            }
            None => {
                self.content.write_to(&mut inner)?;
                if inner.depth() != 0 {
                    return Err(Error::XmlStructure("message body left elements open".into()));
                }
                inner.into_inner()
            }
        };

        String::from_utf8(bytes).map_err(|e| Error::XmlWrite(format!("message is not UTF-8: {e}")))
    }
}

impl fmt::Debug for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolMessage")
            .field("role", &self.role)
            .field("destination", &self.destination)
            .field("content", &self.content)
            .field("relay_state", &self.relay_state)
            .field("reference_id", &self.reference_id())
            .field("signature_algorithm", &self.signature_algorithm())
            .finish()
    }
}
