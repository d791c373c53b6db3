#![forbid(unsafe_code)]

//! Results of decoding an inbound message.

use sundby_core::Error;
use sundby_dsig::{DsigContext, VerifyResult};
use sundby_xml::document::DEFAULT_ID_ATTRS;
use sundby_xml::XmlDocument;

/// How much evidence there is that a message is authentic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TrustLevel {
    /// Nothing has been checked.
    #[default]
    None,
    /// The transport vouches for the message (e.g. mutually authenticated TLS).
    TransportAsserted,
    /// An enveloped signature over the whole message verified.
    SignatureVerified,
}

/// A decoded inbound message.
#[derive(Debug, Clone)]
pub struct UnbindResult {
    document: XmlDocument,
    field: &'static str,
    relay_state: Option<String>,
    trust_level: TrustLevel,
}

impl UnbindResult {
    pub(crate) fn new(document: XmlDocument, field: &'static str, relay_state: Option<String>) -> Self {
        Self {
            document,
            field,
            relay_state,
            trust_level: TrustLevel::None,
        }
    }

    /// The parsed message.
    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    pub fn into_document(self) -> XmlDocument {
        self.document
    }

    /// The decoded XML text.
    pub fn xml(&self) -> &str {
        self.document.text()
    }

    /// Local name of the message's root element.
    pub fn root_name(&self) -> &str {
        self.document.root_name()
    }

    pub fn root_namespace(&self) -> Option<&str> {
        self.document.root_namespace()
    }

    /// The form field the message was taken from.
    pub fn message_field(&self) -> &'static str {
        self.field
    }

    pub fn relay_state(&self) -> Option<&str> {
        self.relay_state.as_deref()
    }

    pub fn trust_level(&self) -> TrustLevel {
        self.trust_level
    }

    /// Verify the message's enveloped signature.
    ///
    /// The trust level becomes [`TrustLevel::SignatureVerified`] only when the
    /// signature is valid and covers the root element. Any other outcome
    /// leaves it unchanged.
    pub fn verify_signature(&mut self, ctx: &DsigContext) -> Result<VerifyResult, Error> {
        let result = sundby_dsig::verify(ctx, self.document.text())?;
        if let Some(signed_id) = result.signed_id() {
            if self.root_id()?.as_deref() == Some(signed_id) {
                self.trust_level = TrustLevel::SignatureVerified;
            } else {
                tracing::debug!(signed_id, "signature does not cover the message root");
            }
        }
        Ok(result)
    }

    fn root_id(&self) -> Result<Option<String>, Error> {
        let doc = self.document.parse_doc()?;
        let root = doc.root_element();
        Ok(DEFAULT_ID_ATTRS
            .iter()
            .find_map(|name| root.attribute(*name))
            .map(str::to_owned))
    }
}
