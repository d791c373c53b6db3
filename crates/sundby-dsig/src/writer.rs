#![forbid(unsafe_code)]

//! The canonicalizing signature writer.
//!
//! [`SignatureWriter`] sits in front of any [`XmlEmitter`]. The caller
//! writes one complete envelope through it with ordinary emitter calls;
//! every call goes to a raw serialization buffer and, in lock-step, to a
//! streaming exclusive canonicalizer. When the root element closes the
//! writer digests the canonical bytes, signs a SignedInfo over that digest,
//! splices the serialized `<Signature>` into the raw buffer at the marked
//! position (or as the last child of the root) and replays the result into
//! the inner emitter.

use crate::reference::{KeyInfo, Reference, Signature, SignedInfo};
use crate::serializer::{SerializerConfig, SignatureSerializer};
use std::collections::BTreeMap;
use sundby_c14n::ExcC14nStream;
use sundby_core::Error;
use sundby_keys::SigningCredential;
use sundby_xml::document::DEFAULT_ID_ATTRS;
use sundby_xml::{replay, XmlEmitter, XmlWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Content is being written, no signature position chosen.
    Writing,
    /// A signature position was marked; content is still being written.
    SignaturePending,
    /// The root element closed and finalization ran (successfully or not).
    Finalized,
}

/// Where the signature goes: a byte offset into the raw buffer plus the
/// namespace bindings in scope there.
struct Splice {
    offset: usize,
    in_scope: BTreeMap<String, String>,
}

/// Outcome of a successful signing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    /// The signed document as spliced, before replay into the inner emitter.
    pub xml: String,
    /// Byte offset of `<Signature` within `xml`.
    pub signature_offset: usize,
    /// Length in bytes of the serialized `<Signature>` element.
    pub signature_len: usize,
}

impl SignedEnvelope {
    /// The serialized `<Signature>` element.
    pub fn signature_xml(&self) -> &str {
        &self.xml[self.signature_offset..self.signature_offset + self.signature_len]
    }
}

/// Wraps an [`XmlEmitter`] so that a complete envelope written through it
/// comes out enveloped-signed.
///
/// Single use: the writer finalizes exactly once, when the root element
/// closes, and rejects every write after that with [`Error::Protocol`].
///
/// The inner emitter receives nothing until signing has succeeded and the
/// signed document has replayed cleanly once. An error raised by the inner
/// emitter itself can still leave it holding part of the document; discard
/// it when the writer returns an error.
pub struct SignatureWriter<'c, E: XmlEmitter> {
    inner: E,
    credential: &'c SigningCredential,
    reference_id: String,
    config: SerializerConfig,
    raw: XmlWriter<Vec<u8>>,
    c14n: ExcC14nStream,
    depth: usize,
    state: WriterState,
    splice: Option<Splice>,
    root_has_reference_id: bool,
    envelope: Option<SignedEnvelope>,
    disposed: bool,
}

impl<'c, E: XmlEmitter> SignatureWriter<'c, E> {
    /// Create a writer signing the element whose ID is `reference_id`.
    ///
    /// Fails with [`Error::Construction`] if `reference_id` is empty or the
    /// credential's key cannot sign.
    pub fn new(
        inner: E,
        credential: &'c SigningCredential,
        reference_id: &str,
        config: SerializerConfig,
    ) -> Result<Self, Error> {
        if reference_id.is_empty() {
            return Err(Error::Construction("reference id must not be empty".into()));
        }
        if !credential.can_sign() {
            return Err(Error::Construction(
                "signing credential has no private key material".into(),
            ));
        }
        let c14n = ExcC14nStream::new(&config.inclusive_prefixes);
        Ok(Self {
            inner,
            credential,
            reference_id: reference_id.to_owned(),
            config,
            raw: XmlWriter::new(Vec::new()),
            c14n,
            depth: 0,
            state: WriterState::Writing,
            splice: None,
            root_has_reference_id: false,
            envelope: None,
            disposed: false,
        })
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_finalized(&self) -> bool {
        self.state == WriterState::Finalized
    }

    /// Put the signature at the current position instead of at the end of
    /// the root element.
    ///
    /// Allowed once, directly inside the root element (between its
    /// children) and before finalization. The signature must be a child of
    /// the element it references.
    pub fn mark_signature_position(&mut self) -> Result<(), Error> {
        match self.state {
            WriterState::Writing => {}
            WriterState::SignaturePending => {
                return Err(Error::Protocol("signature position already marked".into()))
            }
            WriterState::Finalized => {
                return Err(Error::Protocol("signature position marked after finalization".into()))
            }
        }
        if self.depth != 1 {
            return Err(Error::Protocol(format!(
                "signature position must be a direct child of the root element (depth {})",
                self.depth
            )));
        }
        self.raw.close_start_tag()?;
        self.splice = Some(Splice {
            offset: self.raw.get_ref().len(),
            in_scope: self.c14n.in_scope(),
        });
        self.state = WriterState::SignaturePending;
        Ok(())
    }

    /// The signed envelope, once finalization has succeeded.
    pub fn signed_envelope(&self) -> Option<&SignedEnvelope> {
        self.envelope.as_ref()
    }

    /// Consume the writer and return the signing report.
    pub fn finish(self) -> Result<SignedEnvelope, Error> {
        let state = self.state;
        self.envelope.ok_or_else(|| match state {
            WriterState::Finalized => Error::Protocol("signing failed; no envelope produced".into()),
            _ => Error::Protocol("root element not closed".into()),
        })
    }

    /// Consume the writer and return the inner emitter.
    pub fn into_inner(self) -> E {
        self.inner
    }

    /// Release the internal buffers. Further writes fail; calling this
    /// again does nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.state = WriterState::Finalized;
        self.raw = XmlWriter::new(Vec::new());
        self.c14n = ExcC14nStream::new(&[]);
        self.splice = None;
    }

    fn check_writable(&self) -> Result<(), Error> {
        if self.state == WriterState::Finalized {
            return Err(Error::Protocol("write after the envelope was finalized".into()));
        }
        Ok(())
    }

    fn close(&mut self, full: bool) -> Result<(), Error> {
        self.check_writable()?;
        if self.depth == 0 {
            return Err(Error::Protocol("end_element with no open element".into()));
        }
        if self.depth > 1 {
            if full {
                self.raw.end_element_full()?;
            } else {
                self.raw.end_element()?;
            }
            self.c14n.end_element()?;
            self.depth -= 1;
            return Ok(());
        }

        // Root close: the root always gets a separate end tag so there is
        // content room for the signature.
        self.raw.close_start_tag()?;
        if self.splice.is_none() {
            self.splice = Some(Splice {
                offset: self.raw.get_ref().len(),
                in_scope: self.c14n.in_scope(),
            });
        }
        self.raw.end_element_full()?;
        self.c14n.end_element()?;
        self.depth = 0;
        self.state = WriterState::Finalized;

        let envelope = self.finalize()?;
        tracing::debug!(
            reference = %self.reference_id,
            offset = envelope.signature_offset,
            len = envelope.signature_len,
            "signature spliced into envelope"
        );
        self.envelope = Some(envelope);
        Ok(())
    }

    fn finalize(&mut self) -> Result<SignedEnvelope, Error> {
        if !self.root_has_reference_id {
            return Err(Error::Signing(format!(
                "root element carries no ID attribute equal to {}",
                self.reference_id
            )));
        }
        let splice = self
            .splice
            .take()
            .ok_or_else(|| Error::Protocol("no signature position".into()))?;
        let canonical = self.c14n.finish()?;
        let prefixes = self.config.inclusive_prefixes.clone();

        let digest = {
            let mut hash = self.credential.hash_provider()?;
            hash.update(&canonical);
            hash.finalize().map_err(Error::into_signing)?
        };

        let reference = Reference::enveloped(
            &self.reference_id,
            self.credential.digest_algorithm(),
            digest,
            &prefixes,
        );
        let signed_info = SignedInfo::new(self.credential.signature_algorithm(), reference, &prefixes);
        let serializer = SignatureSerializer::new(&self.config);
        let signed_info_c14n = sundby_c14n::canonicalize_fragment(
            &serializer.signed_info_xml(&signed_info)?,
            &prefixes,
            &splice.in_scope,
        )?;

        let signature_value = {
            let key = self.credential.signing_key()?;
            let signer = self.credential.sign_provider()?;
            signer
                .sign(&key, &signed_info_c14n)
                .map_err(Error::into_signing)?
        };

        let key_info = Some(self.credential.key_info())
            .filter(|items| self.config.emit_key_info && !items.is_empty())
            .map(|items| KeyInfo { items });
        let signature = Signature {
            signed_info,
            signature_value,
            key_info,
        };
        let signature_xml = serializer.signature_xml(&signature)?;

        let mut raw = std::mem::replace(&mut self.raw, XmlWriter::new(Vec::new())).into_inner();
        raw.splice(splice.offset..splice.offset, signature_xml.bytes());
        let xml = String::from_utf8(raw)
            .map_err(|e| Error::XmlWrite(format!("signed envelope is not UTF-8: {e}")))?;

        // Nothing reaches the inner emitter unless the whole document replays.
        replay::replay(xml.as_bytes(), &mut XmlWriter::new(std::io::sink()))?;
        replay::replay(xml.as_bytes(), &mut self.inner)?;
        self.inner.flush()?;

        Ok(SignedEnvelope {
            xml,
            signature_offset: splice.offset,
            signature_len: signature_xml.len(),
        })
    }
}

impl<E: XmlEmitter> XmlEmitter for SignatureWriter<'_, E> {
    fn start_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace: Option<&str>,
    ) -> Result<(), Error> {
        self.check_writable()?;
        self.raw.start_element(prefix, local_name, namespace)?;
        self.c14n.start_element(prefix, local_name, namespace)?;
        self.depth += 1;
        Ok(())
    }

    fn write_attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace: Option<&str>,
        value: &str,
    ) -> Result<(), Error> {
        self.check_writable()?;
        self.raw.write_attribute(prefix, local_name, namespace, value)?;
        self.c14n.write_attribute(prefix, local_name, namespace, value)?;
        if self.depth == 1
            && namespace.is_none()
            && prefix.is_none()
            && DEFAULT_ID_ATTRS.contains(&local_name)
            && value == self.reference_id
        {
            self.root_has_reference_id = true;
        }
        Ok(())
    }

    fn write_namespace(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), Error> {
        self.check_writable()?;
        self.raw.write_namespace(prefix, uri)?;
        self.c14n.write_namespace(prefix, uri)
    }

    fn write_text(&mut self, text: &str) -> Result<(), Error> {
        self.check_writable()?;
        self.raw.write_text(text)?;
        self.c14n.write_text(text)
    }

    fn write_comment(&mut self, text: &str) -> Result<(), Error> {
        self.check_writable()?;
        self.raw.write_comment(text)?;
        self.c14n.write_comment(text)
    }

    fn end_element(&mut self) -> Result<(), Error> {
        self.close(false)
    }

    fn end_element_full(&mut self) -> Result<(), Error> {
        self.close(true)
    }

    fn flush(&mut self) -> Result<(), Error> {
        if self.state == WriterState::Finalized {
            return self.inner.flush();
        }
        Ok(())
    }
}
