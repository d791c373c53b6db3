#![forbid(unsafe_code)]

//! The HTTP-POST binding.

use crate::form;
use crate::message::ProtocolMessage;
use crate::request::BindingRequest;
use crate::result::UnbindResult;
use base64::Engine;
use http::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use http::Method;
use sundby_core::{ns, Error};
use sundby_xml::XmlDocument;

/// A message bound to the POST transport.
#[derive(Debug, Clone)]
pub struct BoundMessage {
    /// The auto-submitting HTML document.
    pub html: String,
    /// Base64 of the XML, as carried in the form field.
    pub payload: String,
    /// The XML as serialized (and signed, if a credential was given).
    pub xml: String,
    /// Headers the host should send with `html`.
    pub headers: HeaderMap,
}

/// Binds messages into auto-submitting HTML forms and decodes them back
/// from posted form fields. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostBinding;

impl PostBinding {
    pub fn new() -> Self {
        Self
    }

    /// Whether `request` carries a message this binding can decode.
    pub fn can_unbind(&self, request: &BindingRequest) -> bool {
        request.method() == Method::POST
            && (request.has_field(ns::form::SAML_RESPONSE) || request.has_field(ns::form::SAML_REQUEST))
    }

    /// Decode the message carried by `request`.
    ///
    /// `SAMLResponse` wins over `SAMLRequest`. The result is unverified and
    /// its trust level is [`TrustLevel::None`](crate::TrustLevel::None).
    pub fn unbind(&self, request: &BindingRequest) -> Result<UnbindResult, Error> {
        if request.method() != Method::POST {
            return Err(Error::Decode(format!(
                "POST binding cannot decode a {} request",
                request.method()
            )));
        }
        let (field, encoded) = [ns::form::SAML_RESPONSE, ns::form::SAML_REQUEST]
            .into_iter()
            .find_map(|name| request.field(name).map(|value| (name, value)))
            .ok_or_else(|| Error::Decode("no SAMLResponse or SAMLRequest form field".into()))?;

        let clean: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(clean)
            .map_err(|e| Error::Decode(format!("{field} is not valid base64: {e}")))?;
        let xml = String::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("{field} is not UTF-8: {e}")))?;
        tracing::trace!(field, xml = %xml, "inbound message");

        let document = XmlDocument::parse(xml)
            .map_err(|e| Error::Decode(format!("{field} is not well-formed XML: {e}")))?;
        let relay_state = request.field(ns::form::RELAY_STATE).map(str::to_owned);
        tracing::debug!(
            field,
            root = document.root_name(),
            relay_state = relay_state.is_some(),
            "unbound POST message"
        );
        Ok(UnbindResult::new(document, field, relay_state))
    }

    /// Serialize `message`, signing it if it carries a credential, and wrap
    /// it in an auto-submitting form.
    pub fn bind(&self, message: &ProtocolMessage) -> Result<BoundMessage, Error> {
        let xml = message.serialize()?;
        tracing::trace!(xml = %xml, "outbound message");
        let payload = base64::engine::general_purpose::STANDARD.encode(xml.as_bytes());
        let field = message.role().field_name();
        let html = form::render(message.destination(), field, &payload, message.relay_state());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        tracing::debug!(
            field,
            destination = message.destination(),
            signed = message.is_signed(),
            "bound POST message"
        );
        Ok(BoundMessage {
            html,
            payload,
            xml,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageRole, XmlContent};
    use crate::result::TrustLevel;
    use std::sync::Arc;
    use sundby_core::algorithm;
    use sundby_dsig::DsigContext;
    use sundby_keys::{AsymmetricKey, Key, KeyData, KeyUsage, KeysManager, SigningCredential};

    const RESPONSE: &str = concat!(
        r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
        r#"xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_resp1" Version="2.0">"#,
        "<saml:Issuer>https://idp.example.org</saml:Issuer>",
        r#"<samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>"#,
        "</samlp:Response>"
    );

    fn b64(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s)
    }

    fn p256_key() -> Key {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let public = *sk.verifying_key();
        Key::new(
            KeyData::EcP256 {
                private: Some(sk),
                public,
            },
            KeyUsage::Any,
        )
    }

    #[test]
    fn test_can_unbind() {
        let binding = PostBinding::new();
        assert!(binding.can_unbind(&BindingRequest::post([("SAMLResponse", "x")])));
        assert!(binding.can_unbind(&BindingRequest::post([("SAMLRequest", "x")])));
        assert!(!binding.can_unbind(&BindingRequest::post([("RelayState", "x")])));
        assert!(!binding.can_unbind(&BindingRequest::new(
            Method::GET,
            [("SAMLResponse", "x")]
        )));
    }

    #[test]
    fn test_unbind_without_relay_state() {
        let req = BindingRequest::post([("SAMLResponse", b64(RESPONSE))]);
        let result = PostBinding::new().unbind(&req).unwrap();
        assert_eq!(result.root_name(), "Response");
        assert_eq!(result.root_namespace(), Some(ns::SAMLP));
        assert_eq!(result.relay_state(), None);
        assert_eq!(result.trust_level(), TrustLevel::None);
    }

    #[test]
    fn test_response_preferred_over_request() {
        let req = BindingRequest::post([
            ("SAMLRequest", b64("<samlp:AuthnRequest xmlns:samlp=\"urn:x\"/>")),
            ("SAMLResponse", b64(RESPONSE)),
            ("RelayState", "state-1".to_owned()),
        ]);
        let result = PostBinding::new().unbind(&req).unwrap();
        assert_eq!(result.message_field(), "SAMLResponse");
        assert_eq!(result.root_name(), "Response");
        assert_eq!(result.relay_state(), Some("state-1"));
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let encoded = b64(RESPONSE);
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(64)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();
        let req = BindingRequest::post([("SAMLResponse", wrapped.join("\r\n"))]);
        assert_eq!(PostBinding::new().unbind(&req).unwrap().xml(), RESPONSE);
    }

    #[test]
    fn test_decode_errors() {
        let binding = PostBinding::new();
        let cases = [
            BindingRequest::new(Method::GET, [("SAMLResponse", b64(RESPONSE))]),
            BindingRequest::post([("RelayState", "x".to_owned())]),
            BindingRequest::post([("SAMLResponse", "not base64!".to_owned())]),
            BindingRequest::post([(
                "SAMLResponse",
                base64::engine::general_purpose::STANDARD.encode([0xff, 0xfe, 0x3c]),
            )]),
            BindingRequest::post([("SAMLResponse", b64("<unclosed>"))]),
            BindingRequest::post([(
                "SAMLResponse",
                b64("<!DOCTYPE a [<!ENTITY e \"x\">]><a>&e;</a>"),
            )]),
        ];
        for req in &cases {
            let err = binding.unbind(req).unwrap_err();
            assert!(err.is_decode(), "{err:?}");
        }
    }

    #[test]
    fn test_bind_headers_and_form() {
        let msg = ProtocolMessage::new(MessageRole::Response, "https://sp.example.org/acs", RESPONSE)
            .unwrap()
            .with_relay_state("rs");
        let bound = PostBinding::new().bind(&msg).unwrap();
        assert_eq!(bound.headers[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(bound.headers[CACHE_CONTROL], "no-cache, no-store");
        assert_eq!(bound.headers[PRAGMA], "no-cache");
        assert!(bound.html.contains(&format!(
            r#"<input type="hidden" name="SAMLResponse" value="{}"/>"#,
            bound.payload
        )));
        assert!(bound.html.contains(r#"action="https://sp.example.org/acs""#));
        assert!(!bound.xml.contains("Signature"));
    }

    #[test]
    fn test_round_trip_unsigned() {
        let msg = ProtocolMessage::new(MessageRole::Response, "https://sp/acs", RESPONSE)
            .unwrap()
            .with_relay_state("opaque&state");
        let binding = PostBinding::new();
        let bound = binding.bind(&msg).unwrap();
        let req = BindingRequest::post([
            ("SAMLResponse", bound.payload.clone()),
            ("RelayState", "opaque&state".to_owned()),
        ]);
        let result = binding.unbind(&req).unwrap();
        assert_eq!(result.root_name(), "Response");
        assert_eq!(result.relay_state(), Some("opaque&state"));
        assert_eq!(result.xml(), bound.xml);
        assert!(bound.xml.ends_with(RESPONSE));
    }

    #[test]
    fn test_signed_round_trip_upgrades_only_after_verification() {
        let key = p256_key();
        let credential = SigningCredential::new(
            Arc::new(AsymmetricKey::new(key.clone()).unwrap()),
            algorithm::ECDSA_SHA256,
        );
        let content = XmlContent::writer(|w| {
            w.start_element(Some("samlp"), "Response", Some(ns::SAMLP))?;
            w.write_attribute(None, "ID", None, "_signed")?;
            w.start_element(Some("saml"), "Issuer", Some(ns::SAML))?;
            w.write_text("https://idp.example.org")?;
            w.end_element()?;
            w.mark_signature_position()?;
            w.start_element(Some("samlp"), "Status", Some(ns::SAMLP))?;
            w.end_element()?;
            w.end_element()
        });
        let msg = ProtocolMessage::new(MessageRole::Response, "https://sp/acs", content)
            .unwrap()
            .with_signing(credential, "_signed")
            .unwrap();
        let binding = PostBinding::new();
        let bound = binding.bind(&msg).unwrap();
        assert_eq!(bound.xml.matches("<ds:Signature ").count(), 1);
        assert!(bound.xml.contains(r##"URI="#_signed""##));
        assert!(bound.xml.contains("</saml:Issuer><ds:Signature"));

        let req = BindingRequest::post([("SAMLResponse", bound.payload)]);
        let mut result = binding.unbind(&req).unwrap();
        assert_eq!(result.trust_level(), TrustLevel::None);

        let mut manager = KeysManager::new();
        manager.add_key(key);
        let verified = result.verify_signature(&DsigContext::new(manager)).unwrap();
        assert_eq!(verified.signed_id(), Some("_signed"));
        assert_eq!(result.trust_level(), TrustLevel::SignatureVerified);
    }

    const MULTILINE: &str = concat!(
        "<samlp:Response xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\" ",
        "ID=\"_lines\" Note=\"first\nsecond\tthird\" Kept=\"a&#xA;b\">",
        "line one\r\nline two\rline three\ttabbed&#xD;",
        "</samlp:Response>"
    );

    /// Attribute values and text as an XML parser reports them.
    fn parsed_content(xml: &str) -> (String, String, String) {
        let doc = sundby_xml::XmlDocument::parse(xml.to_owned()).unwrap();
        let parsed = doc.parse_doc().unwrap();
        let root = parsed.root_element();
        (
            root.attribute("Note").unwrap().to_owned(),
            root.attribute("Kept").unwrap().to_owned(),
            root.text().unwrap().to_owned(),
        )
    }

    #[test]
    fn test_round_trip_unsigned_line_breaks() {
        let msg = ProtocolMessage::new(MessageRole::Response, "https://sp/acs", MULTILINE).unwrap();
        let binding = PostBinding::new();
        let bound = binding.bind(&msg).unwrap();
        assert!(!bound.xml.contains('\r'));

        let req = BindingRequest::post([("SAMLResponse", bound.payload)]);
        let result = binding.unbind(&req).unwrap();
        let (note, kept, text) = parsed_content(result.xml());
        assert_eq!(note, "first second third");
        assert_eq!(kept, "a\nb");
        assert_eq!(text, "line one\nline two\nline three\ttabbed\r");
        assert_eq!(parsed_content(result.xml()), parsed_content(MULTILINE));
    }

    #[test]
    fn test_round_trip_signed_line_breaks() {
        let key = Key::new(KeyData::Hmac(b"shared-secret-0123456789".to_vec()), KeyUsage::Any)
            .with_name("sp");
        let credential = SigningCredential::new(
            Arc::new(sundby_keys::SymmetricKey::new(key.clone()).unwrap()),
            algorithm::HMAC_SHA256,
        );
        let msg = ProtocolMessage::new(MessageRole::Response, "https://sp/acs", MULTILINE)
            .unwrap()
            .with_signing(credential, "_lines")
            .unwrap();
        let binding = PostBinding::new();
        let bound = binding.bind(&msg).unwrap();
        assert_eq!(bound.xml.matches("<ds:Signature ").count(), 1);

        let req = BindingRequest::post([("SAMLResponse", bound.payload)]);
        let mut result = binding.unbind(&req).unwrap();
        assert_eq!(parsed_content(result.xml()), parsed_content(MULTILINE));

        let mut manager = KeysManager::new();
        manager.add_key(key);
        let verified = result.verify_signature(&DsigContext::new(manager)).unwrap();
        assert_eq!(verified.signed_id(), Some("_lines"));
        assert_eq!(result.trust_level(), TrustLevel::SignatureVerified);
    }

    #[test]
    fn test_signature_algorithm_override() {
        let key = Key::new(KeyData::Hmac(b"shared-secret-0123456789".to_vec()), KeyUsage::Any);
        let credential = SigningCredential::new(
            Arc::new(sundby_keys::SymmetricKey::new(key).unwrap()),
            algorithm::HMAC_SHA256,
        );
        let msg = ProtocolMessage::new(MessageRole::Response, "https://sp/acs", RESPONSE)
            .unwrap()
            .with_signing(credential, "_resp1")
            .unwrap()
            .with_signature_algorithm(algorithm::HMAC_SHA512);
        assert_eq!(msg.signature_algorithm(), Some(algorithm::HMAC_SHA512));
        let bound = PostBinding::new().bind(&msg).unwrap();
        assert!(bound.xml.contains(algorithm::HMAC_SHA512));
    }

    #[test]
    fn test_signing_with_wrong_reference_fails() {
        let credential = SigningCredential::new(
            Arc::new(AsymmetricKey::new(p256_key()).unwrap()),
            algorithm::ECDSA_SHA256,
        );
        let msg = ProtocolMessage::new(MessageRole::Response, "https://sp/acs", RESPONSE)
            .unwrap()
            .with_signing(credential, "_other")
            .unwrap();
        assert!(PostBinding::new().bind(&msg).unwrap_err().is_signing());
    }
}
