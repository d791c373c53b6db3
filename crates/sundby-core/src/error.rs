#![forbid(unsafe_code)]

/// Errors produced by sundby.
///
/// The first four variants carry the envelope-level taxonomy (construction,
/// decode, signing, protocol shape). The rest describe lower-level failures
/// and are usually wrapped into one of those by the caller that knows the
/// context.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid construction argument: {0}")]
    Construction(String),

    #[error("binding decode error: {0}")]
    Decode(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("protocol misuse: {0}")]
    Protocol(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("XML write error: {0}")]
    XmlWrite(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this is an inbound decode failure (bad base64, bad XML,
    /// absent form field).
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    /// Whether this failure came from producing a signature.
    pub fn is_signing(&self) -> bool {
        matches!(self, Error::Signing(_))
    }

    /// Whether this is a caller programming error (writer misuse).
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Re-classify an algorithm/key failure as a signing failure, keeping
    /// the message. Other variants are returned unchanged.
    pub fn into_signing(self) -> Self {
        match self {
            Error::UnsupportedAlgorithm(m) | Error::Crypto(m) | Error::Key(m) => {
                Error::Signing(m)
            }
            Error::KeyNotFound(m) => Error::Signing(format!("key not found: {m}")),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_signing_reclassifies_crypto_failures() {
        let err = Error::UnsupportedAlgorithm("digest algorithm: urn:x".into()).into_signing();
        assert!(err.is_signing());
        assert_eq!(err.to_string(), "signing failed: digest algorithm: urn:x");

        let err = Error::Decode("bad".into()).into_signing();
        assert!(err.is_decode());
    }
}
