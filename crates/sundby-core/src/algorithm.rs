#![forbid(unsafe_code)]

//! Algorithm URI constants.
//!
//! Each constant is the canonical URI string that appears in `Algorithm`
//! attributes of XML-DSig and XML-Enc documents.

// ── Canonicalization ─────────────────────────────────────────────────

pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

// ── Digest algorithms ────────────────────────────────────────────────

pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const SHA224: &str = "http://www.w3.org/2001/04/xmldsig-more#sha224";
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

// ── RSA signature algorithms ─────────────────────────────────────────

pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const RSA_SHA224: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha224";
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

// ── ECDSA signature algorithms ───────────────────────────────────────

pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";

// ── HMAC signature algorithms ────────────────────────────────────────

pub const HMAC_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#hmac-sha1";
pub const HMAC_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#hmac-sha256";
pub const HMAC_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#hmac-sha384";
pub const HMAC_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#hmac-sha512";

// ── Key wrap algorithms ──────────────────────────────────────────────

pub const KW_AES128: &str = "http://www.w3.org/2001/04/xmlenc#kw-aes128";
pub const KW_AES192: &str = "http://www.w3.org/2001/04/xmlenc#kw-aes192";
pub const KW_AES256: &str = "http://www.w3.org/2001/04/xmlenc#kw-aes256";

// ── Key transport algorithms ─────────────────────────────────────────

pub const RSA_PKCS1: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";
pub const RSA_OAEP: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";

// ── Transform algorithms ─────────────────────────────────────────────

pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Digest URIs in the order `is_supported_algorithm` reports them.
pub const DIGESTS: &[&str] = &[SHA1, SHA224, SHA256, SHA384, SHA512];

/// Signature URIs backed by an asymmetric key.
pub const ASYMMETRIC_SIGNATURES: &[&str] = &[
    RSA_SHA1,
    RSA_SHA224,
    RSA_SHA256,
    RSA_SHA384,
    RSA_SHA512,
    ECDSA_SHA256,
    ECDSA_SHA384,
];

/// Signature URIs backed by a shared secret.
pub const SYMMETRIC_SIGNATURES: &[&str] = &[HMAC_SHA1, HMAC_SHA256, HMAC_SHA384, HMAC_SHA512];

/// Key wrap URIs (symmetric key encryption keys).
pub const KEY_WRAPS: &[&str] = &[KW_AES128, KW_AES192, KW_AES256];

/// Key transport URIs (asymmetric key encryption keys).
pub const KEY_TRANSPORTS: &[&str] = &[RSA_PKCS1, RSA_OAEP];

/// The digest algorithm conventionally paired with a signature algorithm.
pub fn digest_for_signature(signature_uri: &str) -> Option<&'static str> {
    match signature_uri {
        RSA_SHA1 | HMAC_SHA1 => Some(SHA1),
        RSA_SHA224 => Some(SHA224),
        RSA_SHA256 | ECDSA_SHA256 | HMAC_SHA256 => Some(SHA256),
        RSA_SHA384 | ECDSA_SHA384 | HMAC_SHA384 => Some(SHA384),
        RSA_SHA512 | HMAC_SHA512 => Some(SHA512),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_for_signature() {
        assert_eq!(digest_for_signature(RSA_SHA256), Some(SHA256));
        assert_eq!(digest_for_signature(ECDSA_SHA384), Some(SHA384));
        assert_eq!(digest_for_signature(HMAC_SHA1), Some(SHA1));
        assert_eq!(digest_for_signature("urn:unknown"), None);
    }
}
