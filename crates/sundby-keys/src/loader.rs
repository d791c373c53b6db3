#![forbid(unsafe_code)]

//! Key loading from PEM, DER, X.509 certificates and raw bytes.

use crate::key::{Key, KeyData, KeyUsage};
use sundby_core::Error;

fn pem_str(pem_data: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(pem_data).map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))
}

fn rsa_private(pk: rsa::RsaPrivateKey) -> Key {
    let public = pk.to_public_key();
    Key::new(
        KeyData::Rsa {
            private: Some(pk),
            public,
        },
        KeyUsage::Any,
    )
}

/// Load an RSA private key from PEM data (PKCS#8 or PKCS#1).
pub fn load_rsa_private_pem(pem_data: &[u8]) -> Result<Key, Error> {
    use pkcs1::DecodeRsaPrivateKey;
    use pkcs8::DecodePrivateKey;
    let pem = pem_str(pem_data)?;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_pem(pem) {
        return Ok(rsa_private(pk));
    }
    let pk = rsa::RsaPrivateKey::from_pkcs1_pem(pem)
        .map_err(|e| Error::Key(format!("failed to parse RSA private key PEM: {e}")))?;
    Ok(rsa_private(pk))
}

/// Load an RSA public key from PEM data (SPKI or PKCS#1).
pub fn load_rsa_public_pem(pem_data: &[u8]) -> Result<Key, Error> {
    use pkcs1::DecodeRsaPublicKey;
    use pkcs8::DecodePublicKey;
    let pem = pem_str(pem_data)?;

    let public = match rsa::RsaPublicKey::from_public_key_pem(pem) {
        Ok(pk) => pk,
        Err(_) => rsa::RsaPublicKey::from_pkcs1_pem(pem)
            .map_err(|e| Error::Key(format!("failed to parse RSA public key PEM: {e}")))?,
    };
    Ok(Key::new(
        KeyData::Rsa {
            private: None,
            public,
        },
        KeyUsage::Verify,
    ))
}

/// Load an EC P-256 private key from PKCS#8 PEM data.
pub fn load_ec_p256_private_pem(pem_data: &[u8]) -> Result<Key, Error> {
    use pkcs8::DecodePrivateKey;
    let sk = p256::ecdsa::SigningKey::from_pkcs8_pem(pem_str(pem_data)?)
        .map_err(|e| Error::Key(format!("failed to parse EC P-256 private key: {e}")))?;
    Ok(Key::new(
        KeyData::EcP256 {
            public: *sk.verifying_key(),
            private: Some(sk),
        },
        KeyUsage::Any,
    ))
}

/// Load an EC P-384 private key from PKCS#8 PEM data.
pub fn load_ec_p384_private_pem(pem_data: &[u8]) -> Result<Key, Error> {
    use pkcs8::DecodePrivateKey;
    let sk = p384::ecdsa::SigningKey::from_pkcs8_pem(pem_str(pem_data)?)
        .map_err(|e| Error::Key(format!("failed to parse EC P-384 private key: {e}")))?;
    Ok(Key::new(
        KeyData::EcP384 {
            public: *sk.verifying_key(),
            private: Some(sk),
        },
        KeyUsage::Any,
    ))
}

/// Load an HMAC key from raw binary data.
pub fn load_hmac_key(data: &[u8]) -> Result<Key, Error> {
    if data.is_empty() {
        return Err(Error::Key("empty HMAC key".into()));
    }
    Ok(Key::new(KeyData::Hmac(data.to_vec()), KeyUsage::Any))
}

/// Load an AES key from raw binary data.
pub fn load_aes_key(data: &[u8]) -> Result<Key, Error> {
    match data.len() {
        16 | 24 | 32 => Ok(Key::new(KeyData::Aes(data.to_vec()), KeyUsage::Any)),
        n => Err(Error::Key(format!(
            "invalid AES key size: {n} (expected 16, 24, or 32)"
        ))),
    }
}

/// Load a private key from PKCS#8 DER bytes. Tries RSA, then P-256, then P-384.
pub fn load_private_key_pkcs8_der(der: &[u8]) -> Result<Key, Error> {
    use pkcs8::DecodePrivateKey;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        return Ok(rsa_private(pk));
    }
    if let Ok(sk) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(Key::new(
            KeyData::EcP256 {
                public: *sk.verifying_key(),
                private: Some(sk),
            },
            KeyUsage::Any,
        ));
    }
    if let Ok(sk) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(Key::new(
            KeyData::EcP384 {
                public: *sk.verifying_key(),
                private: Some(sk),
            },
            KeyUsage::Any,
        ));
    }
    Err(Error::Key("unsupported PKCS#8 private key".into()))
}

/// Load a public key from raw SubjectPublicKeyInfo DER bytes.
pub fn load_spki_der(spki_der: &[u8]) -> Result<Key, Error> {
    use spki::DecodePublicKey;

    if let Ok(public) = rsa::RsaPublicKey::from_public_key_der(spki_der) {
        return Ok(Key::new(
            KeyData::Rsa {
                private: None,
                public,
            },
            KeyUsage::Verify,
        ));
    }
    if let Ok(public) = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
        return Ok(Key::new(
            KeyData::EcP256 {
                private: None,
                public,
            },
            KeyUsage::Verify,
        ));
    }
    if let Ok(public) = p384::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
        return Ok(Key::new(
            KeyData::EcP384 {
                private: None,
                public,
            },
            KeyUsage::Verify,
        ));
    }
    Err(Error::Key(
        "unsupported public key algorithm in SPKI DER".into(),
    ))
}

/// Load a public key from a PEM-encoded SubjectPublicKeyInfo (`-----BEGIN PUBLIC KEY-----`).
pub fn load_spki_pem(pem_data: &[u8]) -> Result<Key, Error> {
    let (label, der_bytes) = der::pem::decode_vec(pem_data)
        .map_err(|e| Error::Key(format!("failed to decode SPKI PEM: {e}")))?;
    if label != "PUBLIC KEY" {
        return Err(Error::Key(format!("expected PUBLIC KEY PEM label, got: {label}")));
    }
    load_spki_der(&der_bytes)
}

/// Load the public key of a DER-encoded X.509 certificate.
///
/// The certificate itself becomes the key's one-element chain.
pub fn load_x509_cert_der(data: &[u8]) -> Result<Key, Error> {
    use der::{Decode, Encode};
    use x509_cert::Certificate;

    let cert = Certificate::from_der(data)
        .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;

    let key = load_spki_der(&spki_der)
        .map_err(|_| Error::Certificate("unsupported public key algorithm in X.509 certificate".into()))?;
    Ok(key.with_x509_chain(vec![data.to_vec()]))
}

/// Load the public key of a PEM-encoded X.509 certificate.
pub fn load_x509_cert_pem(pem_data: &[u8]) -> Result<Key, Error> {
    let chain = load_x509_chain_pem(pem_data)?;
    let leaf = chain
        .first()
        .ok_or_else(|| Error::Certificate("no CERTIFICATE block in PEM data".into()))?;
    let key = load_x509_cert_der(leaf)?;
    Ok(key.with_x509_chain(chain))
}

/// Decode every `CERTIFICATE` block of a PEM bundle into DER, in file order.
pub fn load_x509_chain_pem(pem_data: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";

    let text = pem_str(pem_data)?;
    let mut chain = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(BEGIN) {
        let after = &rest[start..];
        let end = after
            .find(END)
            .ok_or_else(|| Error::Certificate("unterminated CERTIFICATE block".into()))?;
        let block = &after[..end + END.len()];
        let (_, der_bytes) = der::pem::decode_vec(block.as_bytes())
            .map_err(|e| Error::Certificate(format!("failed to decode certificate PEM: {e}")))?;
        chain.push(der_bytes);
        rest = &after[end + END.len()..];
    }
    Ok(chain)
}

/// Auto-detect key format and load from PEM data.
///
/// Tries RSA private, RSA public, SPKI, EC P-256, EC P-384 and finally an
/// X.509 certificate, in that order.
pub fn load_pem_auto(pem_data: &[u8]) -> Result<Key, Error> {
    let loaders: [fn(&[u8]) -> Result<Key, Error>; 6] = [
        load_rsa_private_pem,
        load_rsa_public_pem,
        load_spki_pem,
        load_ec_p256_private_pem,
        load_ec_p384_private_pem,
        load_x509_cert_pem,
    ];
    loaders
        .iter()
        .find_map(|load| load(pem_data).ok())
        .ok_or_else(|| Error::Key("unable to auto-detect key format from PEM data".into()))
}

/// Load a key from a file, auto-detecting format.
///
/// `.crt`/`.cer` files are read as certificates; anything else starting with
/// a PEM armor line goes through [`load_pem_auto`]; remaining bytes are tried
/// as PKCS#8, PKCS#1, SPKI and certificate DER.
pub fn load_key_file(path: &std::path::Path) -> Result<Key, Error> {
    use pkcs1::DecodeRsaPrivateKey;

    let data = std::fs::read(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let is_pem = data.starts_with(b"-----BEGIN");

    if ext.eq_ignore_ascii_case("crt") || ext.eq_ignore_ascii_case("cer") {
        return if is_pem {
            load_x509_cert_pem(&data)
        } else {
            load_x509_cert_der(&data)
        };
    }
    if is_pem {
        return load_pem_auto(&data);
    }

    if let Ok(key) = load_private_key_pkcs8_der(&data) {
        return Ok(key);
    }
    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs1_der(&data) {
        return Ok(rsa_private(pk));
    }
    if let Ok(key) = load_spki_der(&data) {
        return Ok(key);
    }
    if let Ok(key) = load_x509_cert_der(&data) {
        return Ok(key);
    }
    Err(Error::Key(format!(
        "unable to auto-detect key format from file: {}",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    #[test]
    fn test_load_rsa_pkcs8_and_pkcs1() {
        use pkcs1::EncodeRsaPrivateKey;
        let pk = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();

        let pem = pk.to_pkcs8_pem(LineEnding::LF).unwrap();
        let key = load_rsa_private_pem(pem.as_bytes()).unwrap();
        assert!(key.rsa_private_key().is_some());
        assert_eq!(key.data.size_bits(), 1024);

        let pem = pk.to_pkcs1_pem(LineEnding::LF).unwrap();
        let key = load_pem_auto(pem.as_bytes()).unwrap();
        assert!(key.rsa_private_key().is_some());
    }

    #[test]
    fn test_load_ec_keys() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let pem = sk.to_pkcs8_pem(LineEnding::LF).unwrap();
        let key = load_pem_auto(pem.as_bytes()).unwrap();
        assert!(matches!(key.data, KeyData::EcP256 { private: Some(_), .. }));

        let pub_pem = sk.verifying_key().to_public_key_pem(LineEnding::LF).unwrap();
        let key = load_spki_pem(pub_pem.as_bytes()).unwrap();
        assert!(matches!(key.data, KeyData::EcP256 { private: None, .. }));

        let sk = p384::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let der = sk.to_pkcs8_der().unwrap();
        let key = load_private_key_pkcs8_der(der.as_bytes()).unwrap();
        assert_eq!(key.data.size_bits(), 384);
    }

    #[test]
    fn test_symmetric_key_sizes() {
        assert!(load_aes_key(&[0u8; 16]).is_ok());
        assert!(load_aes_key(&[0u8; 17]).is_err());
        assert!(load_hmac_key(b"").is_err());
        assert_eq!(load_hmac_key(b"k").unwrap().data.size_bits(), 8);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(load_pem_auto(b"-----BEGIN NOTHING-----\n-----END NOTHING-----\n").is_err());
        assert!(load_x509_cert_der(b"\x30\x03\x02\x01\x00").is_err());
        assert!(load_x509_chain_pem(b"no armor here").unwrap().is_empty());
    }

    #[test]
    fn test_load_key_file_der() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let der = sk.to_pkcs8_der().unwrap();
        let path = std::env::temp_dir().join(format!("sundby-key-{}.der", std::process::id()));
        std::fs::write(&path, der.as_bytes()).unwrap();
        let key = load_key_file(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(key.unwrap().data, KeyData::EcP256 { .. }));
    }
}
