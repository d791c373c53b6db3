#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA PKCS#1 v1.5, ECDSA, HMAC).

use signature::SignatureEncoding;
use sundby_core::{algorithm, Error};

/// Key material for signature operations.
#[derive(Clone)]
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP256Public(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::SigningKey),
    EcP384Public(p384::ecdsa::VerifyingKey),
    Hmac(Vec<u8>),
}

impl SigningKey {
    /// Whether this material can produce signatures (not just verify them).
    pub fn can_sign(&self) -> bool {
        matches!(
            self,
            SigningKey::Rsa(_) | SigningKey::EcP256(_) | SigningKey::EcP384(_) | SigningKey::Hmac(_)
        )
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            SigningKey::Rsa(_) => "Rsa",
            SigningKey::RsaPublic(_) => "RsaPublic",
            SigningKey::EcP256(_) => "EcP256",
            SigningKey::EcP256Public(_) => "EcP256Public",
            SigningKey::EcP384(_) => "EcP384",
            SigningKey::EcP384Public(_) => "EcP384Public",
            SigningKey::Hmac(_) => "Hmac",
        };
        f.debug_tuple("SigningKey").field(&kind).finish()
    }
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &SigningKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA1, hash: HashType::Sha1 })),
        algorithm::RSA_SHA224 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA224, hash: HashType::Sha224 })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA384 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::ECDSA_SHA256 => Ok(Box::new(EcdsaP256)),
        algorithm::ECDSA_SHA384 => Ok(Box::new(EcdsaP384)),

        algorithm::HMAC_SHA1 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA1, hash: HashType::Sha1 })),
        algorithm::HMAC_SHA256 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA256, hash: HashType::Sha256 })),
        algorithm::HMAC_SHA384 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA384, hash: HashType::Sha384 })),
        algorithm::HMAC_SHA512 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA512, hash: HashType::Sha512 })),

        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 {
    uri: &'static str,
    hash: HashType,
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SigningKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required".into()));
        };
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                let sig = sk
                    .try_sign(data)
                    .map_err(|e| Error::Crypto(format!("RSA sign: {e}")))?;
                Ok(sig.to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha224 => do_sign!(sha2::Sha224),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let public_key = match key {
            SigningKey::Rsa(pk) => pk.to_public_key(),
            SigningKey::RsaPublic(pk) => pk.clone(),
            _ => return Err(Error::Key("RSA key required".into())),
        };
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key);
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha224 => do_verify!(sha2::Sha224),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── ECDSA ────────────────────────────────────────────────────────────
//
// XML-DSig carries ECDSA signatures as the raw r||s concatenation, not DER.

struct EcdsaP256;

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-256.
pub fn xmldsig_to_p256(rs: &[u8]) -> Result<p256::ecdsa::Signature, Error> {
    p256::ecdsa::Signature::from_slice(rs)
        .map_err(|e| Error::Crypto(format!("invalid P-256 signature ({} bytes): {e}", rs.len())))
}

impl SignatureAlgorithm for EcdsaP256 {
    fn uri(&self) -> &'static str {
        algorithm::ECDSA_SHA256
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SigningKey::EcP256(sk) = key else {
            return Err(Error::Key("P-256 signing key required".into()));
        };
        let sig: p256::ecdsa::Signature = sk
            .try_sign(data)
            .map_err(|e| Error::Crypto(format!("ECDSA sign: {e}")))?;
        Ok(sig.to_bytes().to_vec())
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let vk = match key {
            SigningKey::EcP256(sk) => *sk.verifying_key(),
            SigningKey::EcP256Public(vk) => *vk,
            _ => return Err(Error::Key("P-256 key required".into())),
        };
        let sig = xmldsig_to_p256(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

struct EcdsaP384;

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-384.
pub fn xmldsig_to_p384(rs: &[u8]) -> Result<p384::ecdsa::Signature, Error> {
    p384::ecdsa::Signature::from_slice(rs)
        .map_err(|e| Error::Crypto(format!("invalid P-384 signature ({} bytes): {e}", rs.len())))
}

impl SignatureAlgorithm for EcdsaP384 {
    fn uri(&self) -> &'static str {
        algorithm::ECDSA_SHA384
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SigningKey::EcP384(sk) = key else {
            return Err(Error::Key("P-384 signing key required".into()));
        };
        let sig: p384::ecdsa::Signature = sk
            .try_sign(data)
            .map_err(|e| Error::Crypto(format!("ECDSA sign: {e}")))?;
        Ok(sig.to_bytes().to_vec())
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let vk = match key {
            SigningKey::EcP384(sk) => *sk.verifying_key(),
            SigningKey::EcP384Public(vk) => *vk,
            _ => return Err(Error::Key("P-384 key required".into())),
        };
        let sig = xmldsig_to_p384(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

// ── HMAC ─────────────────────────────────────────────────────────────

struct HmacSign {
    uri: &'static str,
    hash: HashType,
}

impl SignatureAlgorithm for HmacSign {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        let SigningKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        compute_hmac(self.hash, key_bytes, data)
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let SigningKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        let expected = compute_hmac(self.hash, key_bytes, data)?;
        Ok(constant_time_eq(&expected, sig_bytes))
    }
}

fn compute_hmac(hash: HashType, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    use hmac::{Hmac, Mac};
    if key.is_empty() {
        return Err(Error::Key("empty HMAC key".into()));
    }
    macro_rules! hmac_compute {
        ($hasher:ty) => {{
            let mut mac = <Hmac<$hasher>>::new_from_slice(key)
                .map_err(|e| Error::Key(format!("HMAC key: {e}")))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }
    match hash {
        HashType::Sha1 => hmac_compute!(sha1::Sha1),
        HashType::Sha224 => hmac_compute!(sha2::Sha224),
        HashType::Sha256 => hmac_compute!(sha2::Sha256),
        HashType::Sha384 => hmac_compute!(sha2::Sha384),
        HashType::Sha512 => hmac_compute!(sha2::Sha512),
    }
}

/// Full-length comparison only; truncated HMAC outputs are rejected.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecdsa_p256_roundtrip() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let key = SigningKey::EcP256(sk.clone());
        let alg = from_uri(algorithm::ECDSA_SHA256).unwrap();
        let sig = alg.sign(&key, b"payload").unwrap();
        assert_eq!(sig.len(), 64);
        let public = SigningKey::EcP256Public(*sk.verifying_key());
        assert!(alg.verify(&public, b"payload", &sig).unwrap());
        assert!(!alg.verify(&public, b"tampered", &sig).unwrap());
        assert!(!public.can_sign());
    }

    #[test]
    fn test_hmac_sign_verify() {
        let key = SigningKey::Hmac(b"secret-key-material".to_vec());
        let alg = from_uri(algorithm::HMAC_SHA256).unwrap();
        let mac = alg.sign(&key, b"data").unwrap();
        assert_eq!(mac.len(), 32);
        assert!(alg.verify(&key, b"data", &mac).unwrap());
        assert!(!alg.verify(&key, b"data", &mac[..16]).unwrap());
    }

    #[test]
    fn test_wrong_key_type() {
        let key = SigningKey::Hmac(b"k".to_vec());
        let alg = from_uri(algorithm::RSA_SHA256).unwrap();
        assert!(matches!(alg.sign(&key, b"x"), Err(Error::Key(_))));
    }

    #[test]
    fn test_unsupported_signature_uri() {
        assert!(matches!(
            from_uri("http://www.w3.org/2007/05/xmldsig-more#rsa-pss"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_rsa_sha256_roundtrip() {
        let sk = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let key = SigningKey::Rsa(sk);
        let alg = from_uri(algorithm::RSA_SHA256).unwrap();
        let sig = alg.sign(&key, b"signed info").unwrap();
        assert_eq!(sig.len(), 128);
        assert!(alg.verify(&key, b"signed info", &sig).unwrap());
    }
}
