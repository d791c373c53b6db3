#![forbid(unsafe_code)]

//! RSA key transport (RSA PKCS#1 v1.5 and RSA-OAEP with MGF1/SHA-1).

use sundby_core::{algorithm, Error};

/// Trait for key transport algorithms.
pub trait KeyTransportAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn encrypt(&self, public_key: &rsa::RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>, Error>;
    fn decrypt(&self, private_key: &rsa::RsaPrivateKey, encrypted: &[u8])
        -> Result<Vec<u8>, Error>;
}

/// Create a key transport algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn KeyTransportAlgorithm>, Error> {
    match uri {
        algorithm::RSA_PKCS1 => Ok(Box::new(RsaPkcs1Transport)),
        algorithm::RSA_OAEP => Ok(Box::new(RsaOaepTransport)),
        _ => Err(Error::UnsupportedAlgorithm(format!("key transport: {uri}"))),
    }
}

struct RsaPkcs1Transport;

impl KeyTransportAlgorithm for RsaPkcs1Transport {
    fn uri(&self) -> &'static str {
        algorithm::RSA_PKCS1
    }

    fn encrypt(&self, public_key: &rsa::RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>, Error> {
        use rsa::Pkcs1v15Encrypt;
        let mut rng = rand::thread_rng();
        public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, key_data)
            .map_err(|e| Error::Crypto(format!("RSA PKCS#1 encrypt: {e}")))
    }

    fn decrypt(
        &self,
        private_key: &rsa::RsaPrivateKey,
        encrypted: &[u8],
    ) -> Result<Vec<u8>, Error> {
        use rsa::Pkcs1v15Encrypt;
        private_key
            .decrypt(Pkcs1v15Encrypt, encrypted)
            .map_err(|e| Error::Crypto(format!("RSA PKCS#1 decrypt: {e}")))
    }
}

/// `rsa-oaep-mgf1p`: SHA-1 for both the label hash and MGF1, empty label.
struct RsaOaepTransport;

impl KeyTransportAlgorithm for RsaOaepTransport {
    fn uri(&self) -> &'static str {
        algorithm::RSA_OAEP
    }

    fn encrypt(&self, public_key: &rsa::RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut rng = rand::thread_rng();
        let padding = rsa::Oaep::new::<sha1::Sha1>();
        public_key
            .encrypt(&mut rng, padding, key_data)
            .map_err(|e| Error::Crypto(format!("RSA-OAEP encrypt: {e}")))
    }

    fn decrypt(
        &self,
        private_key: &rsa::RsaPrivateKey,
        encrypted: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let padding = rsa::Oaep::new::<sha1::Sha1>();
        private_key
            .decrypt(padding, encrypted)
            .map_err(|e| Error::Crypto(format!("RSA-OAEP decrypt: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_roundtrip() {
        let sk = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let pk = sk.to_public_key();
        for uri in algorithm::KEY_TRANSPORTS {
            let alg = from_uri(uri).unwrap();
            let enc = alg.encrypt(&pk, &[0x42; 16]).unwrap();
            assert_eq!(enc.len(), 128);
            assert_eq!(alg.decrypt(&sk, &enc).unwrap(), vec![0x42; 16]);
        }
    }

    #[test]
    fn test_unknown_transport() {
        assert!(from_uri(algorithm::KW_AES128).is_err());
    }
}
