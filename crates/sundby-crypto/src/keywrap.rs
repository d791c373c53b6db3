#![forbid(unsafe_code)]

//! AES key wrap (RFC 3394).

use aes_kw::Kek;
use sundby_core::{algorithm, Error};

/// Trait for key wrap algorithms.
pub trait KeyWrapAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn wrap(&self, kek: &[u8], key_data: &[u8]) -> Result<Vec<u8>, Error>;
    fn unwrap(&self, kek: &[u8], wrapped: &[u8]) -> Result<Vec<u8>, Error>;
    /// Required key-encryption-key length in bytes.
    fn kek_size(&self) -> usize;
}

/// Create a key wrap algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn KeyWrapAlgorithm>, Error> {
    let (kek_size, uri) = match uri {
        algorithm::KW_AES128 => (16, algorithm::KW_AES128),
        algorithm::KW_AES192 => (24, algorithm::KW_AES192),
        algorithm::KW_AES256 => (32, algorithm::KW_AES256),
        _ => return Err(Error::UnsupportedAlgorithm(format!("key wrap: {uri}"))),
    };
    Ok(Box::new(AesKeyWrap { kek_size, uri }))
}

struct AesKeyWrap {
    kek_size: usize,
    uri: &'static str,
}

impl AesKeyWrap {
    fn check_kek(&self, kek: &[u8]) -> Result<(), Error> {
        if kek.len() != self.kek_size {
            return Err(Error::Crypto(format!(
                "expected {} byte KEK, got {}",
                self.kek_size,
                kek.len()
            )));
        }
        Ok(())
    }
}

impl KeyWrapAlgorithm for AesKeyWrap {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn kek_size(&self) -> usize {
        self.kek_size
    }

    fn wrap(&self, kek_bytes: &[u8], key_data: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_kek(kek_bytes)?;
        if key_data.len() < 16 || key_data.len() % 8 != 0 {
            return Err(Error::Crypto(format!(
                "AES-KW input must be a multiple of 8 bytes and at least 16, got {}",
                key_data.len()
            )));
        }
        let mut out = vec![0u8; key_data.len() + 8];
        macro_rules! do_wrap {
            ($aes:ty) => {{
                let kek = Kek::<$aes>::new(kek_bytes.into());
                kek.wrap(key_data, &mut out)
                    .map_err(|e| Error::Crypto(format!("AES-KW wrap: {e}")))?;
            }};
        }
        match self.kek_size {
            16 => do_wrap!(aes::Aes128),
            24 => do_wrap!(aes::Aes192),
            _ => do_wrap!(aes::Aes256),
        }
        Ok(out)
    }

    fn unwrap(&self, kek_bytes: &[u8], wrapped: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_kek(kek_bytes)?;
        if wrapped.len() < 24 || wrapped.len() % 8 != 0 {
            return Err(Error::Crypto("wrapped key has invalid length".into()));
        }
        let mut out = vec![0u8; wrapped.len() - 8];
        macro_rules! do_unwrap {
            ($aes:ty) => {{
                let kek = Kek::<$aes>::new(kek_bytes.into());
                kek.unwrap(wrapped, &mut out)
                    .map_err(|e| Error::Crypto(format!("AES-KW unwrap: {e}")))?;
            }};
        }
        match self.kek_size {
            16 => do_unwrap!(aes::Aes128),
            24 => do_unwrap!(aes::Aes192),
            _ => do_unwrap!(aes::Aes256),
        }
        Ok(out)
    }
}
