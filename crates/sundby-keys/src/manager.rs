#![forbid(unsafe_code)]

//! Key manager with named key store.

use crate::key::{Key, KeyData, KeyUsage};
use sundby_core::Error;

/// Manages a collection of keys for lookup during signature verification.
#[derive(Debug, Clone, Default)]
pub struct KeysManager {
    keys: Vec<Key>,
}

impl KeysManager {
    /// Create an empty keys manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key to the manager.
    pub fn add_key(&mut self, key: Key) {
        self.keys.push(key);
    }

    /// Insert a key at the front of the manager (takes priority for first_key).
    pub fn insert_key_first(&mut self, key: Key) {
        self.keys.insert(0, key);
    }

    /// Find a key by name.
    pub fn find_by_name(&self, name: &str) -> Option<&Key> {
        self.keys.iter().find(|k| k.name.as_deref() == Some(name))
    }

    /// Find the first key matching the given usage.
    pub fn find_by_usage(&self, usage: KeyUsage) -> Option<&Key> {
        self.keys
            .iter()
            .find(|k| k.usage == usage || k.usage == KeyUsage::Any)
    }

    /// Find the first HMAC key.
    pub fn find_hmac(&self) -> Option<&Key> {
        self.keys.iter().find(|k| matches!(k.data, KeyData::Hmac(_)))
    }

    /// Find an AES key with the specified byte length.
    pub fn find_aes_by_size(&self, size_bytes: usize) -> Option<&Key> {
        self.keys
            .iter()
            .find(|k| matches!(&k.data, KeyData::Aes(bytes) if bytes.len() == size_bytes))
    }

    /// Iterator over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    /// Get the first key available (for simple single-key scenarios).
    pub fn first_key(&self) -> Result<&Key, Error> {
        self.keys
            .first()
            .ok_or_else(|| Error::KeyNotFound("no keys in manager".into()))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let mut mgr = KeysManager::new();
        assert!(mgr.first_key().is_err());
        mgr.add_key(Key::new(KeyData::Aes(vec![1; 32]), KeyUsage::Any).with_name("kek"));
        mgr.insert_key_first(Key::new(KeyData::Hmac(vec![2; 20]), KeyUsage::Sign));

        assert_eq!(mgr.len(), 2);
        assert!(matches!(mgr.first_key().unwrap().data, KeyData::Hmac(_)));
        assert!(mgr.find_by_name("kek").is_some());
        assert!(mgr.find_aes_by_size(32).is_some());
        assert!(mgr.find_aes_by_size(16).is_none());
        assert!(mgr.find_by_usage(KeyUsage::Verify).is_some_and(|k| k.usage == KeyUsage::Any));
        assert!(mgr.find_hmac().is_some());
    }
}
