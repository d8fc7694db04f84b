//! Insertion ordered, bounded cache of processed images.

use indexmap::IndexMap;
use log::debug;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the key material.
pub fn cache_key(material: &str) -> String {
    hex::encode(Sha256::digest(material.as_bytes()))
}

/// Evicts the oldest insertion once `capacity` entries are held.
/// Lookups do not refresh an entry's position.
#[derive(Debug)]
pub struct FifoCache<V> {
    capacity: usize,
    entries: IndexMap<String, V>,
}

impl<V: Clone> FifoCache<V> {
    pub fn new(capacity: usize) -> Self {
        FifoCache { capacity: capacity.max(1), entries: IndexMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: String, value: V) {
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.capacity {
                if let Some((old, _)) = self.entries.shift_remove_index(0) {
                    debug!("Evicting cached image {}", old);
                }
            }
        }
        self.entries.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let mut c = FifoCache::new(2);
        c.insert("a".into(), 1);
        c.insert("b".into(), 2);
        assert_eq!(c.get("a"), Some(1));
        c.insert("c".into(), 3);
        assert!(!c.contains("a"));
        assert!(c.contains("b") && c.contains("c"));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_reinsert_keeps_size() {
        let mut c = FifoCache::new(2);
        c.insert("a".into(), 1);
        c.insert("b".into(), 2);
        c.insert("b".into(), 5);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("b"), Some(5));
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn test_cache_key_is_stable_hex() {
        let k = cache_key("http://x/a.png|cfg");
        assert_eq!(k.len(), 64);
        assert_eq!(k, cache_key("http://x/a.png|cfg"));
        assert_ne!(k, cache_key("http://x/b.png|cfg"));
    }
}
