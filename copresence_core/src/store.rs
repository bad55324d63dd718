//! Durable key-value storage behind the attempt ledger.
//!
//! Values are whole serialized ledger partitions, one per scanner, so a
//! single-key write is the unit of atomicity.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Storage failures. A failed `set` or `remove` leaves the prior value intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Trait for the ledger's persistent backing store
///
/// Implementations must be thread-safe and persist data across restarts
/// (except the in-memory store, which exists for tests and dry runs).
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    
    /// Replace the value under `key` atomically
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    
    /// Delete `key`. Deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Sled-based persistent store
///
/// Uses an embedded key-value database for durability. Every write is
/// flushed before returning.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)
            .map_err(|e| StoreError::Unavailable(format!("Failed to open sled DB: {}", e)))?;
        Ok(Self { db })
    }
    
    /// Create a temporary store, removed on drop (for tests and simulation)
    pub fn open_temporary() -> Result<Self, StoreError> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()
            .map_err(|e| StoreError::Unavailable(format!("Failed to open temp DB: {}", e)))?;
        Ok(Self { db })
    }
    
    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()
            .map_err(|e| StoreError::Unavailable(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let Some(bytes) = self.db.get(key.as_bytes())
            .map_err(|e| StoreError::Unavailable(format!("Read failed: {}", e)))?
        else {
            return Ok(None);
        };
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| StoreError::Corrupt(format!("value under {key} is not UTF-8: {e}")))
    }
    
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.db.insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| StoreError::Unavailable(format!("Insert failed: {}", e)))?;
        self.flush()
    }
    
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.db.remove(key.as_bytes())
            .map_err(|e| StoreError::Unavailable(format!("Remove failed: {}", e)))?;
        self.flush()
    }
}

/// In-process store with an optional byte quota.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Caps the total size of keys plus values, in bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }
    
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }
    
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        
        if let Some(quota) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                warn!("Refusing write of {} bytes under {}: quota {}", value.len(), key, quota);
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }
        
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
    
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_memory_store_basic() {
        let store = MemoryStore::new();
        assert_eq!(store.get("ABC1-001").unwrap(), None);
        
        store.set("ABC1-001", "[]").unwrap();
        assert_eq!(store.get("ABC1-001").unwrap().as_deref(), Some("[]"));
        
        store.remove("ABC1-001").unwrap();
        store.remove("ABC1-001").unwrap();
        assert_eq!(store.get("ABC1-001").unwrap(), None);
    }
    
    #[test]
    fn test_memory_store_quota_keeps_previous_value() {
        let store = MemoryStore::with_quota(16);
        store.set("k", "small").unwrap();
        
        let err = store.set("k", "this value is far too large").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("small"));
    }
    
    #[test]
    fn test_sled_store_basic() {
        let store = SledStore::open_temporary().unwrap();
        
        store.set("ABC1-001", r#"[{"id":"ABC1-002","attempts":[]}]"#).unwrap();
        assert_eq!(
            store.get("ABC1-001").unwrap().as_deref(),
            Some(r#"[{"id":"ABC1-002","attempts":[]}]"#)
        );
        assert_eq!(store.get("ABC1-002").unwrap(), None);
        
        store.remove("ABC1-001").unwrap();
        assert_eq!(store.get("ABC1-001").unwrap(), None);
    }
}
