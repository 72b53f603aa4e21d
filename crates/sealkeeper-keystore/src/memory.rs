//! In-memory keystore for testing and local dry-runs.
//!
//! This backend stores all data in a `BTreeMap` behind a `RwLock`. It is not
//! persistent — all data is lost when the process exits.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{Keystore, KeystoreError};

/// An in-memory keystore backed by a `BTreeMap`.
///
/// Thread-safe and async-compatible. Cloning shares the underlying map, so
/// a clone observes writes made through any other clone.
///
/// # Examples
///
/// ```
/// # use sealkeeper_keystore::{Keystore, MemoryKeystore};
/// # #[tokio::main]
/// # async fn main() {
/// let ks = MemoryKeystore::new();
/// ks.set("vault-root", b"s.abc123").await.unwrap();
/// assert_eq!(ks.get("vault-root").await.unwrap(), b"s.abc123");
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryKeystore {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKeystore {
    /// Create a new empty in-memory keystore.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Keystore for MemoryKeystore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, KeystoreError> {
        let data = self.data.read().await;
        data.get(key).cloned().ok_or_else(|| KeystoreError::NotFound {
            key: key.to_owned(),
        })
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError> {
        let mut data = self.data.write().await;
        data.insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}
