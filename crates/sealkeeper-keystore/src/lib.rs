//! Pluggable key-value keystore abstraction.
//!
//! This crate defines the [`Keystore`] trait — a pure key-value interface
//! that knows nothing about seal material, tokens, or the sealed-store wire
//! protocol. It is the trust root the lifecycle manager uses to persist
//! unseal shares, recovery shares, and the root token: whoever controls this
//! store can reconstruct the server's master key, so every implementation is
//! expected to sit behind its own access controls (an IAM-scoped bucket, a
//! KMS-wrapped secret, …) — this crate only provides the narrow get/set
//! surface the core needs.
//!
//! Two implementations are provided:
//!
//! - [`MemoryKeystore`] — in-memory, for tests and local dry-runs.
//! - [`S3Keystore`] — backed by an S3-compatible bucket (feature `s3-backend`),
//!   the typical "cloud KMS-backed bucket" trust root named in the spec.

mod error;
mod memory;
#[cfg(feature = "s3-backend")]
mod s3;

pub use error::KeystoreError;
pub use memory::MemoryKeystore;
#[cfg(feature = "s3-backend")]
pub use s3::S3Keystore;

/// A pluggable key-value keystore.
///
/// Keys are opaque UTF-8 strings (e.g. `vault-root`, `vault-unseal-0`).
/// Values are opaque byte arrays. Implementations must be safe to share
/// across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait Keystore: Send + Sync {
    /// Retrieve a value by key.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::NotFound`] if the key does not exist, or
    /// [`KeystoreError::Transport`] if the backend could not be reached.
    async fn get(&self, key: &str) -> Result<Vec<u8>, KeystoreError>;

    /// Store a value, overwriting any existing value at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::Transport`] if the backend could not be
    /// reached.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError>;

    /// Round-trip a liveness probe against the `vault-test` key.
    ///
    /// The default implementation writes a fixed payload to `vault-test` and
    /// reads it back; backends that expose a cheaper health check may
    /// override this.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::Transport`] if the write or read fails, or
    /// [`KeystoreError::Malformed`] if the read-back value does not match.
    async fn test(&self) -> Result<(), KeystoreError> {
        const PROBE_KEY: &str = "vault-test";
        const PROBE_VALUE: &[u8] = b"sealkeeper-liveness-probe";
        self.set(PROBE_KEY, PROBE_VALUE).await?;
        let got = self.get(PROBE_KEY).await?;
        if got != PROBE_VALUE {
            return Err(KeystoreError::Malformed {
                key: PROBE_KEY.to_owned(),
                reason: "round-trip probe returned unexpected contents".to_owned(),
            });
        }
        Ok(())
    }

    /// Create-only write: fails with [`KeystoreError::AlreadyExists`] if
    /// `key` already holds a value.
    ///
    /// This is the semantics the init path relies on to avoid silently
    /// overwriting unseal material across overlapping init attempts — only
    /// a preceding [`KeystoreError::NotFound`] on `get` permits the write.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::AlreadyExists`] if the key is already
    /// present, or [`KeystoreError::Transport`] if the backend could not be
    /// reached.
    async fn create(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError> {
        match self.get(key).await {
            Ok(_) => Err(KeystoreError::AlreadyExists {
                key: key.to_owned(),
            }),
            Err(KeystoreError::NotFound { .. }) => self.set(key, value).await,
            Err(other) => Err(other),
        }
    }

    /// `true` if `key` holds a value, without returning it.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::Transport`] if the backend could not be
    /// reached.
    async fn exists(&self, key: &str) -> Result<bool, KeystoreError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(KeystoreError::NotFound { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }
}

#[async_trait::async_trait]
impl<T: Keystore + ?Sized> Keystore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Vec<u8>, KeystoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError> {
        (**self).set(key, value).await
    }

    async fn test(&self) -> Result<(), KeystoreError> {
        (**self).test().await
    }

    async fn create(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError> {
        (**self).create(key, value).await
    }

    async fn exists(&self, key: &str) -> Result<bool, KeystoreError> {
        (**self).exists(key).await
    }
}
