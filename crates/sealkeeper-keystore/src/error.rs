//! Keystore error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger.

/// Errors that can occur during keystore operations.
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    /// The requested key does not exist.
    ///
    /// This is a first-class signal, not a failure — callers branch on it
    /// during the init dedup check and the unseal loop.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// `create` was called against a key that already holds a value.
    #[error("key already exists: {key}")]
    AlreadyExists { key: String },

    /// Failed to reach or authenticate against the backend.
    #[error("keystore transport error for key '{key}': {reason}")]
    Transport { key: String, reason: String },

    /// The backend returned a value that could not be interpreted.
    #[error("keystore returned malformed data for key '{key}': {reason}")]
    Malformed { key: String, reason: String },
}
