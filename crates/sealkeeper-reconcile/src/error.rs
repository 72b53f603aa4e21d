//! Error types for the lifecycle manager and config reconciler.

use sealkeeper_client::ClientError;
use sealkeeper_keystore::KeystoreError;

/// Errors from the init/unseal state machine.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// `secret_shares < secret_threshold`, or either is zero.
    #[error("invalid seal config: shares={shares} threshold={threshold}")]
    InvalidConfig { shares: u8, threshold: u8 },

    /// Preflight keystore round-trip failed.
    #[error("preflight check failed: {0}")]
    Preflight(#[source] KeystoreError),

    /// Residual keystore state was found before init — refusing to overwrite.
    #[error("refusing to init: keystore already has material at key '{key}'")]
    ResidualState { key: String },

    /// A previously submitted unseal share was rejected by the server (its
    /// progress counter reset to zero while still sealed).
    #[error("unseal share at index {index} was rejected by the server")]
    InvalidShare { index: u32 },

    /// The server client returned an error.
    #[error("server client error: {0}")]
    Client(#[from] ClientError),

    /// The keystore returned an error.
    #[error("keystore error: {0}")]
    Keystore(#[from] KeystoreError),
}

/// Errors from the declarative-config reconciler.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The config document is structurally invalid (missing required field,
    /// unsupported type, unknown top-level key).
    #[error("invalid config: {0}")]
    Config(String),

    /// The server client returned an error that was not one of the tolerated
    /// "log and continue" cases.
    #[error("server client error: {0}")]
    Client(#[from] ClientError),

    /// The keystore returned an error.
    #[error("keystore error: {0}")]
    Keystore(#[from] KeystoreError),
}
