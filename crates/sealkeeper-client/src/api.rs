//! The server-client capability surface, expressed as a trait.
//!
//! The reconciler and lifecycle manager are written against [`SealedStoreApi`]
//! rather than the concrete [`crate::Client`] so that tests can drive them
//! against a recording/stub implementation instead of a live server.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ClientError;
use crate::types::{
    AuditMountEntry, AuthMountEntry, CreateTokenRequest, EnableAuthRequest, HealthStatus,
    InitRequest, InitResponse, InitStatus, LeaderStatus, MountConfigInput, MountEntry,
    RegisterPluginRequest, SealStatus, UnsealResponse,
};

/// Everything the init/unseal state machine and the config reconciler need
/// from the sealed-store server.
#[async_trait::async_trait]
pub trait SealedStoreApi: Send + Sync {
    /// `GET sys/seal-status`.
    async fn seal_status(&self) -> Result<SealStatus, ClientError>;

    /// `GET sys/health`.
    async fn health(&self) -> Result<HealthStatus, ClientError>;

    /// `GET sys/leader`.
    async fn leader(&self) -> Result<LeaderStatus, ClientError>;

    /// `GET sys/init`.
    async fn init_status(&self) -> Result<InitStatus, ClientError>;

    /// `PUT sys/init`.
    async fn init(&self, request: InitRequest) -> Result<InitResponse, ClientError>;

    /// `PUT sys/unseal`.
    async fn unseal(&self, share: &str) -> Result<UnsealResponse, ClientError>;

    /// `PUT sys/step-down`.
    async fn step_down(&self) -> Result<(), ClientError>;

    /// Install a token for subsequent authenticated requests.
    async fn set_token(&self, token: &str);

    /// Clear and zero any installed token.
    async fn clear_token(&self);

    /// `POST auth/token/create-orphan`.
    async fn create_orphan_token(&self, request: CreateTokenRequest) -> Result<(), ClientError>;

    /// `PUT auth/token/revoke-self` (or equivalent) for the currently installed token.
    async fn revoke_token(&self, token: &str) -> Result<(), ClientError>;

    /// `GET sys/auth` — all mounted auth methods, keyed by normalized path.
    async fn list_auth(&self) -> Result<HashMap<String, AuthMountEntry>, ClientError>;

    /// `POST sys/auth/<path>`.
    async fn enable_auth(&self, path: &str, opts: EnableAuthRequest) -> Result<(), ClientError>;

    /// `POST sys/policy/<name>`.
    async fn put_policy(&self, name: &str, rules: &str) -> Result<(), ClientError>;

    /// `GET sys/mounts` — all mounted secret engines, keyed by normalized path.
    async fn list_mounts(&self) -> Result<HashMap<String, MountEntry>, ClientError>;

    /// `POST sys/mounts/<path>`.
    async fn mount(&self, path: &str, config: MountConfigInput) -> Result<(), ClientError>;

    /// `POST sys/mounts/<path>/tune`.
    async fn tune_mount(&self, path: &str, config: MountConfigInput) -> Result<(), ClientError>;

    /// `GET sys/plugins/catalog`.
    async fn list_plugins(&self) -> Result<Vec<String>, ClientError>;

    /// `POST sys/plugins/catalog/<plugin_type>/<name>`.
    async fn register_plugin(
        &self,
        plugin_type: &str,
        name: &str,
        request: RegisterPluginRequest,
    ) -> Result<(), ClientError>;

    /// `GET sys/audit`.
    async fn list_audit(&self) -> Result<HashMap<String, AuditMountEntry>, ClientError>;

    /// `POST sys/audit/<path>`.
    async fn enable_audit(&self, path: &str, options: Value) -> Result<(), ClientError>;

    /// Generic authenticated read against an arbitrary logical path.
    ///
    /// Returns `Ok(None)` if the server reports the path as absent (HTTP 404),
    /// matching the semantics reconcilers need for "has this been configured
    /// before" checks — distinct from a transport/API error.
    async fn read(&self, path: &str) -> Result<Option<Value>, ClientError>;

    /// Generic authenticated write against an arbitrary logical path.
    async fn write(&self, path: &str, body: Value) -> Result<(), ClientError>;

    /// Generic authenticated list against an arbitrary logical path.
    async fn list(&self, path: &str) -> Result<Vec<String>, ClientError>;
}
