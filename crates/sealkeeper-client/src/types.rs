//! Wire types for the sealed-store REST API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response shape of `sys/seal-status`.
#[derive(Debug, Clone, Deserialize)]
pub struct SealStatus {
    pub sealed: bool,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub t: u32,
    #[serde(default)]
    pub n: u32,
    #[serde(default)]
    pub progress: u32,
}

/// Response shape of `sys/health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub initialized: bool,
    pub sealed: bool,
    #[serde(default)]
    pub standby: bool,
}

/// Response shape of `sys/leader`.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaderStatus {
    #[serde(default)]
    pub is_leader: bool,
    #[serde(default)]
    pub leader_address: String,
}

/// Response shape of `sys/init` (GET — query only).
#[derive(Debug, Clone, Deserialize)]
pub struct InitStatus {
    pub initialized: bool,
}

/// Request body for `sys/init` (POST).
#[derive(Debug, Clone, Serialize)]
pub struct InitRequest {
    pub secret_shares: u8,
    pub secret_threshold: u8,
    pub recovery_shares: u8,
    pub recovery_threshold: u8,
}

/// Response body from `sys/init` (POST).
#[derive(Debug, Clone, Deserialize)]
pub struct InitResponse {
    pub keys: Vec<String>,
    #[serde(default)]
    pub recovery_keys: Vec<String>,
    pub root_token: String,
}

/// Response body from `sys/unseal`.
#[derive(Debug, Clone, Deserialize)]
pub struct UnsealResponse {
    pub sealed: bool,
    #[serde(default)]
    pub progress: u32,
}

/// A single entry in the auth-mount table, as returned by `sys/auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthMountEntry {
    #[serde(rename = "type")]
    pub mount_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub accessor: String,
}

/// A single entry in the secret-engine mount table, as returned by `sys/mounts`.
#[derive(Debug, Clone, Deserialize)]
pub struct MountEntry {
    #[serde(rename = "type")]
    pub mount_type: String,
    #[serde(default)]
    pub description: String,
}

/// A single entry in the audit-device table, as returned by `sys/audit`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditMountEntry {
    #[serde(rename = "type")]
    pub mount_type: String,
}

/// Request body to enable an auth method at a path.
#[derive(Debug, Clone, Serialize)]
pub struct EnableAuthRequest {
    #[serde(rename = "type")]
    pub mount_type: String,
    pub description: String,
}

/// Request body to mount or tune a secrets engine.
#[derive(Debug, Clone, Serialize, Default)]
pub struct MountConfigInput {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mount_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seal_wrap: Option<bool>,
}

/// Request body to register a plugin binary.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterPluginRequest {
    pub command: String,
    pub args: Vec<String>,
    pub sha256: String,
}

/// Request body to create an orphan token during the init root-token exchange.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTokenRequest {
    pub id: String,
    pub policies: Vec<String>,
    pub display_name: String,
    pub no_parent: bool,
}
