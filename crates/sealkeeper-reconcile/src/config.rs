//! In-memory representation of the declarative config document.
//!
//! Deserialized with `serde`'s strict unmarshaling at the top level — an
//! unrecognized section name is a hard config error rather than a silently
//! ignored no-op. The document itself is YAML or JSON; parsing is the
//! caller's job (see `sealkeeper-cli`'s config loader), this module only
//! defines the shape.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// The full declarative configuration document.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
    #[serde(default)]
    pub auth: Vec<AuthMethod>,
    #[serde(default)]
    pub secrets: Vec<SecretEngine>,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    #[serde(default)]
    pub audit: Vec<AuditDevice>,
    #[serde(rename = "startupSecrets", default)]
    pub startup_secrets: Vec<StartupSecret>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(rename = "group-aliases", default)]
    pub group_aliases: Vec<GroupAlias>,
}

/// A named policy document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub name: String,
    pub rules: String,
}

/// A `name` plus an arbitrary body — the shape shared by roles, STS roles,
/// users, and groups across the auth-method backends.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedConfig {
    pub name: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

/// An auth-method entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthMethod {
    #[serde(rename = "type")]
    pub auth_type: String,
    pub path: Option<String>,
    pub description: Option<String>,
    pub config: Option<Value>,
    #[serde(default)]
    pub roles: Vec<NamedConfig>,
    /// `teams`/`users`-style GitHub mappings: `mappingType -> userOrTeam -> policy`.
    #[serde(rename = "map", default)]
    pub mappings: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub sts_roles: Vec<NamedConfig>,
    #[serde(default)]
    pub users: Vec<NamedConfig>,
    #[serde(default)]
    pub groups: Vec<NamedConfig>,
}

impl AuthMethod {
    /// The mount path this method resolves to before normalization.
    #[must_use]
    pub fn raw_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.auth_type)
    }
}

/// A secret-engine entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretEngine {
    #[serde(rename = "type")]
    pub engine_type: String,
    pub path: Option<String>,
    pub description: Option<String>,
    pub plugin_name: Option<String>,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub seal_wrap: bool,
    pub config: Option<Value>,
    pub options: Option<Map<String, Value>>,
    /// `configOption -> [subConfig]`, e.g. `config/root -> [{ access_key: ... }]`.
    #[serde(default)]
    pub configuration: HashMap<String, Vec<Value>>,
}

impl SecretEngine {
    /// The mount path this engine resolves to before normalization.
    #[must_use]
    pub fn raw_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.engine_type)
    }
}

/// A plugin registration entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    pub plugin_name: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub sha256: String,
}

/// An audit-device entry. `path` defaults to `type` like the other mount
/// families; the remaining fields are passed through verbatim as the
/// enable-audit options body.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditDevice {
    #[serde(rename = "type")]
    pub audit_type: String,
    pub path: Option<String>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl AuditDevice {
    #[must_use]
    pub fn raw_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.audit_type)
    }
}

/// A one-shot startup secret. Only `type == "kv"` is honored.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartupSecret {
    #[serde(rename = "type")]
    pub secret_type: String,
    pub path: String,
    pub data: Map<String, Value>,
}

/// An identity-group entry. Only `type == "external"` is honored.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A group-alias entry, binding an external identity-provider group (resolved
/// via an auth-mount accessor) to an internal identity group.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupAlias {
    pub name: String,
    pub mountpath: String,
    pub group: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_top_level_key() {
        let doc = "policies: []\nbogusSection: []\n";
        let err = serde_yaml::from_str::<Config>(doc).unwrap_err();
        assert!(err.to_string().contains("bogusSection") || err.to_string().contains("unknown"));
    }

    #[test]
    fn empty_document_parses_to_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert!(cfg.auth.is_empty());
        assert!(cfg.secrets.is_empty());
    }

    #[test]
    fn auth_method_path_defaults_to_type() {
        let doc = "type: kubernetes\n";
        let method: AuthMethod = serde_yaml::from_str(doc).unwrap();
        assert_eq!(method.raw_path(), "kubernetes");
    }

    #[test]
    fn github_mappings_parse_from_map_key() {
        let doc = r#"
type: github
config:
  organization: o
map:
  teams:
    t1: p1
"#;
        let method: AuthMethod = serde_yaml::from_str(doc).unwrap();
        assert_eq!(method.mappings["teams"]["t1"], "p1");
    }
}
