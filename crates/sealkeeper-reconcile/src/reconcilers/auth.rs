//! Auth-method section: mounts backends and writes their per-type config,
//! roles, users, groups, STS roles, and GitHub team/user policy mappings.
//!
//! Each auth-method type has its own irregular URL grammar — `aws` writes
//! its backend config under `config/client` rather than `config`, `token`
//! roles live at a literal path that ignores the mount's own location,
//! `cert` roles are called `certs` instead of `role` — so dispatch happens
//! on `method.type` rather than trying to unify the shapes.

use std::collections::HashMap;
use std::path::Path;

use sealkeeper_client::{AuthMountEntry, EnableAuthRequest, SealedStoreApi};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::{AuthMethod, NamedConfig};
use crate::error::ReconcileError;
use crate::util::{coerce_string_keyed, normalize};

const DEFAULT_SERVICEACCOUNT_ROOT: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Reconcile every configured auth method, in document order.
///
/// # Errors
///
/// Returns the first client error any section produces, or a config error
/// for an unsupported auth type or a type-specific config block missing.
pub async fn reconcile<C: SealedStoreApi>(client: &C, methods: &[AuthMethod]) -> Result<(), ReconcileError> {
    reconcile_with_root(client, methods, Path::new(DEFAULT_SERVICEACCOUNT_ROOT)).await
}

async fn reconcile_with_root<C: SealedStoreApi>(
    client: &C,
    methods: &[AuthMethod],
    sa_root: &Path,
) -> Result<(), ReconcileError> {
    if methods.is_empty() {
        return Ok(());
    }
    let mounted = client.list_auth().await?;
    for method in methods {
        reconcile_one(client, &mounted, method, sa_root).await?;
    }
    Ok(())
}

async fn reconcile_one<C: SealedStoreApi>(
    client: &C,
    mounted: &HashMap<String, AuthMountEntry>,
    method: &AuthMethod,
    sa_root: &Path,
) -> Result<(), ReconcileError> {
    let path = normalize(method.raw_path());
    ensure_mount(client, mounted, &path, method).await?;

    match method.auth_type.as_str() {
        "kubernetes" => configure_kubernetes(client, &path, method, sa_root).await,
        "github" => configure_github(client, &path, method).await,
        "aws" => configure_aws(client, &path, method).await,
        "gcp" | "jwt" | "oidc" => configure_role_backend(client, &path, method, "role").await,
        "cert" => configure_role_backend(client, &path, method, "certs").await,
        "approle" => write_roles(client, &path, "role", &method.roles).await,
        "token" => write_roles_literal(client, "token/roles", &method.roles).await,
        "ldap" | "okta" => configure_directory_backend(client, &path, method).await,
        other => Err(ReconcileError::Config(format!(
            "unsupported auth method type '{other}' at path '{path}'"
        ))),
    }
}

async fn ensure_mount<C: SealedStoreApi>(
    client: &C,
    mounted: &HashMap<String, AuthMountEntry>,
    path: &str,
    method: &AuthMethod,
) -> Result<(), ReconcileError> {
    match mounted.get(path) {
        None => {
            client
                .enable_auth(
                    path,
                    EnableAuthRequest {
                        mount_type: method.auth_type.clone(),
                        description: method
                            .description
                            .clone()
                            .unwrap_or_else(|| format!("{} backend", method.auth_type)),
                    },
                )
                .await?;
            info!(path = %path, auth_type = %method.auth_type, "enabled auth method");
        }
        Some(existing) if existing.mount_type != method.auth_type => {
            warn!(
                path = %path,
                existing_type = %existing.mount_type,
                wanted_type = %method.auth_type,
                "auth method already mounted under a different type, leaving mount as-is",
            );
        }
        Some(_) => {
            info!(path = %path, "auth method already mounted");
        }
    }
    Ok(())
}

fn require_config(method: &AuthMethod) -> Result<&Value, ReconcileError> {
    method.config.as_ref().ok_or_else(|| {
        ReconcileError::Config(format!(
            "auth method of type '{}' requires a config block",
            method.auth_type
        ))
    })
}

async fn configure_kubernetes<C: SealedStoreApi>(
    client: &C,
    path: &str,
    method: &AuthMethod,
    sa_root: &Path,
) -> Result<(), ReconcileError> {
    let mut body = method.config.clone().unwrap_or_else(|| Value::Object(Map::new()));
    if let Value::Object(map) = &mut body {
        if !map.contains_key("kubernetes_host") {
            if let Some(synthesized) = synthesize_kubernetes_config(sa_root) {
                for (key, value) in synthesized {
                    map.entry(key).or_insert(value);
                }
            }
        }
    }
    client
        .write(&format!("auth/{path}config"), coerce_string_keyed(body))
        .await?;
    write_roles(client, path, "role", &method.roles).await
}

/// Synthesize `kubernetes_host`/`kubernetes_ca_cert`/`token_reviewer_jwt`
/// from the in-cluster service-account files and environment, for a pod
/// running inside the same cluster it is configuring auth against.
/// Returns `None` if any of the three inputs is unavailable, leaving the
/// caller's explicit config untouched rather than writing a partial body.
fn synthesize_kubernetes_config(sa_root: &Path) -> Option<Map<String, Value>> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
    let ca_cert = std::fs::read_to_string(sa_root.join("ca.crt")).ok()?;
    let token = std::fs::read_to_string(sa_root.join("token")).ok()?;

    let mut map = Map::new();
    map.insert("kubernetes_host".to_owned(), json!(format!("https://{host}:443")));
    map.insert("kubernetes_ca_cert".to_owned(), json!(ca_cert));
    map.insert("token_reviewer_jwt".to_owned(), json!(token));
    Some(map)
}

async fn configure_github<C: SealedStoreApi>(client: &C, path: &str, method: &AuthMethod) -> Result<(), ReconcileError> {
    let config = require_config(method)?;
    client
        .write(&format!("auth/{path}config"), coerce_string_keyed(config.clone()))
        .await?;

    for (mapping_type, entries) in &method.mappings {
        for (user_or_team, policy) in entries {
            client
                .write(
                    &format!("auth/{path}map/{mapping_type}/{user_or_team}"),
                    json!({ "value": policy }),
                )
                .await?;
        }
    }
    Ok(())
}

async fn configure_aws<C: SealedStoreApi>(client: &C, path: &str, method: &AuthMethod) -> Result<(), ReconcileError> {
    let config = require_config(method)?;
    client
        .write(&format!("auth/{path}config/client"), coerce_string_keyed(config.clone()))
        .await?;

    for sts_role in &method.sts_roles {
        write_named(client, &format!("auth/{path}config/sts/{}", sts_role.name), &sts_role.body).await?;
    }
    write_roles(client, path, "role", &method.roles).await
}

/// `gcp`/`jwt`/`oidc` (role-keyed under `role_sub_path = "role"`) and `cert`
/// (under `"certs"`) all write a flat `config` and then per-role entries —
/// they only differ in the role sub-path's name.
async fn configure_role_backend<C: SealedStoreApi>(
    client: &C,
    path: &str,
    method: &AuthMethod,
    role_sub_path: &str,
) -> Result<(), ReconcileError> {
    let config = require_config(method)?;
    client
        .write(&format!("auth/{path}config"), coerce_string_keyed(config.clone()))
        .await?;
    write_roles(client, path, role_sub_path, &method.roles).await
}

async fn configure_directory_backend<C: SealedStoreApi>(
    client: &C,
    path: &str,
    method: &AuthMethod,
) -> Result<(), ReconcileError> {
    let config = require_config(method)?;
    client
        .write(&format!("auth/{path}config"), coerce_string_keyed(config.clone()))
        .await?;

    for user in &method.users {
        write_named(client, &format!("auth/{path}users/{}", user.name), &user.body).await?;
    }
    for group in &method.groups {
        write_named(client, &format!("auth/{path}groups/{}", group.name), &group.body).await?;
    }
    Ok(())
}

async fn write_roles<C: SealedStoreApi>(
    client: &C,
    path: &str,
    role_sub_path: &str,
    roles: &[NamedConfig],
) -> Result<(), ReconcileError> {
    for role in roles {
        write_named(client, &format!("auth/{path}{role_sub_path}/{}", role.name), &role.body).await?;
    }
    Ok(())
}

/// `token` roles live at a literal path that does not depend on the
/// method's own mount point — there is exactly one `token` backend and it
/// is always mounted at `auth/token`.
async fn write_roles_literal<C: SealedStoreApi>(
    client: &C,
    base: &str,
    roles: &[NamedConfig],
) -> Result<(), ReconcileError> {
    for role in roles {
        write_named(client, &format!("auth/{base}/{}", role.name), &role.body).await?;
    }
    Ok(())
}

async fn write_named<C: SealedStoreApi>(client: &C, path: &str, body: &Map<String, Value>) -> Result<(), ReconcileError> {
    let value = coerce_string_keyed(Value::Object(body.clone()));
    client.write(path, value).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::reconcilers::test_support::RecordingClient;

    fn method(auth_type: &str, path: Option<&str>) -> AuthMethod {
        AuthMethod {
            auth_type: auth_type.to_owned(),
            path: path.map(str::to_owned),
            description: None,
            config: None,
            roles: Vec::new(),
            mappings: HashMap::new(),
            sts_roles: Vec::new(),
            users: Vec::new(),
            groups: Vec::new(),
        }
    }

    #[test]
    fn mount_path_defaults_to_type() {
        let m = method("kubernetes", None);
        assert_eq!(normalize(m.raw_path()), "kubernetes/");
    }

    #[test]
    fn mount_path_honors_explicit_override() {
        let m = method("kubernetes", Some("k8s-prod"));
        assert_eq!(normalize(m.raw_path()), "k8s-prod/");
    }

    #[tokio::test]
    async fn missing_config_is_fatal_for_github() {
        let client = RecordingClient::default();
        let err = reconcile(&client, &[method("github", None)]).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
    }

    #[tokio::test]
    async fn kubernetes_with_explicit_host_does_not_touch_filesystem() {
        let client = RecordingClient::default();
        let mut m = method("kubernetes", None);
        m.config = Some(json!({ "kubernetes_host": "https://x" }));

        let sa_root = tempdir().unwrap();
        reconcile_with_root(&client, &[m], sa_root.path()).await.unwrap();

        let calls = client.writes();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "auth/kubernetes/config");
        assert_eq!(calls[0].1, json!({ "kubernetes_host": "https://x" }));
    }

    #[tokio::test]
    async fn github_mappings_write_value_wrapped_body() {
        let client = RecordingClient::default();
        let mut m = method("github", None);
        m.config = Some(json!({ "organization": "o" }));
        m.mappings.insert("teams".to_owned(), HashMap::from([("t1".to_owned(), "p1".to_owned())]));

        reconcile(&client, &[m]).await.unwrap();

        let calls = client.writes();
        assert!(calls.iter().any(|(p, b)| p == "auth/github/config" && *b == json!({ "organization": "o" })));
        assert!(calls.iter().any(|(p, b)| p == "auth/github/map/teams/t1" && *b == json!({ "value": "p1" })));
    }

    #[tokio::test]
    async fn token_roles_ignore_custom_path() {
        let client = RecordingClient::default();
        let mut m = method("token", Some("ignored"));
        m.roles = vec![NamedConfig {
            name: "default".to_owned(),
            body: serde_json::Map::new(),
        }];

        reconcile(&client, &[m]).await.unwrap();

        let calls = client.writes();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "auth/token/roles/default");
    }

    #[tokio::test]
    async fn unsupported_type_is_fatal() {
        let client = RecordingClient::default();
        let err = reconcile(&client, &[method("made-up-backend", None)]).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
    }
}
