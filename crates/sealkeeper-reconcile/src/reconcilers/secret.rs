//! Secret-engine section: mount or tune each engine, then walk its nested
//! `configuration` map, writing each sub-config entry and rotating root
//! credentials where requested.
//!
//! This is the largest reconciler because secret engines are the most
//! irregular mount family: some config sub-paths are name-free (`kv`'s
//! `config`), some share a rotate-root endpoint that must never be
//! re-invoked twice for the same path in one run (the rotation cache), and
//! some reject a second write outright once populated (the "delete them
//! before reconfiguring" immutable-endpoint signal, tolerated the same way
//! the audit reconciler tolerates it).

use std::collections::{HashMap, HashSet};

use sealkeeper_client::{MountConfigInput, SealedStoreApi};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::SecretEngine;
use crate::error::ReconcileError;
use crate::util::{coerce_string_keyed, normalize, overlay};

const IMMUTABLE_SIGNAL: &str = "delete them before reconfiguring";

/// Secret-engine types whose `config` sub-option needs no `name` component
/// in its sub-config entries — the endpoint is a single shared document.
const NAME_FREE_CONFIG_TYPES: &[&str] = &["ad", "alicloud", "azure", "gcp", "gcpkms", "kv"];

/// Reconcile every configured secret engine, in document order.
///
/// # Errors
///
/// Returns the first unrecovered client error, or a config error for a
/// sub-config entry missing a required `name`.
pub async fn reconcile<C: SealedStoreApi>(client: &C, engines: &[SecretEngine]) -> Result<(), ReconcileError> {
    if engines.is_empty() {
        return Ok(());
    }

    let mounted = client.list_mounts().await?;
    let mut rotated: HashSet<String> = HashSet::new();

    for engine in engines {
        reconcile_one(client, &mounted, engine, &mut rotated).await?;
    }
    Ok(())
}

async fn reconcile_one<C: SealedStoreApi>(
    client: &C,
    mounted: &HashMap<String, sealkeeper_client::MountEntry>,
    engine: &SecretEngine,
    rotated: &mut HashSet<String>,
) -> Result<(), ReconcileError> {
    let path = normalize(engine.raw_path());
    let existed = mounted.contains_key(&path);

    let options = overlay(
        engine.config.as_ref().and_then(options_from_config),
        engine.options.clone().map(Value::Object),
    );
    let mount_config = MountConfigInput {
        mount_type: Some(engine.engine_type.clone()),
        description: engine.description.clone(),
        plugin_name: engine.plugin_name.clone(),
        config: engine.config.clone(),
        options: options.map(as_string_map),
        local: Some(engine.local),
        seal_wrap: Some(engine.seal_wrap),
    };

    if existed {
        client.tune_mount(&path, mount_config).await?;
        info!(path = %path, "tuned secret engine mount");
    } else {
        client.mount(&path, mount_config).await?;
        info!(path = %path, engine_type = %engine.engine_type, "mounted secret engine");
    }

    for (config_option, sub_configs) in &engine.configuration {
        for sub_config in sub_configs {
            reconcile_sub_config(client, &path, engine, config_option, sub_config, existed, rotated).await?;
        }
    }

    Ok(())
}

fn options_from_config(config: &Value) -> Option<Value> {
    config.get("options").cloned()
}

fn as_string_map(value: Value) -> HashMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn reconcile_sub_config<C: SealedStoreApi>(
    client: &C,
    path: &str,
    engine: &SecretEngine,
    config_option: &str,
    sub_config: &Value,
    mount_existed: bool,
    rotated: &mut HashSet<String>,
) -> Result<(), ReconcileError> {
    let coerced = coerce_string_keyed(sub_config.clone());
    let mut body = match coerced {
        Value::Object(map) => map,
        other => {
            return Err(ReconcileError::Config(format!(
                "secret engine '{path}' sub-config '{config_option}' must be a mapping, got {other:?}"
            )));
        }
    };

    let name = extract_name(&body);
    if name.is_none() && !is_name_free(&engine.engine_type, config_option) {
        return Err(ReconcileError::Config(format!(
            "secret engine '{path}' sub-config '{config_option}' requires a 'name' field"
        )));
    }
    body.remove("name");

    let rotate = matches!(body.get("rotate"), Some(Value::Bool(true)));
    let create_only = matches!(body.get("create_only"), Some(Value::Bool(true)));
    body.remove("rotate");
    body.remove("create_only");

    let final_path = match &name {
        Some(name) => format!("{path}{config_option}/{name}"),
        None => format!("{path}{config_option}"),
    };

    if rotate && mount_existed && is_protected_rotation_pair(&engine.engine_type, config_option) {
        rotate_once(client, &engine.engine_type, path, name.as_deref(), rotated).await?;
        return Ok(());
    }

    if create_only && mount_existed {
        let existing = client.read(&final_path).await?;
        if existing.is_some_and(|v| !is_empty_value(&v)) {
            info!(path = %final_path, "create-only sub-config already populated, skipping");
            return Ok(());
        }
    }

    match client.write(&final_path, Value::Object(body)).await {
        Ok(()) => {
            info!(path = %final_path, "wrote secret engine sub-config");
        }
        Err(err) if err.body_contains(IMMUTABLE_SIGNAL) => {
            warn!(path = %final_path, "sub-config endpoint is immutable once created, leaving as-is");
        }
        Err(err) => return Err(err.into()),
    }

    if rotate {
        rotate_once(client, &engine.engine_type, path, name.as_deref(), rotated).await?;
    }

    Ok(())
}

fn extract_name(body: &Map<String, Value>) -> Option<String> {
    match body.get("name") {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn is_name_free(engine_type: &str, config_option: &str) -> bool {
    (config_option == "config" && NAME_FREE_CONFIG_TYPES.contains(&engine_type))
        || (engine_type == "aws" && config_option == "config/root")
}

fn is_protected_rotation_pair(engine_type: &str, config_option: &str) -> bool {
    (engine_type == "database" && config_option == "config") || (engine_type == "aws" && config_option == "config/root")
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Rotate root credentials for `path`, at most once per reconciliation run.
///
/// # Errors
///
/// Returns a config error if `engine_type` does not support rotation, or
/// the underlying client error if the rotation write fails.
async fn rotate_once<C: SealedStoreApi>(
    client: &C,
    engine_type: &str,
    path: &str,
    name: Option<&str>,
    rotated: &mut HashSet<String>,
) -> Result<(), ReconcileError> {
    let rotate_path = rotation_path(engine_type, path, name)?;
    if !rotated.insert(rotate_path.clone()) {
        info!(path = %rotate_path, "root credentials already rotated this run, skipping");
        return Ok(());
    }
    client.write(&rotate_path, Value::Object(Map::new())).await?;
    info!(path = %rotate_path, "rotated root credentials");
    Ok(())
}

fn rotation_path(engine_type: &str, path: &str, name: Option<&str>) -> Result<String, ReconcileError> {
    match engine_type {
        "aws" => Ok(format!("{path}config/rotate-root")),
        "database" => {
            let name = name.ok_or_else(|| {
                ReconcileError::Config(format!("database rotation at '{path}' requires a 'name'"))
            })?;
            Ok(format!("{path}rotate-root/{name}"))
        }
        "gcp" => {
            let name = name
                .ok_or_else(|| ReconcileError::Config(format!("gcp rotation at '{path}' requires a 'name'")))?;
            Ok(format!("{path}{name}/rotate"))
        }
        other => Err(ReconcileError::Config(format!(
            "secret engine type '{other}' does not support root rotation"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use sealkeeper_client::MountEntry;
    use serde_json::json;

    use super::*;
    use crate::reconcilers::test_support::RecordingClient;

    fn engine(engine_type: &str, configuration: HashMap<String, Vec<Value>>) -> SecretEngine {
        SecretEngine {
            engine_type: engine_type.to_owned(),
            path: None,
            description: None,
            plugin_name: None,
            local: false,
            seal_wrap: false,
            config: None,
            options: None,
            configuration,
        }
    }

    #[tokio::test]
    async fn kv_config_without_name_writes_to_config() {
        let client = RecordingClient::default();
        let configuration = HashMap::from([("config".to_owned(), vec![json!({ "max_versions": 5 })])]);
        reconcile(&client, &[engine("kv", configuration)]).await.unwrap();

        let writes = client.writes();
        assert!(writes.iter().any(|(p, b)| p == "kv/config" && *b == json!({ "max_versions": 5 })));
    }

    #[tokio::test]
    async fn aws_config_root_without_name_succeeds_but_config_client_requires_name() {
        let client = RecordingClient::default();
        let configuration = HashMap::from([
            ("config/root".to_owned(), vec![json!({ "access_key": "a" })]),
            ("config/client".to_owned(), vec![json!({ "access_key": "a" })]),
        ]);
        let err = reconcile(&client, &[engine("aws", configuration)]).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
    }

    #[tokio::test]
    async fn aws_config_root_alone_writes_without_name() {
        let client = RecordingClient::default();
        let configuration = HashMap::from([("config/root".to_owned(), vec![json!({ "access_key": "a" })])]);
        reconcile(&client, &[engine("aws", configuration)]).await.unwrap();

        let writes = client.writes();
        assert!(writes.iter().any(|(p, b)| p == "aws/config/root" && *b == json!({ "access_key": "a" })));
    }

    #[tokio::test]
    async fn database_rotate_skips_write_on_existing_mount() {
        let client = RecordingClient::with_secret_mounts([(
            "database/".to_owned(),
            MountEntry {
                mount_type: "database".to_owned(),
                description: String::new(),
            },
        )]);
        let configuration = HashMap::from([(
            "config".to_owned(),
            vec![json!({ "name": "db1", "rotate": true, "connection_url": "postgres://" })],
        )]);
        reconcile(&client, &[engine("database", configuration)]).await.unwrap();

        let calls = client.calls();
        assert!(calls.contains(&"tune_mount:database/".to_owned()));
        assert!(calls.contains(&"write:database/rotate-root/db1".to_owned()));
        assert!(!client.writes().iter().any(|(p, _)| p == "database/config/db1"));
    }

    #[tokio::test]
    async fn rotation_happens_at_most_once_per_path() {
        let client = RecordingClient::with_secret_mounts([(
            "database/".to_owned(),
            MountEntry {
                mount_type: "database".to_owned(),
                description: String::new(),
            },
        )]);
        let configuration = HashMap::from([(
            "config".to_owned(),
            vec![
                json!({ "name": "db1", "rotate": true, "connection_url": "a" }),
                json!({ "name": "db1", "rotate": true, "connection_url": "b" }),
            ],
        )]);
        reconcile(&client, &[engine("database", configuration)]).await.unwrap();

        let rotations = client
            .writes()
            .into_iter()
            .filter(|(p, _)| p == "database/rotate-root/db1")
            .count();
        assert_eq!(rotations, 1);
    }

    #[tokio::test]
    async fn create_only_with_existing_data_skips_write() {
        let client = RecordingClient::with_secret_mounts([(
            "kv/".to_owned(),
            MountEntry {
                mount_type: "kv".to_owned(),
                description: String::new(),
            },
        )]);
        client.seed_read("kv/config", Some(json!({ "max_versions": 1 })));
        let configuration = HashMap::from([(
            "config".to_owned(),
            vec![json!({ "create_only": true, "max_versions": 5 })],
        )]);
        reconcile(&client, &[engine("kv", configuration)]).await.unwrap();

        assert!(!client.writes().iter().any(|(p, _)| p == "kv/config"));
    }

    #[tokio::test]
    async fn create_only_with_empty_read_writes_without_the_flag() {
        let client = RecordingClient::with_secret_mounts([(
            "kv/".to_owned(),
            MountEntry {
                mount_type: "kv".to_owned(),
                description: String::new(),
            },
        )]);
        client.seed_read("kv/config", None);
        let configuration = HashMap::from([(
            "config".to_owned(),
            vec![json!({ "create_only": true, "max_versions": 5 })],
        )]);
        reconcile(&client, &[engine("kv", configuration)]).await.unwrap();

        let writes = client.writes();
        let (_, body) = writes.iter().find(|(p, _)| p == "kv/config").unwrap();
        assert_eq!(body, &json!({ "max_versions": 5 }));
    }

    #[tokio::test]
    async fn immutable_endpoint_error_is_tolerated() {
        let client = RecordingClient::default();
        client.seed_write_error("pki/config", 400, "delete them before reconfiguring");
        let configuration = HashMap::from([("config".to_owned(), vec![json!({ "name": "root", "ttl": "1h" })])]);
        reconcile(&client, &[engine("pki", configuration)]).await.unwrap();
    }
}
