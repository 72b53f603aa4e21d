//! Identity section: external groups and the group-aliases that bind an
//! auth-mount's external group name to one of them.
//!
//! Groups are looked up and tuned by name directly. Aliases are the
//! trickier half: an alias body references its group by the group's
//! canonical id (not its name) and an auth mount by its accessor (not its
//! path), so both have to be resolved first, and an existing alias can
//! only be found by listing every alias id and reading each one back to
//! compare on `name` — O(aliases × existing-aliases), acceptable at the
//! scale this reconciler targets.

use sealkeeper_client::SealedStoreApi;
use serde_json::json;
use tracing::info;

use crate::config::{GroupAlias, GroupConfig};
use crate::error::ReconcileError;
use crate::util::normalize;

const EXTERNAL_GROUP_TYPE: &str = "external";

/// Reconcile every configured identity group, then every group-alias.
///
/// # Errors
///
/// Returns a config error for a non-`external` group type or an alias
/// referencing a group/mount that does not resolve, or the first
/// unrecovered client error.
pub async fn reconcile<C: SealedStoreApi>(
    client: &C,
    groups: &[GroupConfig],
    aliases: &[GroupAlias],
) -> Result<(), ReconcileError> {
    for group in groups {
        reconcile_group(client, group).await?;
    }
    for alias in aliases {
        reconcile_alias(client, alias).await?;
    }
    Ok(())
}

async fn reconcile_group<C: SealedStoreApi>(client: &C, group: &GroupConfig) -> Result<(), ReconcileError> {
    if group.group_type != EXTERNAL_GROUP_TYPE {
        return Err(ReconcileError::Config(format!(
            "unsupported identity group type '{}' for group '{}', only 'external' is honored",
            group.group_type, group.name
        )));
    }

    let body = json!({
        "name": group.name,
        "type": group.group_type,
        "policies": group.policies,
        "metadata": group.metadata,
    });

    let by_name_path = format!("identity/group/name/{}", group.name);
    if client.read(&by_name_path).await?.is_some() {
        client.write(&by_name_path, body).await?;
        info!(name = %group.name, "tuned identity group");
    } else {
        client.write("identity/group", body).await?;
        info!(name = %group.name, "created identity group");
    }
    Ok(())
}

async fn reconcile_alias<C: SealedStoreApi>(client: &C, alias: &GroupAlias) -> Result<(), ReconcileError> {
    let canonical_id = resolve_group_id(client, &alias.group).await?;
    let mount_accessor = resolve_mount_accessor(client, &alias.mountpath).await?;

    let body = json!({
        "name": alias.name,
        "mount_accessor": mount_accessor,
        "canonical_id": canonical_id,
    });

    match find_existing_alias_id(client, &alias.name).await? {
        Some(id) => {
            client.write(&format!("identity/group-alias/id/{id}"), body).await?;
            info!(name = %alias.name, "tuned group-alias");
        }
        None => {
            client.write("identity/group-alias", body).await?;
            info!(name = %alias.name, "created group-alias");
        }
    }
    Ok(())
}

async fn resolve_group_id<C: SealedStoreApi>(client: &C, group_name: &str) -> Result<String, ReconcileError> {
    let data = client
        .read(&format!("identity/group/name/{group_name}"))
        .await?
        .ok_or_else(|| {
            ReconcileError::Config(format!("group-alias references unknown group '{group_name}'"))
        })?;
    data.get("id")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| ReconcileError::Config(format!("group '{group_name}' has no canonical id")))
}

async fn resolve_mount_accessor<C: SealedStoreApi>(client: &C, mountpath: &str) -> Result<String, ReconcileError> {
    let normalized = normalize(mountpath);
    let mounts = client.list_auth().await?;
    mounts
        .get(&normalized)
        .map(|entry| entry.accessor.clone())
        .ok_or_else(|| ReconcileError::Config(format!("group-alias references unmounted auth path '{normalized}'")))
}

async fn find_existing_alias_id<C: SealedStoreApi>(client: &C, name: &str) -> Result<Option<String>, ReconcileError> {
    let ids = client.list("identity/group-alias/id").await?;
    for id in ids {
        let Some(data) = client.read(&format!("identity/group-alias/id/{id}")).await? else {
            continue;
        };
        if data.get("name").and_then(|v| v.as_str()) == Some(name) {
            return Ok(Some(id));
        }
    }
    Ok(None)
}
