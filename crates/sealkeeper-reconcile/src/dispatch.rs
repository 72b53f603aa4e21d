//! Top-level `configure` dispatcher.

use sealkeeper_client::SealedStoreApi;
use sealkeeper_keystore::Keystore;
use tracing::info;
use zeroize::Zeroize;

use crate::config::Config;
use crate::error::ReconcileError;
use crate::reconcilers::{audit, auth, identity, plugin, policy, secret, startup};

const ROOT_TOKEN_KEY: &str = "vault-root";

/// Apply a declarative [`Config`] document against a running server.
///
/// Installs the root token read from `keystore` before the first section
/// runs, and scrubs it from `client` on every exit path, success or failure.
///
/// Sections run in a fixed order — auth methods, policies, plugins, secret
/// engines, audit devices, startup secrets, then identity groups/aliases —
/// so a policy referenced by an auth role exists before the role is
/// written, a secrets engine a startup secret targets is mounted before the
/// secret is written, and an auth mount a group-alias binds to already has
/// an accessor.
///
/// # Errors
///
/// Returns the first unrecovered error from any section. Sections do not
/// run concurrently, so state applied by earlier sections survives a later
/// section's failure.
pub async fn configure<C, K>(client: &C, keystore: &K, config: &Config) -> Result<(), ReconcileError>
where
    C: SealedStoreApi,
    K: Keystore,
{
    let token_bytes = keystore.get(ROOT_TOKEN_KEY).await?;
    let mut token = String::from_utf8(token_bytes)
        .map_err(|_| ReconcileError::Config("stored root token was not valid UTF-8".to_owned()))?;
    client.set_token(&token).await;
    token.zeroize();

    let result = run_sections(client, config).await;

    client.clear_token().await;
    result
}

async fn run_sections<C>(client: &C, config: &Config) -> Result<(), ReconcileError>
where
    C: SealedStoreApi,
{
    info!(count = config.auth.len(), "reconciling auth methods");
    auth::reconcile(client, &config.auth).await?;

    info!(count = config.policies.len(), "reconciling policies");
    policy::reconcile(client, &config.policies).await?;

    info!(count = config.plugins.len(), "reconciling plugins");
    plugin::reconcile(client, &config.plugins).await?;

    info!(count = config.secrets.len(), "reconciling secret engines");
    secret::reconcile(client, &config.secrets).await?;

    info!(count = config.audit.len(), "reconciling audit devices");
    audit::reconcile(client, &config.audit).await?;

    info!(
        count = config.startup_secrets.len(),
        "writing startup secrets"
    );
    startup::reconcile(client, &config.startup_secrets).await?;

    info!(
        groups = config.groups.len(),
        aliases = config.group_aliases.len(),
        "reconciling identity groups"
    );
    identity::reconcile(client, &config.groups, &config.group_aliases).await?;

    Ok(())
}
