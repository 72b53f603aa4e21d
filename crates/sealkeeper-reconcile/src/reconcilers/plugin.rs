//! Plugin-catalog section: registers every configured plugin binary
//! unconditionally. The server itself treats a re-register as idempotent
//! when the SHA256 matches the already-catalogued entry, and rejects it as
//! an error when it doesn't — this reconciler does not attempt to shadow
//! that check with its own catalog lookup first.

use sealkeeper_client::{RegisterPluginRequest, SealedStoreApi};
use tracing::info;

use crate::config::PluginConfig;
use crate::error::ReconcileError;

/// Register every configured plugin, in document order.
///
/// # Errors
///
/// Returns the first client error (including a SHA256 mismatch against an
/// already-catalogued plugin of the same name, which the server rejects).
pub async fn reconcile<C: SealedStoreApi>(client: &C, plugins: &[PluginConfig]) -> Result<(), ReconcileError> {
    for plugin in plugins {
        client
            .register_plugin(
                &plugin.plugin_type,
                &plugin.plugin_name,
                RegisterPluginRequest {
                    command: plugin.command.clone(),
                    args: plugin.args.clone(),
                    sha256: plugin.sha256.clone(),
                },
            )
            .await?;
        info!(name = %plugin.plugin_name, plugin_type = %plugin.plugin_type, "registered plugin");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcilers::test_support::RecordingClient;

    fn plugin(name: &str) -> PluginConfig {
        PluginConfig {
            plugin_name: name.to_owned(),
            plugin_type: "secret".to_owned(),
            command: "my-plugin".to_owned(),
            args: Vec::new(),
            sha256: "deadbeef".to_owned(),
        }
    }

    #[tokio::test]
    async fn already_registered_plugin_is_registered_again_unconditionally() {
        let client = RecordingClient::with_plugins(["my-plugin".to_owned()]);
        reconcile(&client, &[plugin("my-plugin")]).await.unwrap();
        assert!(client.calls().iter().any(|c| c == "register_plugin:my-plugin"));
    }

    #[tokio::test]
    async fn unregistered_plugin_is_registered() {
        let client = RecordingClient::default();
        reconcile(&client, &[plugin("my-plugin")]).await.unwrap();
        assert!(client.calls().iter().any(|c| c == "register_plugin:my-plugin"));
    }

    #[tokio::test]
    async fn plugins_register_in_document_order() {
        let client = RecordingClient::default();
        reconcile(&client, &[plugin("a"), plugin("b")]).await.unwrap();

        let calls = client.calls();
        let a_idx = calls.iter().position(|c| c == "register_plugin:a").unwrap();
        let b_idx = calls.iter().position(|c| c == "register_plugin:b").unwrap();
        assert!(a_idx < b_idx);
    }

    #[tokio::test]
    async fn empty_plugin_list_makes_no_calls() {
        let client = RecordingClient::default();
        reconcile(&client, &[]).await.unwrap();
        assert!(client.calls().is_empty());
    }
}
