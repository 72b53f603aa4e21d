//! Startup-secrets section: one-shot writes into already-mounted secret
//! engines. Only `type: kv` is recognized; anything else is a config error
//! caught here rather than silently ignored, matching the document shape's
//! stated contract.

use sealkeeper_client::SealedStoreApi;
use serde_json::Value;
use tracing::info;

use crate::config::StartupSecret;
use crate::error::ReconcileError;

const SUPPORTED_TYPE: &str = "kv";

/// Write every configured `kv`-typed startup secret, in document order.
///
/// # Errors
///
/// Returns a config error for any entry whose `type` is not `kv`, or the
/// first client error.
pub async fn reconcile<C: SealedStoreApi>(client: &C, secrets: &[StartupSecret]) -> Result<(), ReconcileError> {
    for secret in secrets {
        if secret.secret_type != SUPPORTED_TYPE {
            return Err(ReconcileError::Config(format!(
                "unsupported startup secret type '{}' at path '{}', only 'kv' is recognized",
                secret.secret_type, secret.path
            )));
        }
        client
            .write(&secret.path, Value::Object(secret.data.clone()))
            .await?;
        info!(path = %secret.path, "wrote startup secret");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::reconcilers::test_support::RecordingClient;

    #[tokio::test]
    async fn kv_secret_is_written_as_is() {
        let client = RecordingClient::default();
        let secret = StartupSecret {
            secret_type: "kv".to_owned(),
            path: "secret/data/bootstrap".to_owned(),
            data: serde_json::Map::from_iter([("password".to_owned(), json!("hunter2"))]),
        };
        reconcile(&client, &[secret]).await.unwrap();

        let writes = client.writes();
        assert_eq!(writes[0].0, "secret/data/bootstrap");
        assert_eq!(writes[0].1, json!({ "password": "hunter2" }));
    }

    #[tokio::test]
    async fn unsupported_type_is_fatal() {
        let client = RecordingClient::default();
        let secret = StartupSecret {
            secret_type: "transit".to_owned(),
            path: "transit/keys/x".to_owned(),
            data: serde_json::Map::new(),
        };
        let err = reconcile(&client, &[secret]).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
        assert!(client.writes().is_empty());
    }
}
