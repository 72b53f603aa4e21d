//! `reqwest`-based implementation of [`SealedStoreApi`].

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::api::SealedStoreApi;
use crate::error::ClientError;
use crate::types::{
    AuditMountEntry, AuthMountEntry, CreateTokenRequest, EnableAuthRequest, HealthStatus,
    InitRequest, InitResponse, InitStatus, LeaderStatus, MountConfigInput, MountEntry,
    RegisterPluginRequest, SealStatus, UnsealResponse,
};

const TOKEN_HEADER: &str = "X-Vault-Token";
const DEFAULT_MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// A `reqwest`-backed client for the sealed-store server's REST API.
///
/// Holds a single mutable auth token behind an `RwLock`. The reconciler owns
/// this client exclusively for the duration of a run and is expected to call
/// [`Client::clear_token`] on every exit path — success or failure. Transient
/// failures (connection errors, 429/5xx responses) are retried a bounded
/// number of times with jittered exponential backoff before surfacing to the
/// caller.
pub struct Client {
    http: reqwest::Client,
    addr: String,
    token: RwLock<Option<String>>,
    max_retries: u32,
}

impl Client {
    /// Build a client bound to `addr` (e.g. `https://vault.internal:8200`) with
    /// no token installed.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            addr: addr.into(),
            token: RwLock::new(None),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.addr.trim_end_matches('/'), path)
    }

    async fn token_header(&self) -> Result<String, ClientError> {
        self.token.read().await.clone().ok_or(ClientError::NoToken)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
        authenticated: bool,
    ) -> Result<T, ClientError> {
        let value = self.send_raw(method, path, body, authenticated).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Decode {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Issue one request, retrying transient failures with jittered backoff.
    ///
    /// A request is retried when the transport itself fails (connection
    /// reset, timeout, …) or the server answers with a retryable status
    /// (`429`, `500`, `502`, `503`, `504`). Any other status is returned
    /// immediately — retrying a `404` or `400` would just repeat the same
    /// answer.
    async fn send_raw(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
        authenticated: bool,
    ) -> Result<Value, ClientError> {
        let token = if authenticated {
            Some(self.token_header().await?)
        } else {
            None
        };

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            let mut req = self.http.request(method.clone(), self.url(path));
            if let Some(token) = &token {
                req = req.header(TOKEN_HEADER, token);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.map_err(|e| ClientError::Transport {
                        path: path.to_owned(),
                        reason: e.to_string(),
                    })?;

                    if status.is_success() {
                        if text.is_empty() {
                            return Ok(Value::Null);
                        }
                        return serde_json::from_str(&text).map_err(|e| ClientError::Decode {
                            path: path.to_owned(),
                            reason: e.to_string(),
                        });
                    }

                    let err = ClientError::Api {
                        path: path.to_owned(),
                        status: status.as_u16(),
                        body: text,
                    };
                    if attempt < self.max_retries && is_retryable(status) {
                        warn!(path = %path, status = status.as_u16(), attempt, "retrying after retryable response");
                        last_err = Some(err);
                        sleep_with_jitter(attempt).await;
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = ClientError::Transport {
                        path: path.to_owned(),
                        reason: e.to_string(),
                    };
                    if attempt < self.max_retries {
                        warn!(path = %path, attempt, "retrying after transport error");
                        last_err = Some(err);
                        sleep_with_jitter(attempt).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ClientError::Transport {
            path: path.to_owned(),
            reason: "exhausted retries".to_owned(),
        }))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

async fn sleep_with_jitter(attempt: u32) {
    #[allow(clippy::cast_possible_truncation)]
    let base = (RETRY_BASE_DELAY.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
    #[allow(clippy::cast_precision_loss)]
    let base_f = base as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let jitter = (base_f * 0.3 * rand_f64()) as u64;
    tokio::time::sleep(Duration::from_millis(base.saturating_add(jitter))).await;
}

/// Pseudo-random f64 in `[0, 1)` derived from the system clock — good enough
/// to spread out retries, not a cryptographic concern.
fn rand_f64() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

#[async_trait::async_trait]
impl SealedStoreApi for Client {
    async fn seal_status(&self) -> Result<SealStatus, ClientError> {
        self.send_json(reqwest::Method::GET, "sys/seal-status", None, false)
            .await
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.send_json(reqwest::Method::GET, "sys/health", None, false)
            .await
    }

    async fn leader(&self) -> Result<LeaderStatus, ClientError> {
        self.send_json(reqwest::Method::GET, "sys/leader", None, false)
            .await
    }

    async fn init_status(&self) -> Result<InitStatus, ClientError> {
        self.send_json(reqwest::Method::GET, "sys/init", None, false)
            .await
    }

    async fn init(&self, request: InitRequest) -> Result<InitResponse, ClientError> {
        let body = serde_json::to_value(&request).map_err(|e| ClientError::Decode {
            path: "sys/init".to_owned(),
            reason: e.to_string(),
        })?;
        self.send_json(reqwest::Method::PUT, "sys/init", Some(&body), false)
            .await
    }

    async fn unseal(&self, share: &str) -> Result<UnsealResponse, ClientError> {
        let body = serde_json::json!({ "key": share });
        self.send_json(reqwest::Method::PUT, "sys/unseal", Some(&body), false)
            .await
    }

    async fn step_down(&self) -> Result<(), ClientError> {
        self.send_raw(reqwest::Method::PUT, "sys/step-down", None, true)
            .await?;
        Ok(())
    }

    async fn set_token(&self, token: &str) {
        *self.token.write().await = Some(token.to_owned());
    }

    async fn clear_token(&self) {
        let mut guard = self.token.write().await;
        if let Some(mut old) = guard.take() {
            old.zeroize();
        }
        debug!("client token cleared");
    }

    async fn create_orphan_token(&self, request: CreateTokenRequest) -> Result<(), ClientError> {
        let body = serde_json::to_value(&request).map_err(|e| ClientError::Decode {
            path: "auth/token/create-orphan".to_owned(),
            reason: e.to_string(),
        })?;
        self.send_raw(
            reqwest::Method::POST,
            "auth/token/create-orphan",
            Some(&body),
            true,
        )
        .await?;
        Ok(())
    }

    async fn revoke_token(&self, token: &str) -> Result<(), ClientError> {
        let body = serde_json::json!({ "token": token });
        self.send_raw(
            reqwest::Method::POST,
            "auth/token/revoke",
            Some(&body),
            true,
        )
        .await?;
        Ok(())
    }

    async fn list_auth(&self) -> Result<HashMap<String, AuthMountEntry>, ClientError> {
        self.send_json(reqwest::Method::GET, "sys/auth", None, true)
            .await
    }

    async fn enable_auth(&self, path: &str, opts: EnableAuthRequest) -> Result<(), ClientError> {
        let body = serde_json::to_value(&opts).map_err(|e| ClientError::Decode {
            path: format!("sys/auth/{path}"),
            reason: e.to_string(),
        })?;
        self.send_raw(
            reqwest::Method::POST,
            &format!("sys/auth/{path}"),
            Some(&body),
            true,
        )
        .await?;
        Ok(())
    }

    async fn put_policy(&self, name: &str, rules: &str) -> Result<(), ClientError> {
        let body = serde_json::json!({ "policy": rules });
        self.send_raw(
            reqwest::Method::POST,
            &format!("sys/policy/{name}"),
            Some(&body),
            true,
        )
        .await?;
        Ok(())
    }

    async fn list_mounts(&self) -> Result<HashMap<String, MountEntry>, ClientError> {
        self.send_json(reqwest::Method::GET, "sys/mounts", None, true)
            .await
    }

    async fn mount(&self, path: &str, config: MountConfigInput) -> Result<(), ClientError> {
        let body = serde_json::to_value(&config).map_err(|e| ClientError::Decode {
            path: format!("sys/mounts/{path}"),
            reason: e.to_string(),
        })?;
        self.send_raw(
            reqwest::Method::POST,
            &format!("sys/mounts/{path}"),
            Some(&body),
            true,
        )
        .await?;
        Ok(())
    }

    async fn tune_mount(&self, path: &str, config: MountConfigInput) -> Result<(), ClientError> {
        let body = serde_json::to_value(&config).map_err(|e| ClientError::Decode {
            path: format!("sys/mounts/{path}/tune"),
            reason: e.to_string(),
        })?;
        self.send_raw(
            reqwest::Method::POST,
            &format!("sys/mounts/{path}/tune"),
            Some(&body),
            true,
        )
        .await?;
        Ok(())
    }

    async fn list_plugins(&self) -> Result<Vec<String>, ClientError> {
        #[derive(serde::Deserialize)]
        struct Catalog {
            #[serde(default)]
            names: Vec<String>,
        }
        let catalog: Catalog = self
            .send_json(reqwest::Method::GET, "sys/plugins/catalog", None, true)
            .await?;
        Ok(catalog.names)
    }

    async fn register_plugin(
        &self,
        plugin_type: &str,
        name: &str,
        request: RegisterPluginRequest,
    ) -> Result<(), ClientError> {
        let path = format!("sys/plugins/catalog/{plugin_type}/{name}");
        let body = serde_json::to_value(&request).map_err(|e| ClientError::Decode {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        self.send_raw(reqwest::Method::POST, &path, Some(&body), true)
            .await?;
        Ok(())
    }

    async fn list_audit(&self) -> Result<HashMap<String, AuditMountEntry>, ClientError> {
        self.send_json(reqwest::Method::GET, "sys/audit", None, true)
            .await
    }

    async fn enable_audit(&self, path: &str, options: Value) -> Result<(), ClientError> {
        self.send_raw(
            reqwest::Method::POST,
            &format!("sys/audit/{path}"),
            Some(&options),
            true,
        )
        .await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Value>, ClientError> {
        match self.send_raw(reqwest::Method::GET, path, None, true).await {
            Ok(value) => Ok(Some(value)),
            Err(ClientError::Api { status: 404, .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn write(&self, path: &str, body: Value) -> Result<(), ClientError> {
        self.send_raw(reqwest::Method::POST, path, Some(&body), true)
            .await?;
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, ClientError> {
        #[derive(serde::Deserialize, Default)]
        struct ListResponse {
            #[serde(default)]
            keys: Vec<String>,
        }
        let url = format!("{path}?list=true");
        let resp: ListResponse = match self
            .send_json(reqwest::Method::GET, &url, None, true)
            .await
        {
            Ok(resp) => resp,
            Err(ClientError::Api { status: 404, .. }) => ListResponse::default(),
            Err(other) => return Err(other),
        };
        Ok(resp.keys)
    }
}
