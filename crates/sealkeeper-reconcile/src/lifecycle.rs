//! Init/unseal state machine.
//!
//! Brings a sealed-store server from `uninitialized` through `initialized`
//! and `sealed` to `active`, persisting unseal shares, recovery shares, and
//! the root token to a [`Keystore`] along the way. Restartable: calling
//! [`LifecycleManager::init`] against an already-initialized server
//! short-circuits straight to the unseal loop, and unsealing an
//! already-unsealed server is a no-op.

use std::sync::Arc;
use std::time::Duration;

use sealkeeper_client::{CreateTokenRequest, InitRequest, SealedStoreApi};
use sealkeeper_keystore::{Keystore, KeystoreError};
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::error::LifecycleError;

const ROOT_TOKEN_KEY: &str = "vault-root";
const ROOT_TOKEN_POLICY: &str = "root";
const ROOT_TOKEN_DISPLAY_NAME: &str = "root-token";

fn unseal_key(index: u32) -> String {
    format!("vault-unseal-{index}")
}

fn recovery_key(index: u32) -> String {
    format!("vault-recovery-{index}")
}

/// Immutable parameters for a single init attempt.
#[derive(Debug, Clone)]
pub struct InitConfig {
    pub secret_shares: u8,
    pub secret_threshold: u8,
    /// Recovery-key shares. `0` means "mirror `secret_shares`".
    pub recovery_shares: u8,
    /// Recovery-key threshold. `0` means "mirror `secret_threshold`".
    pub recovery_threshold: u8,
    /// When set, the server-issued root token is exchanged for this one.
    pub init_root_token: Option<String>,
    /// If `false` and no override is supplied, the server-issued root token
    /// is logged as a warning rather than persisted.
    pub store_root_token: bool,
    /// If `true`, a keystore round-trip is verified before init begins.
    pub preflight_checks: bool,
}

impl InitConfig {
    /// Validate shares/threshold before any I/O is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidConfig`] if `secret_threshold` is
    /// zero or exceeds `secret_shares`.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.secret_threshold == 0 || self.secret_shares < self.secret_threshold {
            return Err(LifecycleError::InvalidConfig {
                shares: self.secret_shares,
                threshold: self.secret_threshold,
            });
        }
        let (recovery_shares, recovery_threshold) = self.effective_recovery();
        if recovery_threshold == 0 || recovery_shares < recovery_threshold {
            return Err(LifecycleError::InvalidConfig {
                shares: recovery_shares,
                threshold: recovery_threshold,
            });
        }
        Ok(())
    }

    /// Recovery shares/threshold, falling back to the unseal-share
    /// parameters when left at `0`.
    fn effective_recovery(&self) -> (u8, u8) {
        let shares = if self.recovery_shares == 0 {
            self.secret_shares
        } else {
            self.recovery_shares
        };
        let threshold = if self.recovery_threshold == 0 {
            self.secret_threshold
        } else {
            self.recovery_threshold
        };
        (shares, threshold)
    }
}

/// Drives a single server through init and unseal.
pub struct LifecycleManager<C, K> {
    client: Arc<C>,
    keystore: Arc<K>,
    config: InitConfig,
}

impl<C, K> LifecycleManager<C, K>
where
    C: SealedStoreApi,
    K: Keystore,
{
    /// Build a manager. Validates `config` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidConfig`] if `config` is invalid.
    pub fn new(client: Arc<C>, keystore: Arc<K>, config: InitConfig) -> Result<Self, LifecycleError> {
        config.validate()?;
        Ok(Self {
            client,
            keystore,
            config,
        })
    }

    /// Run the init/unseal sequence to completion.
    ///
    /// If the server is already initialized this short-circuits to
    /// [`LifecycleManager::unseal`].
    ///
    /// # Errors
    ///
    /// See [`LifecycleError`] variants.
    pub async fn init(&self) -> Result<(), LifecycleError> {
        let status = self.client.init_status().await?;
        if status.initialized {
            info!("server already initialized, proceeding to unseal");
            return self.unseal().await;
        }

        if self.config.preflight_checks {
            self.keystore.test().await.map_err(LifecycleError::Preflight)?;
        }

        self.dedup_check().await?;

        let (recovery_shares, recovery_threshold) = self.config.effective_recovery();
        let request = InitRequest {
            secret_shares: self.config.secret_shares,
            secret_threshold: self.config.secret_threshold,
            recovery_shares,
            recovery_threshold,
        };
        let response = self.client.init(request).await?;

        for (i, share) in response.keys.iter().enumerate() {
            let i = u32::try_from(i).unwrap_or(u32::MAX);
            self.keystore.create(&unseal_key(i), share.as_bytes()).await?;
        }
        for (i, share) in response.recovery_keys.iter().enumerate() {
            let i = u32::try_from(i).unwrap_or(u32::MAX);
            self.keystore
                .create(&recovery_key(i), share.as_bytes())
                .await?;
        }

        self.handle_root_token(&response.root_token).await?;

        self.unseal().await
    }

    /// Every `vault-root`/`vault-unseal-<i>` key (for `i` in `0..=shares`)
    /// must be absent before init proceeds.
    async fn dedup_check(&self) -> Result<(), LifecycleError> {
        let mut keys_to_check = vec![ROOT_TOKEN_KEY.to_owned()];
        for i in 0..=u32::from(self.config.secret_shares) {
            keys_to_check.push(unseal_key(i));
        }

        for key in keys_to_check {
            match self.keystore.get(&key).await {
                Err(KeystoreError::NotFound { .. }) => {}
                Ok(_) => return Err(LifecycleError::ResidualState { key }),
                Err(other) => return Err(LifecycleError::Keystore(other)),
            }
        }
        Ok(())
    }

    async fn handle_root_token(&self, server_issued_token: &str) -> Result<(), LifecycleError> {
        self.client.set_token(server_issued_token).await;

        let mut effective_token = if let Some(override_token) = &self.config.init_root_token {
            if !override_token.is_empty() {
                self.client
                    .create_orphan_token(CreateTokenRequest {
                        id: override_token.clone(),
                        policies: vec![ROOT_TOKEN_POLICY.to_owned()],
                        display_name: ROOT_TOKEN_DISPLAY_NAME.to_owned(),
                        no_parent: true,
                    })
                    .await?;
                self.client.revoke_token(server_issued_token).await?;
                override_token.clone()
            } else {
                server_issued_token.to_owned()
            }
        } else {
            server_issued_token.to_owned()
        };

        if self.config.store_root_token {
            self.keystore
                .create(ROOT_TOKEN_KEY, effective_token.as_bytes())
                .await?;
        } else if self.config.init_root_token.as_deref().unwrap_or_default().is_empty() {
            warn!(root_token = %effective_token, "root token was not persisted to the keystore");
        }

        effective_token.zeroize();
        self.client.clear_token().await;
        Ok(())
    }

    /// Submit unseal shares from the keystore until the server reports
    /// `sealed = false`.
    ///
    /// Already-unsealed servers short-circuit to a no-op. A share whose
    /// submission leaves the server both sealed and with a reset progress
    /// counter is treated as rejected.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidShare`] if a submitted share is
    /// rejected, or the underlying client/keystore error otherwise.
    pub async fn unseal(&self) -> Result<(), LifecycleError> {
        let status = self.client.seal_status().await?;
        if !status.sealed {
            info!("server already unsealed");
            return Ok(());
        }

        let mut index: u32 = 0;
        loop {
            let key = unseal_key(index);
            let share_bytes = self.keystore.get(&key).await?;
            let share = String::from_utf8(share_bytes).map_err(|_| LifecycleError::Keystore(
                KeystoreError::Malformed {
                    key: key.clone(),
                    reason: "unseal share was not valid UTF-8".to_owned(),
                },
            ))?;

            let response = self.client.unseal(&share).await?;
            if !response.sealed {
                info!(shares_submitted = index + 1, "server unsealed");
                return Ok(());
            }
            if response.progress == 0 {
                return Err(LifecycleError::InvalidShare { index });
            }
            index += 1;
        }
    }
}

/// Step a node down from Raft leadership.
///
/// Fetches `vault-root` from `keystore`, installs it on `client`, invokes
/// `step_down`, and scrubs the token on every exit path.
///
/// # Errors
///
/// Returns the underlying client or keystore error.
pub async fn step_down<C, K>(client: &C, keystore: &K) -> Result<(), LifecycleError>
where
    C: SealedStoreApi,
    K: Keystore,
{
    let token_bytes = keystore.get(ROOT_TOKEN_KEY).await?;
    let mut token = String::from_utf8(token_bytes).map_err(|_| {
        LifecycleError::Keystore(KeystoreError::Malformed {
            key: ROOT_TOKEN_KEY.to_owned(),
            reason: "stored root token was not valid UTF-8".to_owned(),
        })
    })?;

    client.set_token(&token).await;
    token.zeroize();
    let result = client.step_down().await;
    client.clear_token().await;
    result.map_err(LifecycleError::Client)
}

/// Retry [`LifecycleManager::init`] forever with a fixed backoff, for
/// callers that want "keep trying until the server comes up" behavior
/// around an otherwise one-shot API.
pub async fn run_forever<C, K>(manager: &LifecycleManager<C, K>, retry_interval: Duration)
where
    C: SealedStoreApi,
    K: Keystore,
{
    loop {
        match manager.init().await {
            Ok(()) => {
                info!("lifecycle manager reached active state");
                return;
            }
            Err(err) => {
                warn!(error = %err, "init/unseal attempt failed, retrying");
                tokio::time::sleep(retry_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sealkeeper_client::{
        AuditMountEntry, AuthMountEntry, ClientError, EnableAuthRequest, HealthStatus,
        InitResponse, InitStatus, LeaderStatus, MountConfigInput, MountEntry,
        RegisterPluginRequest, SealStatus, UnsealResponse,
    };
    use sealkeeper_keystore::MemoryKeystore;
    use serde_json::Value;

    use super::*;

    #[derive(Default)]
    struct StubState {
        initialized: bool,
        sealed: bool,
        unseal_progress: u8,
        unseal_threshold: u8,
        rejects_share_at: Option<u32>,
        shares_submitted: u32,
        init_response: Option<InitResponse>,
        token: Option<String>,
    }

    /// A minimal stand-in server used only to drive [`LifecycleManager`]
    /// through init/unseal transitions — it does not implement any of the
    /// reconciler-facing endpoints beyond returning empty/default values.
    #[derive(Default)]
    struct StubServer {
        state: Mutex<StubState>,
    }

    impl StubServer {
        fn uninitialized(shares: u8, threshold: u8, root_token: &str) -> Self {
            let keys = (0..shares).map(|i| format!("unseal-share-{i}")).collect();
            let recovery_keys = (0..shares).map(|i| format!("recovery-share-{i}")).collect();
            Self {
                state: Mutex::new(StubState {
                    initialized: false,
                    sealed: true,
                    unseal_threshold: threshold,
                    init_response: Some(InitResponse {
                        keys,
                        recovery_keys,
                        root_token: root_token.to_owned(),
                    }),
                    ..Default::default()
                }),
            }
        }

        fn already_initialized() -> Self {
            Self {
                state: Mutex::new(StubState {
                    initialized: true,
                    sealed: false,
                    ..Default::default()
                }),
            }
        }

        /// After this index's share has already been accepted once, the next
        /// submission of it is rejected (progress resets to 0).
        fn rejecting_share_at(shares: u8, threshold: u8, root_token: &str, index: u32) -> Self {
            let server = Self::uninitialized(shares, threshold, root_token);
            server.state.lock().expect("lock").rejects_share_at = Some(index);
            server
        }
    }

    #[async_trait]
    impl SealedStoreApi for StubServer {
        async fn seal_status(&self) -> Result<SealStatus, ClientError> {
            let state = self.state.lock().expect("lock");
            Ok(SealStatus {
                sealed: state.sealed,
                initialized: state.initialized,
                t: u32::from(state.unseal_threshold),
                n: u32::from(state.unseal_threshold),
                progress: u32::from(state.unseal_progress),
            })
        }

        async fn health(&self) -> Result<HealthStatus, ClientError> {
            let state = self.state.lock().expect("lock");
            Ok(HealthStatus {
                initialized: state.initialized,
                sealed: state.sealed,
                standby: false,
            })
        }

        async fn leader(&self) -> Result<LeaderStatus, ClientError> {
            Ok(LeaderStatus {
                is_leader: false,
                leader_address: String::new(),
            })
        }

        async fn init_status(&self) -> Result<InitStatus, ClientError> {
            let state = self.state.lock().expect("lock");
            Ok(InitStatus {
                initialized: state.initialized,
            })
        }

        async fn init(&self, _request: InitRequest) -> Result<InitResponse, ClientError> {
            let mut state = self.state.lock().expect("lock");
            state.initialized = true;
            Ok(state.init_response.clone().unwrap_or(InitResponse {
                keys: Vec::new(),
                recovery_keys: Vec::new(),
                root_token: String::new(),
            }))
        }

        async fn unseal(&self, _share: &str) -> Result<UnsealResponse, ClientError> {
            let mut state = self.state.lock().expect("lock");
            let submitted = state.shares_submitted;
            state.shares_submitted += 1;

            if state.rejects_share_at == Some(submitted) {
                state.unseal_progress = 0;
                return Ok(UnsealResponse {
                    sealed: true,
                    progress: 0,
                });
            }

            state.unseal_progress += 1;
            if state.unseal_progress >= state.unseal_threshold {
                state.sealed = false;
                return Ok(UnsealResponse {
                    sealed: false,
                    progress: u32::from(state.unseal_progress),
                });
            }
            Ok(UnsealResponse {
                sealed: true,
                progress: u32::from(state.unseal_progress),
            })
        }

        async fn step_down(&self) -> Result<(), ClientError> {
            Ok(())
        }

        async fn set_token(&self, token: &str) {
            self.state.lock().expect("lock").token = Some(token.to_owned());
        }

        async fn clear_token(&self) {
            self.state.lock().expect("lock").token = None;
        }

        async fn create_orphan_token(&self, _request: CreateTokenRequest) -> Result<(), ClientError> {
            Ok(())
        }

        async fn revoke_token(&self, _token: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn list_auth(&self) -> Result<HashMap<String, AuthMountEntry>, ClientError> {
            Ok(HashMap::new())
        }

        async fn enable_auth(&self, _path: &str, _opts: EnableAuthRequest) -> Result<(), ClientError> {
            Ok(())
        }

        async fn put_policy(&self, _name: &str, _rules: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn list_mounts(&self) -> Result<HashMap<String, MountEntry>, ClientError> {
            Ok(HashMap::new())
        }

        async fn mount(&self, _path: &str, _config: MountConfigInput) -> Result<(), ClientError> {
            Ok(())
        }

        async fn tune_mount(&self, _path: &str, _config: MountConfigInput) -> Result<(), ClientError> {
            Ok(())
        }

        async fn list_plugins(&self) -> Result<Vec<String>, ClientError> {
            Ok(Vec::new())
        }

        async fn register_plugin(
            &self,
            _plugin_type: &str,
            _name: &str,
            _request: RegisterPluginRequest,
        ) -> Result<(), ClientError> {
            Ok(())
        }

        async fn list_audit(&self) -> Result<HashMap<String, AuditMountEntry>, ClientError> {
            Ok(HashMap::new())
        }

        async fn enable_audit(&self, _path: &str, _options: Value) -> Result<(), ClientError> {
            Ok(())
        }

        async fn read(&self, _path: &str) -> Result<Option<Value>, ClientError> {
            Ok(None)
        }

        async fn write(&self, _path: &str, _body: Value) -> Result<(), ClientError> {
            Ok(())
        }

        async fn list(&self, _path: &str) -> Result<Vec<String>, ClientError> {
            Ok(Vec::new())
        }
    }

    fn config(shares: u8, threshold: u8) -> InitConfig {
        InitConfig {
            secret_shares: shares,
            secret_threshold: threshold,
            recovery_shares: 0,
            recovery_threshold: 0,
            init_root_token: None,
            store_root_token: true,
            preflight_checks: false,
        }
    }

    #[test]
    fn share_threshold_validation_rejects_before_any_io() {
        let err = config(2, 3).validate().unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn fresh_init_persists_every_share_and_the_root_token() {
        let server = Arc::new(StubServer::uninitialized(5, 3, "s.server-issued"));
        let keystore = Arc::new(MemoryKeystore::new());
        let manager = LifecycleManager::new(Arc::clone(&server), Arc::clone(&keystore), config(5, 3)).unwrap();

        manager.init().await.unwrap();

        for i in 0..5 {
            assert!(keystore.exists(&format!("vault-unseal-{i}")).await.unwrap());
            assert!(keystore.exists(&format!("vault-recovery-{i}")).await.unwrap());
        }
        assert_eq!(
            keystore.get("vault-root").await.unwrap(),
            b"s.server-issued".to_vec()
        );
    }

    #[tokio::test]
    async fn init_is_idempotent_against_an_already_initialized_server() {
        let server = Arc::new(StubServer::already_initialized());
        let keystore = Arc::new(MemoryKeystore::new());
        let manager = LifecycleManager::new(server, keystore, config(3, 2)).unwrap();

        manager.init().await.unwrap();
        manager.init().await.unwrap();
    }

    #[tokio::test]
    async fn dedup_check_refuses_to_overwrite_residual_state() {
        let server = Arc::new(StubServer::uninitialized(3, 2, "s.server-issued"));
        let keystore = Arc::new(MemoryKeystore::new());
        keystore.set("vault-root", b"s.stale").await.unwrap();
        let manager = LifecycleManager::new(server, keystore, config(3, 2)).unwrap();

        let err = manager.init().await.unwrap_err();
        assert!(matches!(err, LifecycleError::ResidualState { .. }));
    }

    #[tokio::test]
    async fn unseal_stops_after_the_threshold_number_of_shares() {
        let server = Arc::new(StubServer::uninitialized(5, 3, "s.server-issued"));
        let keystore = Arc::new(MemoryKeystore::new());
        for i in 0..3u32 {
            keystore
                .set(&format!("vault-unseal-{i}"), format!("share-{i}").as_bytes())
                .await
                .unwrap();
        }
        let manager = LifecycleManager::new(server, keystore, config(5, 3)).unwrap();

        manager.unseal().await.unwrap();
    }

    #[tokio::test]
    async fn a_rejected_share_surfaces_as_invalid_share_without_looping_further() {
        let server = Arc::new(StubServer::rejecting_share_at(5, 3, "s.server-issued", 0));
        let keystore = Arc::new(MemoryKeystore::new());
        for i in 0..5u32 {
            keystore
                .set(&format!("vault-unseal-{i}"), format!("share-{i}").as_bytes())
                .await
                .unwrap();
        }
        let manager = LifecycleManager::new(server, keystore, config(5, 3)).unwrap();

        let err = manager.unseal().await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidShare { index: 0 }));
    }
}
