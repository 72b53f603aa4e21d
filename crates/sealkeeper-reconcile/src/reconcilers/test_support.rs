//! A recording/stub `SealedStoreApi` implementation shared by the
//! per-section reconciler unit tests.
//!
//! Every call is appended to an ordered log (`calls()`), and every `write`
//! is additionally captured as a `(path, body)` pair (`writes()`) so tests
//! can assert both call ordering and payload shape without standing up a
//! real server.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sealkeeper_client::{
    AuditMountEntry, AuthMountEntry, ClientError, CreateTokenRequest, EnableAuthRequest,
    HealthStatus, InitRequest, InitResponse, InitStatus, LeaderStatus, MountConfigInput,
    MountEntry, RegisterPluginRequest, SealStatus, SealedStoreApi, UnsealResponse,
};
use serde_json::Value;

#[derive(Default)]
struct State {
    calls: Vec<String>,
    writes: Vec<(String, Value)>,
    mount_calls: Vec<(String, MountConfigInput)>,
    tune_calls: Vec<(String, MountConfigInput)>,
    auth_mounts: HashMap<String, AuthMountEntry>,
    secret_mounts: HashMap<String, MountEntry>,
    audit_mounts: HashMap<String, AuditMountEntry>,
    plugins: Vec<String>,
    reads: HashMap<String, Option<Value>>,
    lists: HashMap<String, Vec<String>>,
    write_errors: HashMap<String, (u16, String)>,
    enable_audit_errors: HashMap<String, (u16, String)>,
    token: Option<String>,
}

#[derive(Default)]
pub(crate) struct RecordingClient {
    state: Mutex<State>,
}

impl RecordingClient {
    pub(crate) fn with_auth_mounts(mounts: impl IntoIterator<Item = (String, AuthMountEntry)>) -> Self {
        let client = Self::default();
        client.state.lock().expect("lock").auth_mounts = mounts.into_iter().collect();
        client
    }

    pub(crate) fn with_secret_mounts(mounts: impl IntoIterator<Item = (String, MountEntry)>) -> Self {
        let client = Self::default();
        client.state.lock().expect("lock").secret_mounts = mounts.into_iter().collect();
        client
    }

    pub(crate) fn with_plugins(plugins: impl IntoIterator<Item = String>) -> Self {
        let client = Self::default();
        client.state.lock().expect("lock").plugins = plugins.into_iter().collect();
        client
    }

    pub(crate) fn with_audit_mounts(mounts: impl IntoIterator<Item = (String, AuditMountEntry)>) -> Self {
        let client = Self::default();
        client.state.lock().expect("lock").audit_mounts = mounts.into_iter().collect();
        client
    }

    /// Cause the next `enable_audit` for `path` to fail with an API error
    /// carrying `body` as its response text.
    pub(crate) fn seed_enable_audit_error(&self, path: &str, status: u16, body: &str) {
        self.state
            .lock()
            .expect("lock")
            .enable_audit_errors
            .insert(path.to_owned(), (status, body.to_owned()));
    }

    pub(crate) fn seed_read(&self, path: &str, value: Option<Value>) {
        self.state.lock().expect("lock").reads.insert(path.to_owned(), value);
    }

    pub(crate) fn seed_list(&self, path: &str, entries: Vec<String>) {
        self.state.lock().expect("lock").lists.insert(path.to_owned(), entries);
    }

    /// Cause the next `write` to `path` to fail with an API error carrying
    /// `body` as its response text, e.g. the immutable-endpoint signal.
    pub(crate) fn seed_write_error(&self, path: &str, status: u16, body: &str) {
        self.state
            .lock()
            .expect("lock")
            .write_errors
            .insert(path.to_owned(), (status, body.to_owned()));
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().expect("lock").calls.clone()
    }

    pub(crate) fn writes(&self) -> Vec<(String, Value)> {
        self.state.lock().expect("lock").writes.clone()
    }

    pub(crate) fn mount_calls(&self) -> Vec<(String, MountConfigInput)> {
        self.state.lock().expect("lock").mount_calls.clone()
    }

    pub(crate) fn tune_calls(&self) -> Vec<(String, MountConfigInput)> {
        self.state.lock().expect("lock").tune_calls.clone()
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.state.lock().expect("lock").token.clone()
    }
}

#[async_trait]
impl SealedStoreApi for RecordingClient {
    async fn seal_status(&self) -> Result<SealStatus, ClientError> {
        self.state.lock().expect("lock").calls.push("seal_status".to_owned());
        Ok(SealStatus {
            sealed: false,
            initialized: true,
            t: 0,
            n: 0,
            progress: 0,
        })
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.state.lock().expect("lock").calls.push("health".to_owned());
        Ok(HealthStatus {
            initialized: true,
            sealed: false,
            standby: false,
        })
    }

    async fn leader(&self) -> Result<LeaderStatus, ClientError> {
        self.state.lock().expect("lock").calls.push("leader".to_owned());
        Ok(LeaderStatus {
            is_leader: false,
            leader_address: String::new(),
        })
    }

    async fn init_status(&self) -> Result<InitStatus, ClientError> {
        self.state.lock().expect("lock").calls.push("init_status".to_owned());
        Ok(InitStatus { initialized: true })
    }

    async fn init(&self, _request: InitRequest) -> Result<InitResponse, ClientError> {
        self.state.lock().expect("lock").calls.push("init".to_owned());
        Ok(InitResponse {
            keys: Vec::new(),
            recovery_keys: Vec::new(),
            root_token: String::new(),
        })
    }

    async fn unseal(&self, _share: &str) -> Result<UnsealResponse, ClientError> {
        self.state.lock().expect("lock").calls.push("unseal".to_owned());
        Ok(UnsealResponse {
            sealed: false,
            progress: 0,
        })
    }

    async fn step_down(&self) -> Result<(), ClientError> {
        self.state.lock().expect("lock").calls.push("step_down".to_owned());
        Ok(())
    }

    async fn set_token(&self, token: &str) {
        let mut state = self.state.lock().expect("lock");
        state.calls.push("set_token".to_owned());
        state.token = Some(token.to_owned());
    }

    async fn clear_token(&self) {
        let mut state = self.state.lock().expect("lock");
        state.calls.push("clear_token".to_owned());
        state.token = None;
    }

    async fn create_orphan_token(&self, _request: CreateTokenRequest) -> Result<(), ClientError> {
        self.state.lock().expect("lock").calls.push("create_orphan_token".to_owned());
        Ok(())
    }

    async fn revoke_token(&self, _token: &str) -> Result<(), ClientError> {
        self.state.lock().expect("lock").calls.push("revoke_token".to_owned());
        Ok(())
    }

    async fn list_auth(&self) -> Result<HashMap<String, AuthMountEntry>, ClientError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push("list_auth".to_owned());
        Ok(state.auth_mounts.clone())
    }

    async fn enable_auth(&self, path: &str, _opts: EnableAuthRequest) -> Result<(), ClientError> {
        self.state.lock().expect("lock").calls.push(format!("enable_auth:{path}"));
        Ok(())
    }

    async fn put_policy(&self, name: &str, _rules: &str) -> Result<(), ClientError> {
        self.state.lock().expect("lock").calls.push(format!("put_policy:{name}"));
        Ok(())
    }

    async fn list_mounts(&self) -> Result<HashMap<String, MountEntry>, ClientError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push("list_mounts".to_owned());
        Ok(state.secret_mounts.clone())
    }

    async fn mount(&self, path: &str, config: MountConfigInput) -> Result<(), ClientError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push(format!("mount:{path}"));
        state.mount_calls.push((path.to_owned(), config));
        Ok(())
    }

    async fn tune_mount(&self, path: &str, config: MountConfigInput) -> Result<(), ClientError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push(format!("tune_mount:{path}"));
        state.tune_calls.push((path.to_owned(), config));
        Ok(())
    }

    async fn list_plugins(&self) -> Result<Vec<String>, ClientError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push("list_plugins".to_owned());
        Ok(state.plugins.clone())
    }

    async fn register_plugin(
        &self,
        _plugin_type: &str,
        name: &str,
        _request: RegisterPluginRequest,
    ) -> Result<(), ClientError> {
        self.state.lock().expect("lock").calls.push(format!("register_plugin:{name}"));
        Ok(())
    }

    async fn list_audit(&self) -> Result<HashMap<String, AuditMountEntry>, ClientError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push("list_audit".to_owned());
        Ok(state.audit_mounts.clone())
    }

    async fn enable_audit(&self, path: &str, _options: Value) -> Result<(), ClientError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push(format!("enable_audit:{path}"));
        if let Some((status, body)) = state.enable_audit_errors.get(path).cloned() {
            return Err(ClientError::Api {
                path: path.to_owned(),
                status,
                body,
            });
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Value>, ClientError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push(format!("read:{path}"));
        Ok(state.reads.get(path).cloned().flatten())
    }

    async fn write(&self, path: &str, body: Value) -> Result<(), ClientError> {
        let mut state = self.state.lock().expect("lock");
        if let Some((status, err_body)) = state.write_errors.get(path).cloned() {
            state.calls.push(format!("write:{path}"));
            return Err(ClientError::Api {
                path: path.to_owned(),
                status,
                body: err_body,
            });
        }
        state.calls.push(format!("write:{path}"));
        state.writes.push((path.to_owned(), body));
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, ClientError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push(format!("list:{path}"));
        Ok(state.lists.get(path).cloned().unwrap_or_default())
    }
}
