//! Typed async client for a sealed secret-store server's REST API.
//!
//! The capability surface the reconciler depends on is expressed as the
//! [`SealedStoreApi`] trait rather than the concrete [`Client`] type, so
//! dispatcher-ordering and rotation-dedup tests can drive the reconciler
//! against an in-process recording implementation instead of a live server.

mod api;
mod error;
mod http;
mod types;

pub use api::SealedStoreApi;
pub use error::ClientError;
pub use http::Client;
pub use types::{
    AuditMountEntry, AuthMountEntry, CreateTokenRequest, EnableAuthRequest, HealthStatus,
    InitRequest, InitResponse, InitStatus, LeaderStatus, MountConfigInput, MountEntry,
    RegisterPluginRequest, SealStatus, UnsealResponse,
};
