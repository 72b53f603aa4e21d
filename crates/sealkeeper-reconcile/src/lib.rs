//! Idempotent init/unseal state machine and declarative-config reconciler
//! for a sealed secret-store server.
//!
//! [`lifecycle::LifecycleManager`] brings a server from uninitialized
//! through unsealed to active, persisting unseal shares, recovery shares,
//! and the root token to a [`sealkeeper_keystore::Keystore`]. Once a server
//! is active, [`dispatch::configure`] applies a declarative [`config::Config`]
//! document against it: auth methods, policies, plugins, secret engines,
//! audit devices, startup secrets, and identity groups, in that fixed order.
//!
//! Both halves are written against [`sealkeeper_client::SealedStoreApi`]
//! rather than the concrete HTTP client, so they can be driven in tests
//! against an in-process recording implementation instead of a live server.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod reconcilers;
pub mod util;

pub use config::Config;
pub use dispatch::configure;
pub use error::{LifecycleError, ReconcileError};
pub use lifecycle::{step_down, InitConfig, LifecycleManager};
