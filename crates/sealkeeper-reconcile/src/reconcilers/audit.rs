//! Audit-device section.
//!
//! Audit devices are immutable once enabled — there's no tune endpoint —
//! so an already-enabled device is left untouched. A device left over from
//! a previous run that now conflicts with the requested options surfaces
//! the server's own "delete them before reconfiguring" signal, which is
//! tolerated and logged rather than treated as fatal.

use sealkeeper_client::SealedStoreApi;
use tracing::{info, warn};

use crate::config::AuditDevice;
use crate::error::ReconcileError;
use crate::util::normalize;

const IMMUTABLE_SIGNAL: &str = "delete them before reconfiguring";

/// Enable every configured audit device not already present.
///
/// # Errors
///
/// Returns the first unrecovered client error.
pub async fn reconcile<C: SealedStoreApi>(client: &C, devices: &[AuditDevice]) -> Result<(), ReconcileError> {
    if devices.is_empty() {
        return Ok(());
    }

    let mounted = client.list_audit().await?;

    for device in devices {
        let path = normalize(device.raw_path());
        if mounted.contains_key(&path) {
            info!(path = %path, "audit device already enabled");
            continue;
        }

        let options = serde_json::Value::Object(device.options.clone());
        match client.enable_audit(&path, options).await {
            Ok(()) => info!(path = %path, audit_type = %device.audit_type, "enabled audit device"),
            Err(err) if err.body_contains(IMMUTABLE_SIGNAL) => {
                warn!(path = %path, "audit device left over from a prior run, leaving as-is");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
