//! Resolves the `--keystore` flag into a concrete trust-root backend.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sealkeeper_keystore::{Keystore, MemoryKeystore, S3Keystore};

#[derive(Debug, Clone, Copy)]
pub enum KeystoreKind {
    Memory,
    S3,
}

pub struct KeystoreArgs {
    pub kind: KeystoreKind,
    pub bucket: Option<String>,
    pub prefix: String,
}

pub async fn build(args: &KeystoreArgs) -> Result<Arc<dyn Keystore>> {
    match args.kind {
        KeystoreKind::Memory => {
            tracing::warn!("using in-memory keystore, unseal material will not survive a restart");
            Ok(Arc::new(MemoryKeystore::new()))
        }
        KeystoreKind::S3 => {
            let bucket = args
                .bucket
                .clone()
                .context("--keystore-bucket (or SEALKEEPER_KEYSTORE_BUCKET) is required for the s3 keystore")?;
            if bucket.is_empty() {
                bail!("--keystore-bucket must not be empty");
            }
            let ks = S3Keystore::from_env(bucket, args.prefix.clone()).await;
            Ok(Arc::new(ks))
        }
    }
}
