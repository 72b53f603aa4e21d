//! S3-backed keystore.
//!
//! Stores each key as a single object in an S3-compatible bucket, optionally
//! namespaced under a prefix. This is the "cloud KMS-backed bucket" trust
//! root the spec treats as the typical production deployment: the bucket is
//! expected to carry its own encryption-at-rest and IAM access policy, this
//! backend just speaks the object API.
//!
//! Feature-gated behind `s3-backend`.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::{Keystore, KeystoreError};

/// A keystore backed by an S3-compatible object store.
#[derive(Clone)]
pub struct S3Keystore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl std::fmt::Debug for S3Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Keystore")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl S3Keystore {
    /// Build a keystore from an already-configured S3 client.
    ///
    /// `prefix` is prepended to every key, with a trailing `/` inserted if
    /// one was not supplied and `prefix` is non-empty.
    #[must_use]
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.is_empty() || prefix.ends_with('/') {
            prefix
        } else {
            format!("{prefix}/")
        };
        Self {
            client,
            bucket: bucket.into(),
            prefix,
        }
    }

    /// Load AWS credentials/region from the environment and build a keystore
    /// bound to `bucket` under `prefix`.
    pub async fn from_env(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);
        Self::new(client, bucket, prefix)
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

#[async_trait::async_trait]
impl Keystore for S3Keystore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, KeystoreError> {
        let object_key = self.object_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_key())
                {
                    return Err(KeystoreError::NotFound {
                        key: key.to_owned(),
                    });
                }
                return Err(KeystoreError::Transport {
                    key: key.to_owned(),
                    reason: err.to_string(),
                });
            }
        };

        let bytes = output.body.collect().await.map_err(|e| KeystoreError::Transport {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KeystoreError> {
        let object_key = self.object_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(value.to_vec()))
            .send()
            .await
            .map_err(|e| KeystoreError::Transport {
                key: key.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
