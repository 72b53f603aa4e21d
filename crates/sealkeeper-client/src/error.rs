//! Client error types.

/// Errors returned from the server client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No token has been installed on the client, but the request requires one.
    #[error("no token installed on client — call set_token first")]
    NoToken,

    /// The underlying HTTP transport failed (connection refused, timeout, TLS, …).
    #[error("request to '{path}' failed: {reason}")]
    Transport { path: String, reason: String },

    /// The server responded with a non-success status.
    #[error("server returned {status} for '{path}': {body}")]
    Api {
        path: String,
        status: u16,
        body: String,
    },

    /// The response body could not be deserialized into the expected shape.
    #[error("failed to parse response from '{path}': {reason}")]
    Decode { path: String, reason: String },
}

impl ClientError {
    /// `true` if this is an [`ClientError::Api`] whose body contains `needle`.
    ///
    /// Used to detect the "delete them before reconfiguring" immutable-endpoint
    /// signal, which is a substring match against the server's error body
    /// rather than a distinct status code.
    #[must_use]
    pub fn body_contains(&self, needle: &str) -> bool {
        matches!(self, ClientError::Api { body, .. } if body.contains(needle))
    }
}
