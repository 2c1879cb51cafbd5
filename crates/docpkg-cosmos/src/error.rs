//! Cosmos store errors

use docpkg_core::StoreError;

/// Configuration and transport errors
#[derive(Debug, thiserror::Error)]
pub enum CosmosError {
    /// Connection string is missing a field or malformed
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Account endpoint is not a valid URL
    #[error("invalid account endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Account key is not valid base64
    #[error("account key is not valid base64: {0}")]
    InvalidKey(#[from] base64::DecodeError),

    /// Value cannot be sent as a header
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// HTTP client failure
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CosmosError> for StoreError {
    fn from(error: CosmosError) -> Self {
        match error {
            CosmosError::Json(e) => StoreError::InvalidResponse(e.to_string()),
            other => StoreError::Transport(Box::new(other)),
        }
    }
}
