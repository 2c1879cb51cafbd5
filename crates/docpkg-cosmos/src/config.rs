//! Account configuration and connection strings

use crate::error::CosmosError;
use std::time::Duration;
use url::Url;

/// REST API version sent with every request
pub const DEFAULT_API_VERSION: &str = "2018-12-31";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Account endpoint and credentials
#[derive(Clone)]
pub struct CosmosConfig {
    endpoint: Url,
    key: String,
    api_version: String,
    timeout: Duration,
}

impl std::fmt::Debug for CosmosConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmosConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CosmosConfig {
    /// Configuration for an endpoint and base64 master key
    ///
    /// # Errors
    /// Returns [`CosmosError::InvalidEndpoint`] if the endpoint is not a URL
    pub fn new(endpoint: &str, key: impl Into<String>) -> Result<Self, CosmosError> {
        let mut endpoint = Url::parse(endpoint)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Ok(Self {
            endpoint,
            key: key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Parse `AccountEndpoint=...;AccountKey=...;`
    ///
    /// Field names are case-insensitive; unknown fields are ignored.
    ///
    /// # Errors
    /// Returns [`CosmosError::InvalidConnectionString`] when a field is missing
    pub fn from_connection_string(connection: &str) -> Result<Self, CosmosError> {
        let mut endpoint = None;
        let mut key = None;
        for part in connection.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                CosmosError::InvalidConnectionString(format!("'{part}' is not a name=value pair"))
            })?;
            match name.trim().to_ascii_lowercase().as_str() {
                "accountendpoint" => endpoint = Some(value.trim()),
                "accountkey" => key = Some(value.trim()),
                _ => {}
            }
        }
        let endpoint = endpoint
            .ok_or_else(|| CosmosError::InvalidConnectionString("missing AccountEndpoint".into()))?;
        let key =
            key.ok_or_else(|| CosmosError::InvalidConnectionString("missing AccountKey".into()))?;
        Self::new(endpoint, key)
    }

    /// Override the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the API version header
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Account endpoint, always ending in `/`
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
