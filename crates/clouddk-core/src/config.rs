//! Configuration structures for cloud.dk clients.
//!
//! Settings are passed explicitly to every client and lifecycle operation; nothing
//! here is process-wide. Values can come from serde (a config file), from the
//! environment, or from the builder methods.

use crate::wait::WaitPolicy;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Default API root.
pub const DEFAULT_ENDPOINT: &str = "https://api.cloud.dk/v1";

/// Environment variable holding the API root.
pub const ENV_ENDPOINT: &str = "CLOUDDK_API_ENDPOINT";

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "CLOUDDK_API_KEY";

/// Connection settings for the cloud.dk API.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientSettings {
    /// API root URL
    #[validate(url)]
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key sent in the `X-Api-Key` header
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Deadline policy for boot confirmation and deletion retries
    #[validate(nested)]
    #[serde(default)]
    pub wait: WaitSettings,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl ClientSettings {
    /// Create settings for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, Error> {
        let settings = Self {
            endpoint: endpoint.into(),
            ..Self::default()
        };

        settings
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(settings)
    }

    /// Load settings from `CLOUDDK_API_ENDPOINT` and `CLOUDDK_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the endpoint is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENV_ENDPOINT)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(default_endpoint);
        let api_key = lookup(ENV_API_KEY)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::ConfigError(format!("{ENV_API_KEY} is not set")))?;

        Ok(Self::new(endpoint)?.with_api_key(api_key))
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the wait settings.
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitSettings) -> Self {
        self.wait = wait;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse the endpoint, normalised to end with a slash so relative paths join below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_endpoint(&self) -> Result<Url, Error> {
        let mut raw = self.endpoint.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| Error::ConfigError(format!("Invalid API endpoint: {e}")))
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            tls_verify: default_tls_verify(),
            request_timeout_secs: default_request_timeout_secs(),
            wait: WaitSettings::default(),
        }
    }
}

/// Serializable form of a [`WaitPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WaitSettings {
    /// Overall deadline in seconds
    #[validate(range(min = 1, max = 86_400))]
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Seconds between attempts
    #[validate(range(min = 1, max = 3_600))]
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Granularity of deadline checks in milliseconds
    #[validate(range(min = 1, max = 10_000))]
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

const fn default_max_wait_secs() -> u64 {
    600
}

const fn default_poll_interval_secs() -> u64 {
    10
}

const fn default_tick_millis() -> u64 {
    100
}

impl WaitSettings {
    /// Create wait settings with the default policy (600 s / 10 s / 100 ms).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_wait_secs: default_max_wait_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            tick_millis: default_tick_millis(),
        }
    }

    /// Convert into the runtime policy.
    #[must_use]
    pub const fn policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_secs(self.max_wait_secs),
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_millis(self.tick_millis),
        )
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_client_settings_new() {
        let settings = ClientSettings::new("https://api.example.com/v1").unwrap();
        assert_eq!(settings.endpoint, "https://api.example.com/v1");
        assert!(settings.tls_verify);
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.wait, WaitSettings::new());
    }

    #[test]
    fn test_client_settings_invalid_url() {
        let result = ClientSettings::new("not-a-url");
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_client_settings_builder() {
        let settings = ClientSettings::new("https://api.example.com/v1")
            .unwrap()
            .with_api_key("key")
            .with_tls_verify(false)
            .with_timeout(60);

        assert_eq!(settings.api_key, "key");
        assert!(!settings.tls_verify);
        assert_eq!(settings.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_endpoint_appends_slash() {
        let settings = ClientSettings::new("https://api.example.com/v1").unwrap();
        let url = settings.parse_endpoint().unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/");
        assert_eq!(
            url.join("cloudservers").unwrap().as_str(),
            "https://api.example.com/v1/cloudservers"
        );
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            (ENV_ENDPOINT, "https://api.example.com/v1"),
            (ENV_API_KEY, "secret"),
        ]
        .into_iter()
        .collect();

        let settings =
            ClientSettings::from_lookup(|key| env.get(key).map(ToString::to_string)).unwrap();
        assert_eq!(settings.endpoint, "https://api.example.com/v1");
        assert_eq!(settings.api_key, "secret");
    }

    #[test]
    fn test_from_lookup_defaults_endpoint() {
        let settings = ClientSettings::from_lookup(|key| {
            (key == ENV_API_KEY).then(|| "secret".to_string())
        })
        .unwrap();
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_from_lookup_requires_key() {
        let result = ClientSettings::from_lookup(|_| None);
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_settings_deserialize_defaults() {
        let settings: ClientSettings = serde_json::from_str(r#"{"api_key": "k"}"#).unwrap();
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.wait.max_wait_secs, 600);
        assert_eq!(settings.wait.poll_interval_secs, 10);
        assert_eq!(settings.wait.tick_millis, 100);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let settings = ClientSettings::default().with_api_key("secret");
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_validation_timeout_range() {
        let mut settings = ClientSettings::default();
        settings.request_timeout_secs = 0;
        assert!(settings.validate().is_err());

        settings.request_timeout_secs = 301;
        assert!(settings.validate().is_err());

        settings.request_timeout_secs = 30;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_nested_wait() {
        let mut settings = ClientSettings::default();
        settings.wait.poll_interval_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_wait_settings_policy() {
        let policy = WaitSettings::new().policy();
        assert_eq!(policy.max_wait, Duration::from_secs(600));
        assert_eq!(policy.interval, Duration::from_secs(10));
        assert_eq!(policy.tick, Duration::from_millis(100));
    }
}
