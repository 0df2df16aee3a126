//! HTTP executor for the cloud.dk API.
//!
//! [`ApiClient`] performs exactly one round trip per call and classifies the
//! answer: 2xx is success, 404 becomes [`Error::NotFound`], anything else becomes
//! [`Error::Api`]. Retry policy belongs to the callers that need it.

use crate::config::ClientSettings;
use crate::{Error, Result};
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Default connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

const USER_AGENT: &str = concat!("clouddk-core/", env!("CARGO_PKG_VERSION"));

/// Builder for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientBuilder {
    settings: ClientSettings,
    user_agent: String,
}

impl ApiClientBuilder {
    /// Create a builder from client settings.
    #[must_use]
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            settings,
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Finalise the builder and create the [`ApiClient`].
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the HTTP client cannot be built.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self.settings.parse_endpoint()?;

        let mut builder = ClientBuilder::new()
            .user_agent(&self.user_agent)
            .timeout(self.settings.timeout())
            .pool_idle_timeout(Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT))
            .pool_max_idle_per_host(DEFAULT_POOL_MAX_IDLE_PER_HOST)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT));

        if !self.settings.tls_verify {
            warn!("TLS verification disabled for cloud.dk client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        let api_key = (!self.settings.api_key.is_empty())
            .then(|| SecretString::from(self.settings.api_key.clone()));

        Ok(ApiClient {
            http,
            base_url,
            api_key,
        })
    }
}

/// Single-round-trip HTTP executor. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Construct a client directly from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn new(settings: ClientSettings) -> Result<Self> {
        ApiClientBuilder::new(settings).build()
    }

    /// Start a builder.
    #[must_use]
    pub fn builder(settings: ClientSettings) -> ApiClientBuilder {
        ApiClientBuilder::new(settings)
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        let normalized = path.strip_prefix('/').unwrap_or(path);

        self.base_url
            .join(normalized)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid API path `{path}`: {err}")))
    }

    /// Perform one request and classify the response status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when no response arrives, [`Error::NotFound`] on
    /// 404 and [`Error::Api`] on any other non-2xx status.
    pub async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.build_url(path)?;
        let mut request = self
            .http
            .request(method.clone(), url)
            .query(params)
            .header("Accept", "application/json");

        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.expose_secret());
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        info!(%method, path, "cloud.dk request");

        let response = request.send().await?;
        let status = response.status();
        debug!(%method, path, %status, "cloud.dk response");

        if status.is_success() {
            return Ok(response);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("{method} {path}: {text}"))),
            _ => Err(Error::from_status(status, text)),
        }
    }

    /// Perform a GET and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Propagates [`ApiClient::execute`] errors and JSON decode failures.
    pub async fn get_json<T>(&self, path: &str, params: &[(&'static str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_json::<(), T>(Method::GET, path, None, params)
            .await
    }

    /// Perform a request with an optional JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Propagates [`ApiClient::execute`] errors and JSON decode failures.
    pub async fn send_json<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(&'static str, String)],
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.execute(method, path, params, body).await?;
        Ok(response.json::<R>().await?)
    }

    /// Perform a request whose response body is ignored.
    ///
    /// # Errors
    ///
    /// Propagates [`ApiClient::execute`] errors.
    pub async fn send_empty(&self, method: Method, path: &str) -> Result<()> {
        self.execute::<()>(method, path, &[], None).await?;
        Ok(())
    }
}
