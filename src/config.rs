use std::{fmt, sync::Arc, time::Duration};

use crate::{
    errors::{Error, Result},
    telemetry::MetricsCallbacks,
    transport::{ReqwestTransport, Transport},
    API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};

#[derive(Clone, Default)]
pub struct Config {
    /// API key. Falls back to `MELD_API_KEY` when unset.
    pub api_key: Option<String>,
    /// Defaults to [`DEFAULT_BASE_URL`].
    pub base_url: Option<String>,
    pub client_header: Option<String>,
    /// Override the request timeout (defaults to 60s).
    pub timeout: Option<Duration>,
    /// Override the connect timeout (defaults to 5s). Ignored when a transport or
    /// http client is supplied.
    pub connect_timeout: Option<Duration>,
    /// Prebuilt reqwest client for the default transport.
    pub http_client: Option<reqwest::Client>,
    /// Replaces the default reqwest transport entirely.
    pub transport: Option<Arc<dyn Transport>>,
    /// Optional metrics callbacks (HTTP latency and outcome).
    pub metrics: Option<MetricsCallbacks>,
}

impl Config {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_timeout_ms(self, millis: u64) -> Self {
        self.with_timeout(Duration::from_millis(millis))
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCallbacks) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ResolvedConfig> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using an explicit environment lookup. The lookup runs at most once.
    pub fn resolve_with<F>(self, lookup: F) -> Result<ResolvedConfig>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let api_key = non_blank(self.api_key).or_else(|| non_blank(lookup(API_KEY_ENV)));

        let base = non_blank(self.base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = base.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|err| Error::Config(format!("invalid base url: {err}")))?;

        let transport: Arc<dyn Transport> = match (self.transport, self.http_client) {
            (Some(transport), _) => transport,
            (None, Some(http)) => Arc::new(ReqwestTransport::new(http)),
            (None, None) => Arc::new(ReqwestTransport::with_connect_timeout(
                self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            )?),
        };

        let client_header =
            non_blank(self.client_header).unwrap_or_else(|| DEFAULT_CLIENT_HEADER.to_string());

        Ok(ResolvedConfig {
            api_key,
            base_url,
            client_header,
            timeout: self.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            transport,
            metrics: self.metrics,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("client_header", &self.client_header)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("http_client", &self.http_client.is_some())
            .field("transport", &self.transport.as_ref().map(|_| "custom"))
            .field("metrics", &self.metrics)
            .finish()
    }
}

/// Configuration after environment fallback and defaults have been applied.
/// Immutable once built.
#[derive(Clone)]
pub struct ResolvedConfig {
    pub api_key: Option<String>,
    /// Base address without a trailing slash.
    pub base_url: String,
    pub client_header: String,
    pub timeout: Duration,
    pub transport: Arc<dyn Transport>,
    pub metrics: Option<MetricsCallbacks>,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("client_header", &self.client_header)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
