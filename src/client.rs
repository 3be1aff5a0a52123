use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::{
    config::{Config, ResolvedConfig},
    errors::{Error, Result, TransportError, TransportErrorKind},
    http::{api_error, decode_body, run_id_from_headers, HttpRequest, RunOutput},
    melds::MeldsClient,
    telemetry::{HttpRequestMetrics, RequestContext, Telemetry},
    transport::Transport,
    API_KEY_ENV, CLIENT_HEADER,
};

/// Handle to the Meld API. Cheap to clone; clones share configuration and transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) base_url: String,
    api_key: Option<String>,
    client_header: String,
    request_timeout: Duration,
    transport: Arc<dyn Transport>,
    telemetry: Telemetry,
}

impl Client {
    /// Build a client, reading `MELD_API_KEY` if no key is configured.
    ///
    /// A missing key is not an error here; calls fail with [`Error::Config`]
    /// before touching the network instead.
    pub fn new(cfg: Config) -> Result<Self> {
        Ok(Self::from_resolved(cfg.resolve()?))
    }

    /// Client with default settings and the key taken from `MELD_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::default())
    }

    pub fn from_resolved(cfg: ResolvedConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                base_url: cfg.base_url,
                api_key: cfg.api_key,
                client_header: cfg.client_header,
                request_timeout: cfg.timeout,
                transport: cfg.transport,
                telemetry: Telemetry::new(cfg.metrics),
            }),
        }
    }

    pub fn melds(&self) -> MeldsClient {
        MeldsClient::new(self.inner.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    pub fn has_api_key(&self) -> bool {
        self.inner.api_key.is_some()
    }
}

impl ClientInner {
    /// Standard headers for a JSON call. Fails when no API key was resolved.
    pub(crate) fn headers(&self) -> Result<HeaderMap> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "Missing API key. Pass api_key or set {API_KEY_ENV}."
            ))
        })?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|err| Error::Config(format!("invalid api key: {err}")))?;
        auth.set_sensitive(true);
        let client = HeaderValue::from_str(&self.client_header)
            .map_err(|err| Error::Config(format!("invalid client header: {err}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CLIENT_HEADER, client);
        Ok(headers)
    }

    /// Send one request under a timeout and decode the outcome.
    #[cfg(feature = "tracing")]
    pub(crate) async fn execute(
        &self,
        request: HttpRequest,
        timeout: Option<Duration>,
        ctx: RequestContext,
    ) -> Result<RunOutput> {
        use tracing::Instrument;
        let span = tracing::debug_span!(
            "meld.http",
            method = %ctx.method,
            path = %ctx.path,
            name = ctx.name.as_deref().unwrap_or_default()
        );
        self.send(request, timeout, ctx).instrument(span).await
    }

    /// Send one request under a timeout and decode the outcome.
    #[cfg(not(feature = "tracing"))]
    pub(crate) async fn execute(
        &self,
        request: HttpRequest,
        timeout: Option<Duration>,
        ctx: RequestContext,
    ) -> Result<RunOutput> {
        self.send(request, timeout, ctx).await
    }

    async fn send(
        &self,
        request: HttpRequest,
        timeout: Option<Duration>,
        ctx: RequestContext,
    ) -> Result<RunOutput> {
        let timeout = timeout.unwrap_or(self.request_timeout);
        let start = Instant::now();

        // The timer lives inside this future and is dropped with it on every path.
        let outcome = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(result) => result.map_err(|err| match err.kind {
                TransportErrorKind::Timeout => TransportError::timeout().with_source(err),
                _ => err,
            }),
            Err(_elapsed) => Err(TransportError::timeout()),
        };

        let resp = match outcome {
            Ok(resp) => resp,
            Err(err) => {
                self.record(start, None, Some(err.to_string()), ctx);
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "transport error");
                return Err(err.into());
            }
        };

        let status = resp.status;
        let ctx = ctx.with_run_id(run_id_from_headers(&resp.headers));

        if !status.is_success() {
            let data = match decode_body(&resp.headers, resp.body.clone()) {
                Ok(data) => data,
                Err(_) => RunOutput::Text(resp.body),
            };
            let err = api_error(status, &resp.headers, data);
            self.record(
                start,
                Some(status.as_u16()),
                Some(format!("http {}", status.as_u16())),
                ctx,
            );
            #[cfg(feature = "tracing")]
            tracing::warn!(status = %status, run_id = ?err.run_id, "request failed");
            return Err(err.into());
        }

        self.record(start, Some(status.as_u16()), None, ctx);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            status = %status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );
        decode_body(&resp.headers, resp.body)
    }

    fn record(
        &self,
        start: Instant,
        status: Option<u16>,
        error: Option<String>,
        context: RequestContext,
    ) {
        if self.telemetry.http_enabled() {
            self.telemetry.record_http(HttpRequestMetrics {
                latency: start.elapsed(),
                status,
                error,
                context,
            });
        }
    }
}
