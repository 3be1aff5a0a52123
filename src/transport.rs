//! Pluggable HTTP transport.
//!
//! The client never talks to the network directly: every call goes through a
//! [`Transport`]. [`ReqwestTransport`] is used unless another implementation is
//! injected through [`Config::transport`](crate::Config::transport), which is how
//! tests exercise the client without a server.

use std::{future::Future, pin::Pin, time::Duration};

use crate::{
    errors::{TransportError, TransportErrorKind},
    http::{HttpRequest, HttpResponse},
};

/// Boxed future returned by [`Transport::send`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Single-method capability that performs one HTTP exchange.
///
/// Implementations must read the whole body before resolving. Dropping the
/// returned future cancels the exchange.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}

/// Default transport backed by [`reqwest::Client`].
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| {
                TransportError::new(TransportErrorKind::Connect, "failed to build http client")
                    .with_source(err)
            })?;
        Ok(Self::new(http))
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let resp = self
                .http
                .request(request.method, request.url.as_str())
                .headers(request.headers)
                .body(request.body)
                .send()
                .await?;
            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.text().await?;
            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}
