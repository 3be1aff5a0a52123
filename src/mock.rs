#![cfg(feature = "mock")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use reqwest::{header::HeaderValue, StatusCode};
use serde_json::Value;

use crate::{
    errors::TransportError,
    http::{HttpRequest, HttpResponse},
    transport::{BoxFuture, Transport},
    RUN_ID_HEADER,
};

/// In-memory transport for offline tests.
///
/// Responses are served in the order they were queued; once the queue is
/// empty every call answers 500. Each request is recorded before it is
/// answered.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, resp: HttpResponse) -> Self {
        self.push(Ok(resp));
        self
    }

    pub fn with_json(self, status: u16, body: Value) -> Self {
        self.with_response(HttpResponse::json(status_code(status), &body))
    }

    pub fn with_text(self, status: u16, body: impl Into<String>) -> Self {
        let mut resp = HttpResponse::new(status_code(status), body);
        resp.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        self.with_response(resp)
    }

    /// JSON error response carrying an `X-Run-Id` header.
    pub fn with_api_error(self, status: u16, body: Value, run_id: &str) -> Self {
        let mut resp = HttpResponse::json(status_code(status), &body);
        if let Ok(value) = HeaderValue::from_str(run_id) {
            resp.headers.insert(RUN_ID_HEADER, value);
        }
        self.with_response(resp)
    }

    pub fn with_error(self, err: TransportError) -> Self {
        self.push(Err(err));
        self
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn push(&self, entry: Result<HttpResponse, TransportError>) {
        if let Ok(mut queue) = self.inner.responses.lock() {
            queue.push_back(entry);
        }
    }

    fn next(&self) -> Result<HttpResponse, TransportError> {
        self.inner
            .responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| {
                Ok(HttpResponse::json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &serde_json::json!({ "message": "no mock responses queued" }),
                ))
            })
    }
}

impl Transport for MockTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        if let Ok(mut requests) = self.inner.requests.lock() {
            requests.push(request);
        }
        let result = self.next();
        Box::pin(async move { result })
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
