//! HTTP client abstraction.
//!
//! [`RemoteStream`](crate::RemoteStream) talks to the server through the
//! [`HttpClient`] trait so tests can route requests to an in-process server
//! and applications can bring their own client. [`ReqwestClient`] is the
//! default implementation.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use verstream_protocol::messages::bearer_header;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Minimal HTTP client used by the remote stream.
///
/// Implementations return `Err` only when no response was received; any
/// status code is returned as `Ok`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a bearer-authenticated GET.
    async fn get(&self, url: &str, bearer: &str) -> SyncResult<HttpResponse>;

    /// Sends a bearer-authenticated POST with a JSON body.
    async fn post_json(&self, url: &str, bearer: &str, body: Vec<u8>) -> SyncResult<HttpResponse>;
}

/// [`HttpClient`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> SyncResult<HttpResponse> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, bearer: &str) -> SyncResult<HttpResponse> {
        self.send(self.client.get(url).header(AUTHORIZATION, bearer_header(bearer)))
            .await
    }

    async fn post_json(&self, url: &str, bearer: &str, body: Vec<u8>) -> SyncResult<HttpResponse> {
        self.send(
            self.client
                .post(url)
                .header(AUTHORIZATION, bearer_header(bearer))
                .header(CONTENT_TYPE, "application/json")
                .body(body),
        )
        .await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else if err.is_builder() {
        SyncError::transport_fatal(err.to_string())
    } else {
        SyncError::transport_retryable(err.to_string())
    }
}
