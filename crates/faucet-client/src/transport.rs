//! HTTP transport abstraction and the reqwest-backed implementation

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{MAX_RESPONSE_BODY_SIZE, TransportError, TransportResult};

/// Status code and raw body of an HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Response with an empty body
    pub fn status(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }

    /// Response with a JSON body
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// The faucet signals success with exactly 200
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Capability to issue the faucet's HTTP calls
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a `GET`
    async fn get(&self, url: &Url) -> TransportResult<HttpResponse>;

    /// Issue a `POST` with a JSON body
    async fn post_json(&self, url: &Url, body: &serde_json::Value)
    -> TransportResult<HttpResponse>;
}

/// Transport backed by a real HTTP client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
    max_body: usize,
}

impl HttpTransport {
    /// Build a client whose every request is bounded by `timeout`
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        Self::with_body_limit(timeout, MAX_RESPONSE_BODY_SIZE)
    }

    /// Like [`HttpTransport::new`], refusing response bodies over `max_body` bytes
    pub fn with_body_limit(timeout: Duration, max_body: usize) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            timeout,
            max_body,
        })
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Request(err.to_string())
        }
    }

    fn oversized(&self, len: u64) -> TransportError {
        TransportError::InvalidBody(format!(
            "response body of {} bytes exceeds limit of {} bytes",
            len, self.max_body
        ))
    }

    async fn finish(&self, mut response: reqwest::Response) -> TransportResult<HttpResponse> {
        let status = response.status().as_u16();
        if let Some(len) = response.content_length() {
            if len > self.max_body as u64 {
                return Err(self.oversized(len));
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(e))? {
            if body.len() + chunk.len() > self.max_body {
                return Err(self.oversized((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(status, body_len = body.len(), "HTTP response");
        Ok(HttpResponse {
            status,
            body: body.freeze(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> TransportResult<HttpResponse> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        self.finish(response).await
    }

    async fn post_json(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> TransportResult<HttpResponse> {
        debug!(%url, "POST");
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        self.finish(response).await
    }
}
