//! In-memory transport for exercising the client without a network

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::{HttpResponse, Transport, TransportResult};

/// HTTP method of a recorded request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// A request seen by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<serde_json::Value>,
}

type Handler = Arc<dyn Fn(&RecordedRequest) -> TransportResult<HttpResponse> + Send + Sync>;

/// Routes requests by method and URL path to canned handlers.
/// Unrouted requests answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), Handler>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` on `path` with `handler`, replacing any earlier route
    pub fn on<F>(&self, method: Method, path: &str, handler: F)
    where
        F: Fn(&RecordedRequest) -> TransportResult<HttpResponse> + Send + Sync + 'static,
    {
        self.routes
            .lock()
            .insert((method, path.to_string()), Arc::new(handler));
    }

    pub fn on_get(&self, path: &str, response: HttpResponse) {
        self.on(Method::Get, path, move |_| Ok(response.clone()));
    }

    pub fn on_post(&self, path: &str, response: HttpResponse) {
        self.on(Method::Post, path, move |_| Ok(response.clone()));
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    fn dispatch(
        &self,
        method: Method,
        url: &Url,
        body: Option<serde_json::Value>,
    ) -> TransportResult<HttpResponse> {
        let request = RecordedRequest {
            method,
            url: url.clone(),
            body,
        };
        let handler = self
            .routes
            .lock()
            .get(&(method, url.path().to_string()))
            .cloned();
        self.requests.lock().push(request.clone());

        match handler {
            Some(handler) => handler(&request),
            None => Ok(HttpResponse::status(404)),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &Url) -> TransportResult<HttpResponse> {
        self.dispatch(Method::Get, url, None)
    }

    async fn post_json(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> TransportResult<HttpResponse> {
        self.dispatch(Method::Post, url, Some(body.clone()))
    }
}
