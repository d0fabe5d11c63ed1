//! `HttpClient` implementation over a host-provided transport.
//!
//! # Design
//! `Connection` does everything except the network round-trip: it resolves
//! paths against the base URL, attaches JSON and token headers, serializes
//! bodies into an `HttpRequest`, and decodes the `HttpResponse` the
//! `Transport` hands back. The transport is owned by the connection and is
//! released when the connection is dropped, on success and error paths
//! alike.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::auth::token_header;
use crate::config::ConnectionConfig;
use crate::error::{ApiError, ApiResult};
use crate::http::{
    check_status, decode_response, Headers, HttpClient, HttpMethod, HttpRequest, HttpResponse,
    Query,
};

/// Executes one plain-data HTTP exchange.
///
/// Network-level failures are reported as `ApiError::Transport`; non-2xx
/// statuses are returned as ordinary responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> ApiResult<HttpResponse>;
}

/// A session against one backend.
#[derive(Debug)]
pub struct Connection<T> {
    config: ConnectionConfig,
    base_url: String,
    origin: String,
    transport: T,
}

/// `scheme://host[:port]` of a URL, or the whole string when it has no path.
fn origin_of(url: &str) -> &str {
    let authority = url.find("://").map_or(0, |at| at + 3);
    match url[authority..].find('/') {
        Some(slash) => &url[..authority + slash],
        None => url,
    }
}

impl<T: Transport> Connection<T> {
    pub fn new(config: ConnectionConfig, transport: T) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let origin = origin_of(&base_url).to_string();
        Self {
            config,
            base_url,
            origin,
            transport,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Resolves `path` the way a browser resolves a link on the base URL:
    /// absolute URLs pass through, a leading `/` is relative to the origin
    /// and anything else is joined to the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.origin, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> ApiResult<HttpRequest> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = &self.config.token {
            headers.push(token_header(token));
        }
        let body = body
            .map(|body| {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                serde_json::to_string(body)
            })
            .transpose()
            .map_err(|e| ApiError::Shape(format!("request body is not serializable: {e}")))?;
        Ok(HttpRequest {
            method,
            url: self.url(path),
            query: query.clone(),
            headers,
            body,
        })
    }

    async fn send(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        let started = Instant::now();
        let response = self.transport.execute(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &response {
            Ok(response) => debug!(
                method = method.as_str(),
                url = %url,
                status = response.status,
                elapsed_ms,
                "request completed"
            ),
            Err(e) => debug!(
                method = method.as_str(),
                url = %url,
                error = %e,
                elapsed_ms,
                "request failed"
            ),
        }
        response
    }

    async fn exchange(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        let request = self.build_request(method, path, query, body)?;
        decode_response(self.send(request).await?)
    }
}

#[async_trait]
impl<T: Transport> HttpClient for Connection<T> {
    async fn get(&self, path: &str, query: &Query) -> ApiResult<Value> {
        self.exchange(HttpMethod::Get, path, query, None).await
    }

    async fn post(&self, path: &str, body: &Value, query: &Query) -> ApiResult<Value> {
        self.exchange(HttpMethod::Post, path, query, Some(body)).await
    }

    async fn patch(&self, path: &str, body: &Value, query: &Query) -> ApiResult<Value> {
        self.exchange(HttpMethod::Patch, path, query, Some(body)).await
    }

    async fn delete(&self, path: &str, query: &Query) -> ApiResult<Value> {
        self.exchange(HttpMethod::Delete, path, query, None).await
    }

    async fn head(&self, path: &str, query: &Query) -> ApiResult<Headers> {
        let request = self.build_request(HttpMethod::Head, path, query, None)?;
        let response = check_status(self.send(request).await?)?;
        Ok(response.headers)
    }
}
