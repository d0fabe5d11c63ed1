//! HTTP capability consumed by the core, plus plain-data transport types.
//!
//! # Design
//! The codecs, walker and gateways only ever see `HttpClient`: five verbs
//! that return decoded JSON or fail with `ApiError::Http`. Anything that can
//! answer those calls (a real connection, a scripted fake) can drive the
//! core.
//!
//! `HttpRequest` and `HttpResponse` describe one exchange as owned data so a
//! host transport can execute it without knowing anything about entities or
//! pagination. `decode_response` turns a response back into the JSON value
//! the capability returns.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ApiError, ApiResult, HttpBody};

/// Query parameters, in the order they are sent.
pub type Query = Vec<(String, String)>;

/// Response headers as name/value pairs.
pub type Headers = Vec<(String, String)>;

/// The HTTP verbs the core issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// JSON REST capability.
///
/// `path` is either relative to the implementation's base address or an
/// absolute `http(s)://` URL, which must be used verbatim.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, path: &str, query: &Query) -> ApiResult<Value>;

    async fn post(&self, path: &str, body: &Value, query: &Query) -> ApiResult<Value>;

    async fn patch(&self, path: &str, body: &Value, query: &Query) -> ApiResult<Value>;

    async fn delete(&self, path: &str, query: &Query) -> ApiResult<Value>;

    async fn head(&self, path: &str, query: &Query) -> ApiResult<Headers>;
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Query,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Map status >= 400 to `ApiError::Http`, passing other responses through.
pub fn check_status(response: HttpResponse) -> ApiResult<HttpResponse> {
    if response.status < 400 {
        return Ok(response);
    }
    Err(ApiError::Http {
        status: response.status,
        body: error_body(&response),
    })
}

/// Map a response to the JSON value `HttpClient` returns.
///
/// A successful empty body is `null` (e.g. 204 on delete).
pub fn decode_response(response: HttpResponse) -> ApiResult<Value> {
    let response = check_status(response)?;
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::Shape(format!("response body is not JSON: {e}")))
}

fn error_body(response: &HttpResponse) -> HttpBody {
    let content_type = response.header("content-type").unwrap_or_default();
    if content_type.contains("json") {
        if let Ok(value) = serde_json::from_slice(&response.body) {
            return HttpBody::Json(value);
        }
    }
    match std::str::from_utf8(&response.body) {
        Ok(text) if !content_type.contains("octet-stream") => HttpBody::Text(text.to_string()),
        _ => HttpBody::Bytes(response.body.clone()),
    }
}
