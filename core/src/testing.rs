//! Scripted in-memory `HttpClient` for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::http::{Headers, HttpClient, HttpMethod, Query};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: HttpMethod,
    pub path: String,
    pub query: Query,
    pub body: Option<Value>,
}

/// Answers each request with the next queued response and records the call.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<ApiResult<Value>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn new(responses: impl IntoIterator<Item = Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error(&self, err: ApiError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, method: HttpMethod, path: &str, query: &Query, body: Option<&Value>) -> ApiResult<Value> {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            query: query.clone(),
            body: body.cloned(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport(format!("no scripted response for {path}"))))
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn get(&self, path: &str, query: &Query) -> ApiResult<Value> {
        self.answer(HttpMethod::Get, path, query, None)
    }

    async fn post(&self, path: &str, body: &Value, query: &Query) -> ApiResult<Value> {
        self.answer(HttpMethod::Post, path, query, Some(body))
    }

    async fn patch(&self, path: &str, body: &Value, query: &Query) -> ApiResult<Value> {
        self.answer(HttpMethod::Patch, path, query, Some(body))
    }

    async fn delete(&self, path: &str, query: &Query) -> ApiResult<Value> {
        self.answer(HttpMethod::Delete, path, query, None)
    }

    async fn head(&self, path: &str, query: &Query) -> ApiResult<Headers> {
        self.answer(HttpMethod::Head, path, query, None)?;
        Ok(vec![("x-total-count".to_string(), "3".to_string())])
    }
}
