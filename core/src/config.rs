//! Connection settings.
//!
//! Built in code, deserialized from any serde source, or read from the
//! `RESTGATE_BASE_URL` / `RESTGATE_TOKEN` environment variables.

use std::fmt;

use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

pub const BASE_URL_VAR: &str = "RESTGATE_BASE_URL";
pub const TOKEN_VAR: &str = "RESTGATE_TOKEN";

/// Where the backend lives and how to authenticate against it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    pub base_url: String,
    /// API key sent as `Authorization: Token <key>`.
    #[serde(default)]
    pub token: Option<String>,
}

impl ConnectionConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let base_url = lookup(BASE_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ApiError::Configuration(format!("{BASE_URL_VAR} is not set")))?;
        let token = lookup(TOKEN_VAR).filter(|value| !value.is_empty());
        Ok(Self { base_url, token })
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
