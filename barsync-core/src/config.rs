//! Environment-based configuration.
//!
//! Resolved once at process start: the two required ingestion settings
//! plus an optional gateway override. Missing or empty required values
//! are fatal before the pipeline runs.

use crate::source::DEFAULT_GATEWAY_URL;
use thiserror::Error;

/// Env var naming the ingestion endpoint URL.
pub const ENDPOINT_VAR: &str = "WORKER_ENDPOINT";
/// Env var holding the ingestion auth token.
pub const AUTH_TOKEN_VAR: &str = "WORKER_AUTH_TOKEN";
/// Optional env var overriding the quote gateway address.
pub const GATEWAY_VAR: &str = "GATEWAY_URL";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("environment variable {0} cannot be empty")]
    EmptyVar(&'static str),
}

/// Ingestion auth token, kept out of Debug output.
#[derive(Clone)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ingestion endpoint the encoded histories are POSTed to.
    pub endpoint: String,
    /// Token sent in the X-API-KEY header.
    pub auth_token: AuthToken,
    /// Quote gateway base address.
    pub gateway_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `WORKER_ENDPOINT` and `WORKER_AUTH_TOKEN` are required.
    /// `GATEWAY_URL` falls back to the compiled-in default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = require_env(ENDPOINT_VAR)?;
        let auth_token = require_env(AUTH_TOKEN_VAR)?;
        let gateway_url = std::env::var(GATEWAY_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());

        Ok(Self {
            endpoint,
            auth_token: AuthToken::new(auth_token),
            gateway_url,
        })
    }
}

fn require_env(key: &'static str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingVar(key))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyVar(key));
    }
    Ok(value)
}
