//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `BAZAAR_API_URL` - Backend base URL (default: `http://localhost:5000/api`)
//! - `BAZAAR_REQUEST_TIMEOUT_SECS` - Per-attempt timeout (default: 30)
//! - `BAZAAR_SESSION_FILE` - Persisted session path (default: `.bazaar/session.json`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::pipeline::RetryPolicy;
use crate::session::DEFAULT_AUTH_ROUTES;
use crate::suggest::SuggestConfig;

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT_SECS: &str = "30";
const DEFAULT_SESSION_FILE: &str = ".bazaar/session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Bazaar client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, including any path prefix such as `/api`
    pub api_url: Url,
    /// Per-attempt request timeout
    pub request_timeout: Duration,
    /// Where the session token and user are persisted
    pub session_file: PathBuf,
    /// Network failure retry policy
    pub retry: RetryPolicy,
    /// Search suggestion tuning
    pub suggest: SuggestConfig,
    /// Routes belonging to the authentication flow
    pub auth_routes: Vec<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let api_url = Url::parse(&get("BAZAAR_API_URL", DEFAULT_API_URL))
            .map_err(|e| ConfigError::InvalidEnvVar("BAZAAR_API_URL".to_string(), e.to_string()))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "BAZAAR_API_URL".to_string(),
                format!("unsupported scheme {}", api_url.scheme()),
            ));
        }

        let timeout_secs = get("BAZAAR_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BAZAAR_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
            })?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "BAZAAR_REQUEST_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api_url,
            request_timeout: Duration::from_secs(timeout_secs),
            session_file: PathBuf::from(get("BAZAAR_SESSION_FILE", DEFAULT_SESSION_FILE)),
            retry: RetryPolicy::default(),
            suggest: SuggestConfig::default(),
            auth_routes: DEFAULT_AUTH_ROUTES.iter().map(|r| (*r).to_string()).collect(),
        })
    }
}
