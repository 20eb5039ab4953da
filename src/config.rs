//! Client configuration.
//!
//! Values come from `COURSEHUB_*` environment variables with built-in defaults and
//! can be overridden programmatically with the `with_*` methods.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::error::{AppError, AppResult};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 10_000;

/// Paths of the authentication endpoints, relative to the API base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub register: String,
    pub refresh: String,
    pub logout: String,
    pub me: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "auth/login".into(),
            register: "auth/register".into(),
            refresh: "auth/refresh".into(),
            logout: "auth/logout".into(),
            me: "auth/me".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    /// Token file; `None` keeps tokens in memory only.
    pub token_file: Option<PathBuf>,
    pub refresh_timeout: Duration,
    pub request_timeout: Option<Duration>,
    /// Serialize refreshes so concurrent 401s rotate the tokens only once.
    pub coalesce_refresh: bool,
    pub endpoints: Endpoints,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> AppResult<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            token_file: None,
            refresh_timeout: Duration::from_millis(DEFAULT_REFRESH_TIMEOUT_MS),
            request_timeout: None,
            coalesce_refresh: true,
            endpoints: Endpoints::default(),
            user_agent: format!("coursehub/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn from_env() -> AppResult<Self> { Self::from_lookup(|k| std::env::var(k).ok()) }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> AppResult<Self> {
        let base = get("COURSEHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut cfg = Self::new(&base)?;
        cfg.token_file = get("COURSEHUB_TOKEN_FILE").filter(|s| !s.trim().is_empty()).map(PathBuf::from);
        if let Some(ms) = get("COURSEHUB_REFRESH_TIMEOUT_MS") {
            cfg.refresh_timeout = Duration::from_millis(parse_ms("COURSEHUB_REFRESH_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = get("COURSEHUB_REQUEST_TIMEOUT_MS") {
            cfg.request_timeout = Some(Duration::from_millis(parse_ms("COURSEHUB_REQUEST_TIMEOUT_MS", &ms)?));
        }
        if let Some(v) = get("COURSEHUB_COALESCE_REFRESH") {
            cfg.coalesce_refresh = parse_bool("COURSEHUB_COALESCE_REFRESH", &v)?;
        }
        Ok(cfg)
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self { self.token_file = Some(path.into()); self }
    pub fn with_refresh_timeout(mut self, d: Duration) -> Self { self.refresh_timeout = d; self }
    pub fn with_request_timeout(mut self, d: Duration) -> Self { self.request_timeout = Some(d); self }
    pub fn with_coalesce_refresh(mut self, on: bool) -> Self { self.coalesce_refresh = on; self }
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self { self.endpoints = endpoints; self }

    /// Resolve a path (with optional query) against the base URL. Paths that
    /// would leave the API origin are rejected so credentials never go elsewhere.
    pub fn url_for(&self, path: &str) -> AppResult<Url> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::user("invalid_path".to_string(), format!("cannot join '{}': {}", path, e)))?;
        if url.origin() != self.base_url.origin() {
            return Err(AppError::user("invalid_path".to_string(), format!("'{}' is outside {}", path, self.base_url)));
        }
        Ok(url)
    }
}

// Url::join drops the last segment unless the base ends with '/'.
fn parse_base_url(raw: &str) -> AppResult<Url> {
    let mut s = raw.trim().to_string();
    if !s.ends_with('/') { s.push('/'); }
    let url = Url::parse(&s).map_err(|e| AppError::config("invalid_base_url".to_string(), format!("'{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::config("invalid_base_url".to_string(), format!("unsupported scheme '{}'", other))),
    }
}

fn parse_ms(name: &str, v: &str) -> AppResult<u64> {
    v.trim().parse::<u64>().map_err(|_| AppError::config("invalid_config".to_string(), format!("{} must be milliseconds, got '{}'", name, v)))
}

fn parse_bool(name: &str, v: &str) -> AppResult<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config("invalid_config".to_string(), format!("{} must be a boolean, got '{}'", name, v))),
    }
}
