//! Session manager configuration.
//!
//! `AuthConfig` is built once at startup and handed to the constructors that
//! need it. It can be assembled in code or read from the environment:
//!
//! | Variable                       | Default                     |
//! |--------------------------------|-----------------------------|
//! | `PATHWAY_API_URL`              | `http://localhost:8000/api` |
//! | `PATHWAY_SESSION_SECRET`       | required                    |
//! | `PATHWAY_SESSION_MAX_AGE_SECS` | `86400` (24 hours)          |
//! | `PATHWAY_REFRESH_BUFFER_SECS`  | `60`                        |

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::auth::DEFAULT_REFRESH_BUFFER;

/// Backend API used when `PATHWAY_API_URL` is unset
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Absolute session lifetime, independent of access-token expiry (24 hours)
pub const DEFAULT_SESSION_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// HTTP request timeout. A timed-out call counts as a failed verify/refresh.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_API_URL: &str = "PATHWAY_API_URL";
const ENV_SESSION_SECRET: &str = "PATHWAY_SESSION_SECRET";
const ENV_SESSION_MAX_AGE: &str = "PATHWAY_SESSION_MAX_AGE_SECS";
const ENV_REFRESH_BUFFER: &str = "PATHWAY_REFRESH_BUFFER_SECS";

#[derive(Clone)]
pub struct AuthConfig {
    pub api_base_url: String,
    /// Secret the session store derives its sealing key from
    pub session_secret: String,
    pub session_max_age: Duration,
    pub refresh_buffer: Duration,
    pub request_timeout: Duration,
    pub entry_points: EntryPoints,
}

/// Paths of the pages the session layer redirects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoints {
    pub sign_in: String,
    pub error: String,
    pub home: String,
    pub auth_prefix: String,
    pub protected_prefixes: Vec<String>,
}

impl Default for EntryPoints {
    fn default() -> Self {
        Self {
            sign_in: "/auth/login".to_string(),
            error: "/auth/error".to_string(),
            home: "/dashboard".to_string(),
            auth_prefix: "/auth".to_string(),
            protected_prefixes: vec!["/dashboard".to_string()],
        }
    }
}

impl AuthConfig {
    pub fn new(api_base_url: impl Into<String>, session_secret: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            session_secret: session_secret.into(),
            session_max_age: DEFAULT_SESSION_MAX_AGE,
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            entry_points: EntryPoints::default(),
        }
    }

    pub fn with_session_max_age(mut self, max_age: Duration) -> Self {
        self.session_max_age = max_age;
        self
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url = lookup(ENV_API_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let session_secret = match lookup(ENV_SESSION_SECRET) {
            Some(secret) if !secret.trim().is_empty() => secret,
            _ => bail!("{} must be set to a non-empty value", ENV_SESSION_SECRET),
        };

        let mut config = Self::new(api_base_url, session_secret);
        if let Some(secs) = lookup(ENV_SESSION_MAX_AGE) {
            config.session_max_age = parse_secs(ENV_SESSION_MAX_AGE, &secs)?;
        }
        if let Some(secs) = lookup(ENV_REFRESH_BUFFER) {
            config.refresh_buffer = parse_secs(ENV_REFRESH_BUFFER, &secs)?;
        }
        Ok(config)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a whole number of seconds, got {:?}", key, value))?;
    Ok(Duration::from_secs(secs))
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_base_url", &self.api_base_url)
            .field("session_secret", &"<redacted>")
            .field("session_max_age", &self.session_max_age)
            .field("refresh_buffer", &self.refresh_buffer)
            .field("request_timeout", &self.request_timeout)
            .field("entry_points", &self.entry_points)
            .finish()
    }
}
