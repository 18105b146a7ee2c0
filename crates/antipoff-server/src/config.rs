//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use antipoff_shared::constants::{
    DEFAULT_ACCESS_TOKEN_TTL_MINUTES, DEFAULT_ORACLE_URL, DEFAULT_REFRESH_TOKEN_TTL_DAYS,
    MAX_ACCESS_TOKEN_TTL_MINUTES, MAX_REFRESH_TOKEN_TTL_DAYS, ORACLE_TIMEOUT_SECS,
};
use antipoff_shared::token::parse_algorithm;
use jsonwebtoken::Algorithm;

/// Signing secret used when `SECRET_KEY` is not set. Never use in production.
pub const DEV_SECRET_KEY: &str = "antipoff-dev-secret-change-me";

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// Platform data directory (`antipoff.db`).
    Default,
    /// Private in-memory database, lost on shutdown.
    Memory,
    Path(PathBuf),
}

impl DatabaseLocation {
    /// Parse a `DATABASE_URL` value: `sqlite://path`, `sqlite:path`, a plain
    /// path, or `:memory:`.
    pub fn parse(url: &str) -> Self {
        let url = url.trim();
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        match path {
            "" => DatabaseLocation::Default,
            ":memory:" => DatabaseLocation::Memory,
            p => DatabaseLocation::Path(PathBuf::from(p)),
        }
    }
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8000`
    pub http_addr: SocketAddr,

    /// Env: `DATABASE_URL`
    /// Default: platform data directory.
    pub database: DatabaseLocation,

    /// HMAC secret for session tokens.
    /// Env: `SECRET_KEY`
    /// Default: [`DEV_SECRET_KEY`] (development only).
    pub secret_key: String,

    /// Env: `ALGORITHM` (HS256, HS384 or HS512)
    pub algorithm: Algorithm,

    /// Env: `ACCESS_TOKEN_TTL_MINUTES`
    pub access_token_ttl: chrono::Duration,

    /// Env: `REFRESH_TOKEN_TTL_DAYS`
    pub refresh_token_ttl: chrono::Duration,

    /// Env: `ORACLE_URL`
    /// Default: `http://localhost:3000/history`
    pub oracle_url: String,

    /// Upper bound on a single oracle call.
    /// Env: `ORACLE_TIMEOUT_SECS`
    pub oracle_timeout: Duration,

    // -- Development helpers --

    /// Serve the random `/history` stub oracle from this process.
    /// Env: `STUB_ORACLE` (true/false)
    /// Default: `false`
    pub stub_oracle: bool,

    /// Upper bound of the stub oracle's random delay.
    /// Env: `STUB_ORACLE_MAX_DELAY_SECS`
    /// Default: `60`
    pub stub_oracle_max_delay: Duration,

    /// Mark session cookies `Secure`.
    /// Env: `COOKIE_SECURE` (true/false)
    /// Default: `false`
    pub cookie_secure: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database", &self.database)
            .field("secret_key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("oracle_url", &self.oracle_url)
            .field("oracle_timeout", &self.oracle_timeout)
            .field("stub_oracle", &self.stub_oracle)
            .field("stub_oracle_max_delay", &self.stub_oracle_max_delay)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8000).into(),
            database: DatabaseLocation::Default,
            secret_key: DEV_SECRET_KEY.to_string(),
            algorithm: Algorithm::HS256,
            access_token_ttl: chrono::Duration::minutes(DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            refresh_token_ttl: chrono::Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            oracle_url: DEFAULT_ORACLE_URL.to_string(),
            oracle_timeout: Duration::from_secs(ORACLE_TIMEOUT_SECS),
            stub_oracle: false,
            stub_oracle_max_delay: Duration::from_secs(60),
            cookie_secure: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database = DatabaseLocation::parse(&url);
        }

        match lookup("SECRET_KEY").filter(|s| !s.is_empty()) {
            Some(secret) => config.secret_key = secret,
            None => tracing::warn!("SECRET_KEY not set, using development secret"),
        }

        if let Some(name) = lookup("ALGORITHM") {
            match parse_algorithm(&name) {
                Ok(algorithm) => config.algorithm = algorithm,
                Err(e) => tracing::warn!(error = %e, "Invalid ALGORITHM, using HS256"),
            }
        }

        if let Some(ttl) = parse_bounded(&lookup, "ACCESS_TOKEN_TTL_MINUTES", MAX_ACCESS_TOKEN_TTL_MINUTES)
            .and_then(chrono::Duration::try_minutes)
        {
            config.access_token_ttl = ttl;
        }

        if let Some(ttl) = parse_bounded(&lookup, "REFRESH_TOKEN_TTL_DAYS", MAX_REFRESH_TOKEN_TTL_DAYS)
            .and_then(chrono::Duration::try_days)
        {
            config.refresh_token_ttl = ttl;
        }

        if let Some(url) = lookup("ORACLE_URL").filter(|s| !s.is_empty()) {
            config.oracle_url = url;
        }

        if let Some(secs) = parse_positive(&lookup, "ORACLE_TIMEOUT_SECS") {
            config.oracle_timeout = Duration::from_secs(secs);
        }

        // -- Development helpers --

        if let Some(val) = lookup("STUB_ORACLE") {
            config.stub_oracle = parse_flag(&val);
        }

        if let Some(val) = lookup("STUB_ORACLE_MAX_DELAY_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.stub_oracle_max_delay = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %val, "Invalid STUB_ORACLE_MAX_DELAY_SECS, using default"),
            }
        }

        if let Some(val) = lookup("COOKIE_SECURE") {
            config.cookie_secure = parse_flag(&val);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Parse `key` as an integer in `1..=max`; anything else is logged and
/// ignored.
fn parse_bounded(lookup: &impl Fn(&str) -> Option<String>, key: &str, max: i64) -> Option<i64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<i64>() {
        Ok(n) if (1..=max).contains(&n) => Some(n),
        Ok(n) if n > max => {
            tracing::warn!(key, value = n, max, "Value above maximum, using default");
            None
        }
        _ => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
