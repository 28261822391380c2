// Server configuration loaded from environment variables.
// Decision: One from_env() per config struct; defaults suit a local `locust` install
// Decision: Every timeout and queue bound is configurable

mod worker;

pub use worker::{SupervisorConfig, WorkerCommandConfig};

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::AuthConfig;

/// Parse an environment variable; unset or empty yields `None`, unparsable
/// values are logged and ignored so the default applies
pub(crate) fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment value, using default");
            None
        }
    }
}

/// Read a non-empty environment variable
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Which browser origins may call the API
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CorsOrigins {
    /// No CORS layer (same-origin requests only)
    #[default]
    Disabled,
    /// `*`
    Any,
    /// Explicit allow-list
    List(Vec<HeaderValue>),
}

impl CorsOrigins {
    /// Parse a comma-separated origin list; `*` allows any origin
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return CorsOrigins::Disabled;
        }
        if raw == "*" {
            return CorsOrigins::Any;
        }

        let origins: Vec<HeaderValue> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();

        if origins.is_empty() {
            CorsOrigins::Disabled
        } else {
            CorsOrigins::List(origins)
        }
    }
}

/// Realtime (websocket) fan-out settings
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// How long one subscriber may hold up a broadcast before it is evicted
    pub send_timeout: Duration,
    /// Samples buffered per subscriber between the broadcaster and its socket
    pub queue_capacity: usize,
    /// Interval between server pings; None disables pings
    pub ping_interval: Option<Duration>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(1),
            queue_capacity: 64,
            ping_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl RealtimeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let send_timeout = env_parse::<u64>("WS_SEND_TIMEOUT_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.send_timeout);

        let queue_capacity = env_parse::<usize>("WS_QUEUE_CAPACITY")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.queue_capacity);

        let ping_interval = match env_parse::<u64>("WS_PING_INTERVAL_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.ping_interval,
        };

        Self {
            send_timeout,
            queue_capacity,
            ping_interval,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// CORS policy
    pub cors_origins: CorsOrigins,
    /// Authentication
    pub auth: AuthConfig,
    /// Websocket fan-out
    pub realtime: RealtimeConfig,
    /// Worker lifecycle timeouts
    pub supervisor: SupervisorConfig,
    /// How the worker process is launched
    pub worker: WorkerCommandConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_string("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8000".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:8000")?;

        let cors_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .map(|s| CorsOrigins::parse(&s))
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            cors_origins,
            auth: AuthConfig::from_env()?,
            realtime: RealtimeConfig::from_env(),
            supervisor: SupervisorConfig::from_env(),
            worker: WorkerCommandConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_parsing() {
        assert_eq!(CorsOrigins::parse(""), CorsOrigins::Disabled);
        assert_eq!(CorsOrigins::parse(" * "), CorsOrigins::Any);
        assert_eq!(
            CorsOrigins::parse("https://a.example.com, https://b.example.com,"),
            CorsOrigins::List(vec![
                HeaderValue::from_static("https://a.example.com"),
                HeaderValue::from_static("https://b.example.com"),
            ])
        );
    }

    #[test]
    fn test_realtime_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.send_timeout, Duration::from_secs(1));
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.ping_interval, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_env_parse_ignores_unparsable_value() {
        // Keys are unique to this test so parallel tests never race on them
        std::env::set_var("LOCUST_TEST_ENV_PARSE_BAD", "abc");
        std::env::set_var("LOCUST_TEST_ENV_PARSE_GOOD", " 42 ");
        std::env::set_var("LOCUST_TEST_ENV_PARSE_EMPTY", "  ");

        assert_eq!(env_parse::<u64>("LOCUST_TEST_ENV_PARSE_BAD"), None);
        assert_eq!(env_parse::<u64>("LOCUST_TEST_ENV_PARSE_GOOD"), Some(42));
        assert_eq!(env_parse::<u64>("LOCUST_TEST_ENV_PARSE_EMPTY"), None);
        assert_eq!(env_parse::<u64>("LOCUST_TEST_ENV_PARSE_UNSET"), None);

        std::env::remove_var("LOCUST_TEST_ENV_PARSE_BAD");
        std::env::remove_var("LOCUST_TEST_ENV_PARSE_GOOD");
        std::env::remove_var("LOCUST_TEST_ENV_PARSE_EMPTY");
    }
}
