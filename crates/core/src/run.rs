// Run parameters for a single load-test run
//
// These mirror the worker command line: users (-u), spawn rate (-r),
// run time (-t) and target host (--host).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Default number of simulated users.
pub const DEFAULT_USERS: u32 = 10;
/// Default users spawned per second.
pub const DEFAULT_SPAWN_RATE: u32 = 2;
/// Default run time.
pub const DEFAULT_RUN_TIME: &str = "10m";

/// Errors raised while validating run parameters
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("{field} must be a positive integer, got {value}")]
    NonPositive { field: &'static str, value: i64 },

    #[error("{field} is too large: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("{field} must be an integer, got {value:?}")]
    NotANumber { field: &'static str, value: String },

    #[error("invalid run time {0:?} (expected e.g. \"90s\", \"10m\", \"1h30m\")")]
    InvalidRunTime(String),

    #[error("invalid host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("host is required")]
    MissingHost,
}

/// Validate a user-supplied count (users, spawn rate).
pub fn positive_count(field: &'static str, value: i64) -> Result<u32, ParameterError> {
    if value <= 0 {
        return Err(ParameterError::NonPositive { field, value });
    }
    u32::try_from(value).map_err(|_| ParameterError::OutOfRange { field, value })
}

/// Run duration in the worker's timespan syntax.
///
/// Accepts plain seconds (`"300"`) or any ordered combination of
/// `<n>h`, `<n>m`, `<n>s` (`"1h30m"`, `"45s"`). The original text is kept
/// so it can be handed to the worker unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTime {
    text: String,
    seconds: u64,
}

impl RunTime {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_secs(&self) -> u64 {
        self.seconds
    }
}

impl Default for RunTime {
    fn default() -> Self {
        Self {
            text: DEFAULT_RUN_TIME.to_string(),
            seconds: 600,
        }
    }
}

impl FromStr for RunTime {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || ParameterError::InvalidRunTime(s.to_string());

        if text.is_empty() {
            return Err(invalid());
        }

        let seconds = if text.bytes().all(|b| b.is_ascii_digit()) {
            text.parse::<u64>().map_err(|_| invalid())?
        } else {
            let mut total: u64 = 0;
            let mut digits = String::new();
            // Units must appear in h, m, s order and at most once each
            let mut last_rank = 0;

            for ch in text.chars() {
                if ch.is_ascii_digit() {
                    digits.push(ch);
                    continue;
                }

                let (rank, factor) = match ch {
                    'h' => (1, 3600),
                    'm' => (2, 60),
                    's' => (3, 1),
                    _ => return Err(invalid()),
                };
                if digits.is_empty() || rank <= last_rank {
                    return Err(invalid());
                }

                let value: u64 = digits.parse().map_err(|_| invalid())?;
                total = value
                    .checked_mul(factor)
                    .and_then(|v| total.checked_add(v))
                    .ok_or_else(invalid)?;
                digits.clear();
                last_rank = rank;
            }

            if !digits.is_empty() {
                return Err(invalid());
            }
            total
        };

        if seconds == 0 {
            return Err(invalid());
        }

        Ok(Self {
            text: text.to_string(),
            seconds,
        })
    }
}

impl fmt::Display for RunTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for RunTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for RunTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Validated parameters for one worker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunParameters {
    /// Number of concurrent simulated users.
    #[cfg_attr(feature = "openapi", schema(example = 10))]
    pub users: u32,
    /// Users spawned per second while ramping up.
    #[serde(rename = "rate")]
    #[cfg_attr(feature = "openapi", schema(example = 2))]
    pub spawn_rate: u32,
    /// How long the run lasts before the worker exits on its own.
    #[serde(rename = "time")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "10m"))]
    pub run_time: RunTime,
    /// Base URL of the system under test.
    #[cfg_attr(feature = "openapi", schema(example = "http://example.com"))]
    pub host: String,
}

impl RunParameters {
    /// Build parameters from loosely-typed inputs, rejecting non-positive
    /// counts, malformed run times and anything that is not an http(s) URL.
    pub fn new(
        users: i64,
        spawn_rate: i64,
        run_time: &str,
        host: &str,
    ) -> Result<Self, ParameterError> {
        Ok(Self {
            users: positive_count("users", users)?,
            spawn_rate: positive_count("rate", spawn_rate)?,
            run_time: run_time.parse()?,
            host: validate_host(host)?,
        })
    }

    /// Worker arguments for these parameters (`-u`, `-r`, `-t`, `--host`).
    pub fn worker_args(&self) -> Vec<String> {
        vec![
            "-u".to_string(),
            self.users.to_string(),
            "-r".to_string(),
            self.spawn_rate.to_string(),
            "-t".to_string(),
            self.run_time.to_string(),
            "--host".to_string(),
            self.host.clone(),
        ]
    }
}

/// Check that `host` is an absolute http(s) URL with a host component.
/// The original text is returned so the worker sees exactly what was submitted.
pub fn validate_host(host: &str) -> Result<String, ParameterError> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(ParameterError::MissingHost);
    }

    let invalid = |reason: String| ParameterError::InvalidHost {
        host: trimmed.to_string(),
        reason,
    };

    let url = url::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(trimmed.to_string())
}
