// Worker lifecycle HTTP routes
// Decision: start/stop require a validated identity; status is read-only and public
// Decision: Counts accept integers or numeric strings, matching what dashboard forms submit

use axum::{
    body::Bytes,
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use locust_dashboard_core::run::{positive_count, DEFAULT_SPAWN_RATE, DEFAULT_USERS};
use locust_dashboard_core::{ParameterError, RunParameters, RunTime, WorkerStatus};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::common::{ErrorResponse, StatusResponse};
use crate::auth::{AuthState, AuthUser};
use crate::error::{ControlError, Result};
use crate::services::WorkerSupervisor;

// ============================================
// Request types
// ============================================

/// Integer supplied either as a JSON number or as a numeric string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Number(i64),
    Text(String),
}

impl Count {
    fn resolve(&self, field: &'static str) -> std::result::Result<u32, ParameterError> {
        let value = match self {
            Count::Number(n) => *n,
            Count::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ParameterError::NotANumber {
                    field,
                    value: s.clone(),
                })?,
        };
        positive_count(field, value)
    }
}

/// Request to start a load-test run. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StartLocustRequest {
    /// Concurrent simulated users (default 10)
    #[schema(value_type = Option<i64>, example = 10)]
    #[serde(default)]
    pub users: Option<Count>,
    /// Users spawned per second (default 2)
    #[schema(value_type = Option<i64>, example = 2)]
    #[serde(default)]
    pub rate: Option<Count>,
    /// Run duration, e.g. "90s", "10m", "1h30m" (default "10m")
    #[schema(example = "1m")]
    #[serde(default)]
    pub time: Option<String>,
    /// Target base URL; falls back to the server's default host
    #[schema(example = "http://example.com")]
    #[serde(default)]
    pub host: Option<String>,
}

impl StartLocustRequest {
    /// Parse a request body. An empty body means "all defaults".
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ControlError::malformed(e.to_string()))
    }

    /// Apply defaults and validate
    pub fn into_parameters(
        self,
        default_host: Option<&str>,
    ) -> std::result::Result<RunParameters, ParameterError> {
        let users = match &self.users {
            Some(count) => count.resolve("users")?,
            None => DEFAULT_USERS,
        };
        let spawn_rate = match &self.rate {
            Some(count) => count.resolve("rate")?,
            None => DEFAULT_SPAWN_RATE,
        };
        let run_time = match self.time.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.parse::<RunTime>()?,
            _ => RunTime::default(),
        };
        let host = match self.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => host,
            _ => default_host.ok_or(ParameterError::MissingHost)?,
        };

        Ok(RunParameters {
            users,
            spawn_rate,
            run_time,
            host: locust_dashboard_core::run::validate_host(host)?,
        })
    }
}

// ============================================
// App State and Routes
// ============================================

/// App state for worker lifecycle routes
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<WorkerSupervisor>,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(supervisor: Arc<WorkerSupervisor>, auth: AuthState) -> Self {
        Self { supervisor, auth }
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(input: &AppState) -> Self {
        input.auth.clone()
    }
}

/// Create worker lifecycle routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/start-locust", post(start_locust))
        .route("/api/stop-locust", post(stop_locust))
        .route("/api/locust-status", get(locust_status))
        .with_state(state)
}

// ============================================
// HTTP Handlers
// ============================================

/// POST /api/start-locust - Launch the load-generation worker
#[utoipa::path(
    post,
    path = "/api/start-locust",
    request_body = StartLocustRequest,
    responses(
        (status = 200, description = "Worker launched", body = StatusResponse),
        (status = 400, description = "Already running or invalid parameters", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Worker could not be spawned", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "locust"
)]
pub async fn start_locust(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> Result<Json<StatusResponse>> {
    let request = StartLocustRequest::from_body(&body)?;
    let default_host = state.supervisor.command_config().default_host.as_deref();
    let parameters = request.into_parameters(default_host)?;

    state.supervisor.start(parameters, &user).await?;
    Ok(Json(StatusResponse::new("Locust started")))
}

/// POST /api/stop-locust - Stop the worker and wait for it to exit
#[utoipa::path(
    post,
    path = "/api/stop-locust",
    responses(
        (status = 200, description = "Worker stopped", body = StatusResponse),
        (status = 400, description = "No worker running", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Worker could not be terminated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "locust"
)]
pub async fn stop_locust(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<StatusResponse>> {
    state.supervisor.stop(&user).await?;
    Ok(Json(StatusResponse::new("Locust stopped")))
}

/// GET /api/locust-status - Current worker state
#[utoipa::path(
    get,
    path = "/api/locust-status",
    responses(
        (status = 200, description = "Worker status", body = WorkerStatus)
    ),
    tag = "locust"
)]
pub async fn locust_status(State(state): State<AppState>) -> Json<WorkerStatus> {
    Json(state.supervisor.status())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &str) -> StartLocustRequest {
        StartLocustRequest::from_body(body.as_bytes()).unwrap()
    }

    #[test]
    fn test_full_request() {
        let params = request(r#"{"users": 10, "rate": 2, "time": "1m", "host": "http://example.com"}"#)
            .into_parameters(None)
            .unwrap();
        assert_eq!(params, RunParameters::new(10, 2, "1m", "http://example.com").unwrap());
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let params = request(r#"{"users": "25", "rate": " 5 ", "host": "https://api.example.com"}"#)
            .into_parameters(None)
            .unwrap();
        assert_eq!(params.users, 25);
        assert_eq!(params.spawn_rate, 5);
        assert_eq!(params.run_time.as_str(), "10m");
    }

    #[test]
    fn test_defaults_and_default_host() {
        let params = request("").into_parameters(Some("http://target:8080")).unwrap();
        assert_eq!(params.users, DEFAULT_USERS);
        assert_eq!(params.spawn_rate, DEFAULT_SPAWN_RATE);
        assert_eq!(params.run_time, RunTime::default());
        assert_eq!(params.host, "http://target:8080");

        let params = request(r#"{"host": ""}"#)
            .into_parameters(Some("http://target:8080"))
            .unwrap();
        assert_eq!(params.host, "http://target:8080");
    }

    #[test]
    fn test_missing_host_without_default() {
        assert_eq!(
            request("{}").into_parameters(None).unwrap_err(),
            ParameterError::MissingHost
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            request(r#"{"users": 0, "host": "http://x.com"}"#).into_parameters(None),
            Err(ParameterError::NonPositive { field: "users", .. })
        ));
        assert!(matches!(
            request(r#"{"rate": "fast", "host": "http://x.com"}"#).into_parameters(None),
            Err(ParameterError::NotANumber { field: "rate", .. })
        ));
        assert!(matches!(
            request(r#"{"time": "forever", "host": "http://x.com"}"#).into_parameters(None),
            Err(ParameterError::InvalidRunTime(_))
        ));
        assert!(matches!(
            request(r#"{"host": "ftp://x.com"}"#).into_parameters(None),
            Err(ParameterError::InvalidHost { .. })
        ));
    }

    #[test]
    fn test_malformed_body() {
        let err = StartLocustRequest::from_body(b"{users: 10").unwrap_err();
        assert!(matches!(err, ControlError::MalformedInput(_)));

        let err = StartLocustRequest::from_body(br#"{"users": [1]}"#).unwrap_err();
        assert!(matches!(err, ControlError::MalformedInput(_)));
    }
}
