// Application assembly
// Decision: Router construction lives in the library so integration tests serve the exact production stack
// Decision: Health and the OpenAPI document sit outside the API modules and need no auth

use axum::http::{header, Method};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use crate::api;
use crate::auth::{gate_from_config, AuthMode, AuthState, IdentityGate};
use crate::config::{CorsOrigins, ServerConfig};
use crate::openapi::ApiDoc;
use crate::services::{SubscriberRegistry, WorkerSupervisor};

/// Long-lived services shared by every route
#[derive(Clone)]
pub struct Services {
    pub supervisor: Arc<WorkerSupervisor>,
    pub registry: Arc<SubscriberRegistry>,
    pub gate: Arc<dyn IdentityGate>,
}

impl Services {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            supervisor: Arc::new(WorkerSupervisor::new(
                config.worker.clone(),
                config.supervisor.clone(),
            )),
            registry: Arc::new(SubscriberRegistry::new(config.realtime.send_timeout)),
            gate: gate_from_config(&config.auth),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the server is answering
    pub status: String,
    pub version: String,
    /// "jwt" or "none"
    pub auth_mode: String,
    /// Connected realtime subscribers
    pub subscribers: usize,
}

/// State for health endpoint
#[derive(Clone)]
pub(crate) struct HealthState {
    auth_mode: AuthMode,
    registry: Arc<SubscriberRegistry>,
}

/// GET /health - Liveness check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    ),
    tag = "health"
)]
pub(crate) async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth_mode: state.auth_mode.to_string(),
        subscribers: state.registry.len(),
    })
}

/// Build the complete HTTP application
pub fn build_router(services: &Services, config: &ServerConfig) -> Router {
    let auth_state = AuthState::new(services.gate.clone());

    let locust_state = api::locust::AppState::new(services.supervisor.clone(), auth_state);
    let metrics_state = api::metrics::AppState::new(services.registry.clone());
    let realtime_state =
        api::realtime::AppState::new(services.registry.clone(), config.realtime.clone());
    let health_state = HealthState {
        auth_mode: services.gate.mode(),
        registry: services.registry.clone(),
    };

    let app = Router::new()
        .route("/health", get(health).with_state(health_state))
        .route("/api-doc/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(api::locust::routes(locust_state))
        .merge(api::metrics::routes(metrics_state))
        .merge(api::realtime::routes(realtime_state));

    let app = match cors_layer(&config.cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &CorsOrigins) -> Option<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
        ]);

    match origins {
        CorsOrigins::Disabled => None,
        // Credentials cannot be combined with a wildcard origin
        CorsOrigins::Any => Some(layer.allow_origin(Any)),
        CorsOrigins::List(list) => Some(
            layer
                .allow_origin(AllowOrigin::list(list.clone()))
                .allow_credentials(true),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, JwtConfig, JwtService};
    use crate::config::{RealtimeConfig, SupervisorConfig, WorkerCommandConfig};
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret";

    fn config(mode: AuthMode) -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            cors_origins: CorsOrigins::Disabled,
            auth: AuthConfig {
                mode,
                jwt: JwtConfig {
                    secret: SECRET.to_string(),
                    ..Default::default()
                },
            },
            realtime: RealtimeConfig::default(),
            supervisor: SupervisorConfig {
                stop_grace: Duration::from_secs(5),
                kill_wait: Duration::from_secs(5),
            },
            worker: WorkerCommandConfig {
                program: "sh".to_string(),
                leading_args: vec!["-c".to_string(), "sleep 30".to_string(), "locust".to_string()],
                locustfile: None,
                ..Default::default()
            },
        }
    }

    fn app(mode: AuthMode) -> (Router, Services) {
        let config = config(mode);
        let services = Services::from_config(&config);
        (build_router(&services, &config), services)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(AuthMode::Jwt);
        let response = app
            .oneshot(request("GET", "/health", None, ""))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["auth_mode"], "jwt");
        assert_eq!(json["subscribers"], 0);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let (app, _) = app(AuthMode::None);
        let response = app
            .oneshot(request("GET", "/api-doc/openapi.json", None, ""))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let json = json_body(response).await;
        assert!(json["paths"]["/api/start-locust"].is_object());
    }

    #[tokio::test]
    async fn test_lifecycle_requires_token_in_jwt_mode() {
        let (app, services) = app(AuthMode::Jwt);

        for uri in ["/api/start-locust", "/api/stop-locust"] {
            let response = app
                .clone()
                .oneshot(request("POST", uri, None, "{}"))
                .await
                .unwrap();
            assert_eq!(response.status(), 401, "{uri}");
            assert_eq!(json_body(response).await["error"], "Authentication required");

            let response = app
                .clone()
                .oneshot(request("POST", uri, Some("forged.token.value"), "{}"))
                .await
                .unwrap();
            assert_eq!(response.status(), 401, "{uri}");
        }

        // Nothing was spawned
        assert_eq!(
            services.supervisor.state(),
            locust_dashboard_core::WorkerState::NotRunning
        );

        // Status stays public
        let response = app
            .oneshot(request("GET", "/api/locust-status", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(json_body(response).await["state"], "not_running");
    }

    #[tokio::test]
    async fn test_start_and_stop_with_valid_token() {
        let (app, services) = app(AuthMode::Jwt);
        let token = JwtService::new(JwtConfig {
            secret: SECRET.to_string(),
            ..Default::default()
        })
        .generate_access_token("operator", None, None)
        .unwrap();

        let body = r#"{"users": 10, "rate": 2, "time": "1m", "host": "http://example.com"}"#;
        let response = app
            .clone()
            .oneshot(request("POST", "/api/start-locust", Some(&token), body))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(json_body(response).await["status"], "Locust started");

        let response = app
            .clone()
            .oneshot(request("POST", "/api/start-locust", Some(&token), body))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(json_body(response).await["error"], "Locust already running.");

        let response = app
            .clone()
            .oneshot(request("GET", "/api/locust-status", None, ""))
            .await
            .unwrap();
        let status = json_body(response).await;
        assert_eq!(status["state"], "running");
        assert_eq!(status["parameters"]["users"], 10);
        assert_eq!(status["parameters"]["time"], "1m");

        let response = app
            .clone()
            .oneshot(request("POST", "/api/stop-locust", Some(&token), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(json_body(response).await["status"], "Locust stopped");

        let response = app
            .oneshot(request("POST", "/api/stop-locust", Some(&token), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(json_body(response).await["error"], "Locust is not running.");

        services.supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_rejected_before_spawn() {
        let (app, services) = app(AuthMode::None);
        let response = app
            .oneshot(request(
                "POST",
                "/api/start-locust",
                None,
                r#"{"users": -1, "host": "http://example.com"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let json = json_body(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid run parameters"));
        assert_eq!(
            services.supervisor.state(),
            locust_dashboard_core::WorkerState::NotRunning
        );
    }

    #[test]
    fn test_cors_layer_selection() {
        assert!(cors_layer(&CorsOrigins::Disabled).is_none());
        assert!(cors_layer(&CorsOrigins::Any).is_some());
        assert!(cors_layer(&CorsOrigins::parse("https://dash.example.com")).is_some());
    }
}
