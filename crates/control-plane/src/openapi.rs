// OpenAPI specification generation
//
// Served by the API server at /api-doc/openapi.json and printed by the
// export-openapi binary.

use crate::api;
use crate::app;
use locust_dashboard_core::{RunParameters, WorkerExit, WorkerState, WorkerStatus};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI documentation for the Locust dashboard API
#[derive(OpenApi)]
#[openapi(
    paths(
        app::health,
        api::locust::start_locust,
        api::locust::stop_locust,
        api::locust::locust_status,
        api::metrics::publish_metrics,
        api::realtime::subscribe,
    ),
    components(
        schemas(
            api::ErrorResponse,
            api::StatusResponse,
            api::locust::StartLocustRequest,
            app::HealthResponse,
            RunParameters,
            WorkerState,
            WorkerExit,
            WorkerStatus,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "locust", description = "Load-generation worker lifecycle"),
        (name = "metrics", description = "Metric ingestion and realtime fan-out"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "Locust Dashboard API",
        version = "0.1.0",
        description = "Start and stop load-test runs and stream their live metrics",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

/// Registers the bearer JWT scheme referenced by authenticated routes
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate the OpenAPI spec as a pretty-printed JSON string
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}
