// Metrics ingestion route
// Called by the trusted worker process, not by end users: no authentication.
// The publish happens inside the request, so the worker's next sample waits
// for this one to reach every subscriber (bounded by the registry's send timeout).

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use locust_dashboard_core::MetricSample;
use std::sync::Arc;

use super::common::{ErrorResponse, StatusResponse};
use crate::error::Result;
use crate::services::SubscriberRegistry;

/// App state for metrics routes
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SubscriberRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }
}

/// Create metrics routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/metrics", post(publish_metrics))
        .with_state(state)
}

/// POST /api/metrics - Broadcast one sample to every realtime subscriber
#[utoipa::path(
    post,
    path = "/api/metrics",
    request_body(content = Object, description = "Arbitrary JSON object, forwarded verbatim"),
    responses(
        (status = 200, description = "Sample accepted", body = StatusResponse),
        (status = 500, description = "Body is not a JSON object; error carries the parse failure", body = ErrorResponse)
    ),
    tag = "metrics"
)]
pub async fn publish_metrics(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StatusResponse>> {
    let sample = MetricSample::from_json_bytes(&body)?;
    state.registry.broadcast(&sample).await;
    Ok(Json(StatusResponse::new("ok")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Subscriber;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn post(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/metrics")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_sample_is_forwarded_verbatim() {
        let registry = Arc::new(SubscriberRegistry::new(Duration::from_millis(100)));
        let (subscriber, mut rx) = Subscriber::channel(4);
        registry.register(subscriber);

        let response = routes(AppState::new(registry))
            .oneshot(post(r#"{"rps": 5.2, "timestamp": 1234}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"status":"ok"}"#);

        assert_eq!(
            rx.recv().await.unwrap().as_str(),
            r#"{"rps": 5.2, "timestamp": 1234}"#
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let registry = Arc::new(SubscriberRegistry::new(Duration::from_millis(100)));
        let (subscriber, mut rx) = Subscriber::channel(4);
        registry.register(subscriber);
        let app = routes(AppState::new(registry));

        for (body, reason) in [
            (r#"{"rps": "#, "invalid JSON"),
            ("[1, 2]", "expected a JSON object, got an array"),
            ("", "invalid JSON"),
        ] {
            let response = app.clone().oneshot(post(body)).await.unwrap();
            assert_eq!(response.status(), 500, "body {body:?}");
            let body = response.into_body().collect().await.unwrap().to_bytes();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert!(json["error"].as_str().unwrap().starts_with(reason));
        }

        assert!(rx.try_recv().is_err(), "nothing broadcast");
    }
}
