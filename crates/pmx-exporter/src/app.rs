use crate::logging;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

pub const BANNER: &str = "PowerMax Exporter: access /metrics for data\n";

pub fn build_http_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(middleware::from_fn(logging::request_logging))
}

async fn index() -> &'static str {
    BANNER
}

/// Run one collection cycle and expose its data points.
async fn metrics(State(state): State<AppState>) -> Response {
    let report = state.engine.collect().await;
    match state.descriptors.render(&report.points) {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(
                resource_type = %report.resource_type,
                error = %e,
                "Failed to encode metrics"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}
