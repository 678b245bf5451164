//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/upload/init", post(handlers::init_upload))
        .route("/api/upload/chunk", post(handlers::upload_chunk))
        .route(
            "/api/upload/status/{upload_id}",
            get(handlers::upload_status),
        )
        .route("/api/upload/complete", post(handlers::complete_upload))
        // Intentionally unauthenticated for load balancers and probes.
        .route("/health", get(handlers::health_check));

    // SECURITY: when enabled, restrict /metrics to scraper IPs at the
    // infrastructure level.
    if state.config.server.metrics_enabled {
        router = router.merge(Router::new().route("/metrics", get(metrics_handler)));
    }

    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    router
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
