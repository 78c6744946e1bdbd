//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (unauthenticated for probes)
        .route("/api/health", get(handlers::health_check))
        .route("/api/auth/check", get(handlers::auth_check))
        // The pipeline enforces `upload.max_file_size` while streaming.
        .route(
            "/api/upload",
            post(handlers::upload_image).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/images", get(handlers::list_images))
        .route("/api/images/calendar", get(handlers::images_calendar))
        // Reconciliation
        .route("/api/check-images", post(handlers::check_images))
        .route("/api/fix-images", post(handlers::fix_images))
        .route("/api/reupload-images", post(handlers::reupload_images))
        .route("/api/delete-all-images", post(handlers::delete_all_images));

    let mut router = Router::new().merge(api_routes);

    if state.config.server.serve_blobs {
        router = router.route("/blobs/{*pathname}", get(handlers::get_blob));
    }

    // SECURITY: when enabled, restrict /metrics to the scraper's network.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Order of execution: TraceLayer -> Auth -> Handler
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
