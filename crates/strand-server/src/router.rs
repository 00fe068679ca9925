//! Axum router construction.

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let write_timeout = ctx.write_timeout();

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Raw asset streaming and stored/generated DASH manifests; keys may
        // contain slashes.
        .route(
            "/dash_manifest/{bucket}/{*key}",
            get(routes::manifest::dash_manifest),
        )
        .route(
            "/hls_manifest/{bucket}/{*key}",
            get(routes::manifest::hls_manifest),
        )
        .route(
            "/dash_stream/{bucket}/{*key}",
            get(routes::stream::dash_stream),
        )
        // Playlist-routed streaming; these URL shapes match what the
        // manifest generators emit under a playlist's base URL.
        .route(
            "/stream/{bucket}/{key}/playlist/{repr}",
            get(routes::manifest::hls_variant),
        )
        .route(
            "/stream/{bucket}/{key}/init/{repr}",
            get(routes::stream::repr_init),
        )
        .route(
            "/stream/{bucket}/{key}/play/{repr}/{number}",
            get(routes::stream::repr_play),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    if !write_timeout.is_zero() {
        app = app.layer(TimeoutLayer::new(write_timeout));
    }

    app
}
