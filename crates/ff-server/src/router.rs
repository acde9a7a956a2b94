//! Axum router construction.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;

/// Multipart framing and form fields on top of the payload itself.
const UPLOAD_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = usize::try_from(
        ctx.config
            .limits
            .max_upload_bytes
            .saturating_add(UPLOAD_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);

    let api = Router::new()
        .route(
            "/upload",
            post(routes::upload::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/media/status/{job_id}", get(routes::media::status))
        .route("/media/convert/{job_id}", post(routes::media::convert))
        .route("/media/download/{job_id}", get(routes::media::download))
        .route(
            "/media/youtube-quality/{job_id}",
            post(routes::media::youtube_quality),
        )
        .route("/events", get(routes::events::events_handler))
        .route("/admin/tools", get(routes::admin::tools));

    Router::new()
        .route("/health", get(routes::admin::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}
