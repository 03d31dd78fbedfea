//! Route configuration and setup.
//!
//! File routes live in [files](files); health checks in [health](health).

mod files;
mod health;

use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::error::{error_details_middleware, ErrorDetailPolicy, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{Method, Request},
    routing::get,
    Router,
};
use kcst_core::{AppError, Config};
use kcst_infra::{get_request_id, request_id_middleware, security_headers_middleware, SecurityHeaders};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub async fn setup_routes(
    config: &Config,
    state: Arc<AppState>,
) -> Result<Router<()>, anyhow::Error> {
    let body_limit = usize::try_from(config.max_file_size().saturating_add(MULTIPART_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);
    tracing::info!(
        body_limit,
        concurrency_limit = config.server.concurrency_limit,
        "HTTP limits configured"
    );

    let security_headers = SecurityHeaders {
        hsts: config.is_production(),
    };

    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
        let request_id = get_request_id(request).unwrap_or_default();
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    let app = Router::new()
        .merge(health_routes())
        .merge(files::file_routes())
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(route_not_found)
        .layer(axum::middleware::from_fn_with_state(
            ErrorDetailPolicy::for_config(config),
            error_details_middleware,
        ))
        .layer(ConcurrencyLimitLayer::new(config.server.concurrency_limit))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(setup_cors())
        .layer(trace_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(
            security_headers,
            security_headers_middleware,
        ))
        .with_state(state);

    Ok(app)
}

/// Uploads come from arbitrary pages and scripts, so any origin may call the API.
fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn method_not_allowed() -> HttpAppError {
    AppError::MethodNotAllowed.into()
}

async fn route_not_found() -> HttpAppError {
    AppError::NotFound("no such route".to_string()).into()
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
}
