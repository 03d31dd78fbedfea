//! Upload, raw download and preview routes.

use crate::handlers::{file_get, file_preview, file_upload, service_info};
use crate::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;

pub(super) fn file_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(service_info::service_info).post(file_upload::upload_file),
        )
        .route("/f/{filename}", get(file_preview::preview_file))
        .route("/{filename}", get(file_get::get_file))
}
