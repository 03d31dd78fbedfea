//! HTTP error response conversion
//!
//! This module provides HTTP-specific error response conversion for AppError.
//!
//! **Preferred handler pattern:** Return `Result<impl IntoResponse, HttpAppError>`. Use
//! `AppError` (or types that implement `Into<AppError>`) for errors and `?` so they
//! become `HttpAppError` and render consistently (status, body, logging).
//!
//! Error bodies never carry `details` on their own. The detailed body rides along
//! as a response extension and [`error_details_middleware`] swaps it in when the
//! loaded configuration allows it.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Request, State,
    },
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use kcst_core::{AppError, ErrorMetadata, LogLevel};
use kcst_infra::ErrorResponse;
use kcst_storage::StorageError;

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from kcst-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Requests that are not multipart/form-data at all.
impl From<MultipartRejection> for HttpAppError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpAppError(AppError::BadRequest(format!(
            "Failed to parse form: {}",
            rejection.body_text()
        )))
    }
}

/// Malformed or oversized multipart bodies.
impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        let app = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(format!("Failed to parse form: {}", err.body_text()))
        };
        HttpAppError(app)
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

/// Error body including `details`, attached to non-sensitive error responses.
#[derive(Debug, Clone)]
struct DetailedErrorBody(ErrorResponse);

/// Whether error responses may include `details` and `error_type`.
#[derive(Debug, Clone, Copy)]
pub struct ErrorDetailPolicy {
    pub expose: bool,
}

impl ErrorDetailPolicy {
    pub fn for_config(config: &kcst_core::Config) -> Self {
        Self {
            expose: !config.is_production(),
        }
    }
}

/// Replace error bodies with their detailed form when the policy allows it.
pub async fn error_details_middleware(
    State(policy): State<ErrorDetailPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let Some(DetailedErrorBody(body)) = response.extensions_mut().remove::<DetailedErrorBody>()
    else {
        return response;
    };
    if !policy.expose {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    (parts, Json(body)).into_response()
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = ErrorResponse::new(
            app_error.client_message(),
            app_error.error_code(),
            app_error.is_recoverable(),
        )
        .with_suggested_action(app_error.suggested_action());

        let detailed = (!app_error.is_sensitive()).then(|| {
            body.clone()
                .with_details(app_error.detailed_message(), app_error.error_type())
        });

        let mut response = (status, Json(body)).into_response();
        if let Some(detailed) = detailed {
            response.extensions_mut().insert(DetailedErrorBody(detailed));
        }
        response
    }
}

// Convert domain errors to HttpAppError (avoids orphan rule: we impl for local HttpAppError)

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(name) => AppError::NotFound(name),
            StorageError::TooLarge { max } => AppError::PayloadTooLarge(format!(
                "File exceeds the maximum size of {}",
                kcst_core::format_size(max)
            )),
            StorageError::InvalidKey(name) => AppError::NotFound(name),
            StorageError::AlreadyExists(name) => {
                AppError::Internal(format!("File already exists: {}", name))
            }
            StorageError::IdExhausted(attempts) => AppError::Internal(format!(
                "Could not allocate a unique file id after {} attempts",
                attempts
            )),
            StorageError::Serialization(e) => AppError::Storage(e.to_string()),
            StorageError::Io(e) => AppError::Storage(e.to_string()),
        };
        HttpAppError(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_storage_error_not_found() {
        let HttpAppError(app_err) = StorageError::NotFound("abcd1234.png".to_string()).into();
        assert!(matches!(app_err, AppError::NotFound(ref name) if name == "abcd1234.png"));
        assert_eq!(app_err.http_status_code(), 404);
    }

    #[test]
    fn test_from_storage_error_too_large() {
        let HttpAppError(app_err) = StorageError::TooLarge { max: 100 * 1024 * 1024 }.into();
        match app_err {
            AppError::PayloadTooLarge(msg) => assert!(msg.contains("100.0 MiB")),
            other => panic!("Expected PayloadTooLarge variant, got {:?}", other),
        }
    }

    #[test]
    fn test_from_storage_error_io_is_sensitive() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "/var/lib/kcst: disk full");
        let HttpAppError(app_err) = StorageError::Io(io_err).into();
        assert_eq!(app_err.http_status_code(), 500);
        assert!(app_err.is_sensitive());
        assert!(!app_err.client_message().contains("/var/lib"));
    }

    #[test]
    fn test_from_storage_error_id_exhausted() {
        let HttpAppError(app_err) = StorageError::IdExhausted(16).into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let response = HttpAppError(AppError::NotFound("x.png".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Not found");
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["recoverable"], false);
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_sensitive_errors_carry_no_detailed_body() {
        let response = HttpAppError(AppError::Storage("/var/lib/kcst".to_string())).into_response();
        assert!(response.extensions().get::<DetailedErrorBody>().is_none());

        let response = HttpAppError(AppError::NotFound("x.png".to_string())).into_response();
        assert!(response.extensions().get::<DetailedErrorBody>().is_some());
    }

    async fn render_with_policy(expose: bool) -> serde_json::Value {
        async fn missing() -> Result<(), HttpAppError> {
            Err(AppError::NotFound("x.png".to_string()).into())
        }

        let app = axum::Router::new()
            .route("/", axum::routing::get(missing))
            .layer(axum::middleware::from_fn_with_state(
                ErrorDetailPolicy { expose },
                error_details_middleware,
            ));
        let server = axum_test::TestServer::new(app).unwrap();

        let response = server.get("/").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        response.json()
    }

    #[tokio::test]
    async fn test_details_follow_policy() {
        let shown = render_with_policy(true).await;
        assert_eq!(shown["error_type"], "NotFound");
        assert!(shown["details"].as_str().unwrap().contains("x.png"));
        assert_eq!(shown["error"], "Not found");

        let hidden = render_with_policy(false).await;
        assert!(hidden.get("details").is_none());
        assert!(hidden.get("error_type").is_none());
        assert_eq!(hidden["code"], "NOT_FOUND");
    }
}
