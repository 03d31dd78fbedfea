//! HTTP error response body
//!
//! This module provides the ErrorResponse type for HTTP error responses.
//! Note: IntoResponse for AppError lives in the API crate (kcst-api) because of
//! the orphan rule: axum's trait cannot be implemented here for kcst_core's type.

use serde::Serialize;

/// Standard error response format for HTTP APIs
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Always `false`, so clients can branch on one field for every response
    pub success: bool,
    pub error: String,
    /// Machine-readable code such as `NOT_FOUND`
    pub code: &'static str,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &'static str, recoverable: bool) -> Self {
        Self {
            success: false,
            error: error.into(),
            code,
            recoverable,
            suggested_action: None,
            details: None,
            error_type: None,
        }
    }

    pub fn with_suggested_action(mut self, action: Option<&'static str>) -> Self {
        self.suggested_action = action;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>, error_type: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self.error_type = Some(error_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_are_omitted() {
        let body = serde_json::to_value(ErrorResponse::new("Not found", "NOT_FOUND", false)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NOT_FOUND");
        assert!(body.get("details").is_none());
        assert!(body.get("error_type").is_none());
        assert!(body.get("suggested_action").is_none());
    }

    #[test]
    fn test_details_are_serialized_when_set() {
        let body = serde_json::to_value(
            ErrorResponse::new("Internal server error", "INTERNAL_ERROR", true)
                .with_suggested_action(Some("Retry after a short delay"))
                .with_details("disk full", "Internal"),
        )
        .unwrap();
        assert_eq!(body["details"], "disk full");
        assert_eq!(body["error_type"], "Internal");
        assert_eq!(body["suggested_action"], "Retry after a short delay");
    }
}
