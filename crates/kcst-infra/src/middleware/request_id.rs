use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

const MAX_INCOMING_ID_LEN: usize = 128;

/// Request ID extension type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Request ID middleware
/// Reuses a caller-supplied X-Request-ID when it is short and printable, otherwise
/// generates one, and exposes it in:
/// - Response headers (X-Request-ID)
/// - Request extensions (for logging)
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= MAX_INCOMING_ID_LEN)
        .map(|s| s.to_string())
        .unwrap_or_else(generate_request_id);

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Extract request ID from request extensions
pub fn get_request_id<B>(request: &axum::http::Request<B>) -> Option<String> {
    request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
}

fn generate_request_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}
