use axum::extract::State;
use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};

/// Settings for [`security_headers_middleware`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SecurityHeaders {
    /// Send Strict-Transport-Security (production over HTTPS only)
    pub hsts: bool,
}

/// Security headers middleware
/// Adds security headers to all HTTP responses. Uploaded files are served from
/// the same origin, so the CSP sandboxes whatever the browser renders.
pub async fn security_headers_middleware(
    State(settings): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    // X-Content-Type-Options: Prevent MIME type sniffing
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );

    // X-Frame-Options: Prevent clickjacking
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));

    // Referrer-Policy: Control referrer information
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if settings.hsts {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    // Uploaded HTML or SVG must not run scripts on this origin.
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static(
            "default-src 'none'; img-src 'self' data:; media-src 'self'; style-src 'unsafe-inline'; sandbox",
        ),
    );

    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    response
}
