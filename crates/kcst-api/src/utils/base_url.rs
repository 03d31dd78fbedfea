//! Public base URL resolution for links in responses.

use axum::http::{header, HeaderMap};

/// The configured base URL, or one derived from the request's Host header.
///
/// The scheme is `https` only when a proxy says so via `X-Forwarded-Proto`.
pub fn resolve_base_url(configured: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = configured {
        return base.trim_end_matches('/').to_string();
    }

    let scheme = match headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
    {
        Some(proto) if proto.trim().eq_ignore_ascii_case("https") => "https",
        _ => "http",
    };

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}
