//! API middleware layers.
//!
//! Deprecation headers for the legacy flat polling endpoints.

use axum::http::header::HeaderName;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

/// Date after which the flat `/api/*` endpoints may be removed.
pub const LEGACY_SUNSET: &str = "2027-06-30";

/// Axum middleware that adds RFC 8594 deprecation headers to legacy responses.
///
/// - `Deprecation: true`
/// - `Sunset: 2027-06-30`
pub async fn add_legacy_deprecation_headers(
    request: axum::extract::Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("deprecation"),
        HeaderValue::from_static("true"),
    );
    headers.insert(
        HeaderName::from_static("sunset"),
        HeaderValue::from_static(LEGACY_SUNSET),
    );

    response
}
