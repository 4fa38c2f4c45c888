//! Response hardening: security headers and CORS policy.

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Middleware that adds security headers to all responses.
///
/// - **Cache-Control: no-store**: item listings and `/api/me` are per-user.
/// - **X-Content-Type-Options: nosniff**
/// - **X-Frame-Options: DENY** and `frame-ancestors 'none'`
/// - **Referrer-Policy: no-referrer**
/// - **Content-Security-Policy**: the API only ever returns JSON, so nothing
///   may be loaded or executed from its responses.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    response
}

/// Build the CORS layer.
///
/// With no configured origins the layer grants nothing, leaving the API
/// same-origin only. Listed origins may send credentialed requests so the
/// session cookie travels with them. Origins that are not valid header
/// values are skipped with a warning.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}
