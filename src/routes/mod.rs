//! API route handlers.

pub mod auth;
pub mod item;

use crate::auth::middleware::AppState;
use crate::error::AppError;
use crate::middleware::{cors_layer, security_headers};
use axum::{
    extract::{DefaultBodyLimit, FromRequest},
    routing::{get, post},
    Router,
};

/// Length of generated item IDs.
pub const ITEM_ID_LEN: usize = 12;

/// `Json` extractor whose rejections use the API's JSON error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Validate that a string is a valid nanoid (alphanumeric, hyphens, underscores).
pub fn validate_id(id: &str, label: &str, expected_len: usize) -> Result<(), AppError> {
    if id.len() != expected_len
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest(format!("Invalid {} format", label)));
    }
    Ok(())
}

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Auth endpoints
        .route("/auth/nonce", post(auth::request_nonce))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/api/me", get(auth::me))
        // Item endpoints
        .route("/api/items", get(item::list_items).post(item::create_item))
        .route(
            "/api/items/{id}",
            get(item::get_item)
                .put(item::update_item)
                .delete(item::delete_item),
        )
        .fallback(not_found)
}

/// Build the full application: API routes plus body limit, CORS and
/// security headers, bound to `state`.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    api_router()
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(axum::middleware::from_fn(security_headers))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::issue_session_token;
    use crate::config::Config;
    use axum::{
        body::Body,
        extract::connect_info::MockConnectInfo,
        http::{header, Request, StatusCode},
    };
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";
    const ADDRESS: &str = "0xabcdef0123456789abcdef0123456789abcdef01";

    /// Router wired to a Redis URL that is never contacted by these requests.
    fn test_app() -> Router {
        let state = AppState {
            redis: redis::Client::open("redis://127.0.0.1:6379").unwrap(),
            config: Arc::new(Config {
                jwt_secret: SECRET.to_string(),
                redis_url: "redis://127.0.0.1:6379".to_string(),
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                max_body_bytes: 1024,
                session_ttl_secs: 3600,
                nonce_ttl_secs: 300,
                cookie_secure: false,
                rate_limit_auth_per_min: 10,
                cors_allowed_origins: Vec::new(),
            }),
        };
        app(state).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
    }

    async fn send(request: Request<Body>) -> (StatusCode, header::HeaderMap, serde_json::Value) {
        let response = test_app().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, headers, json)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_items_require_session() {
        let request = Request::builder().uri("/api/items").body(Body::empty()).unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "not authenticated");
    }

    #[tokio::test]
    async fn test_tampered_cookie_rejected() {
        let request = Request::builder()
            .uri("/api/me")
            .header(header::COOKIE, "session=eyJhbGciOiJIUzI1NiJ9.e30.c2ln")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid token");
    }

    #[tokio::test]
    async fn test_me_returns_session_address() {
        let token = issue_session_token(SECRET.as_bytes(), ADDRESS, 60).unwrap();
        let request = Request::builder()
            .uri("/api/me")
            .header(header::COOKIE, format!("session={}", token))
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["address"], ADDRESS);
        assert_eq!(headers.get("cache-control").unwrap(), "no-store");
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let (status, headers, body) = send(post_json("/auth/logout", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_nonce_requires_address() {
        let (status, _, body) = send(post_json("/auth/nonce", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "address required");

        let (status, _, body) = send(post_json("/auth/nonce", r#"{"address":"bob"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid address");
    }

    #[tokio::test]
    async fn test_login_requires_address_and_signature() {
        let body = format!(r#"{{"address":"{}"}}"#, ADDRESS);
        let (status, _, body) = send(post_json("/auth/login", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "address and signature required");
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_error() {
        let (status, _, body) = send(post_json("/auth/nonce", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let huge = format!(r#"{{"address":"{}"}}"#, "a".repeat(4096));
        let (status, _, body) = send(post_json("/auth/nonce", &huge)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_content_type_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/nonce")
            .body(Body::from(format!(r#"{{"address":"{}"}}"#, ADDRESS)))
            .unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_invalid_item_id_rejected_before_storage() {
        let token = issue_session_token(SECRET.as_bytes(), ADDRESS, 60).unwrap();
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/items/bad-id")
            .header(header::COOKIE, format!("session={}", token))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid item ID format");
    }

    #[tokio::test]
    async fn test_invalid_patch_rejected_before_storage() {
        let token = issue_session_token(SECRET.as_bytes(), ADDRESS, 60).unwrap();
        let request = Request::builder()
            .method("PUT")
            .uri("/api/items/V1StGXR8_Z5j")
            .header(header::COOKIE, format!("session={}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"unitPrice":-1}"#))
            .unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unitPrice must be a non-negative number");
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("V1StGXR8_Z5j", "item ID", ITEM_ID_LEN).is_ok());
        assert!(validate_id("short", "item ID", ITEM_ID_LEN).is_err());
        assert!(validate_id("V1StGXR8/Z5j", "item ID", ITEM_ID_LEN).is_err());
        assert!(matches!(
            validate_id("../../etc/pa", "item ID", ITEM_ID_LEN),
            Err(AppError::BadRequest(ref msg)) if msg == "Invalid item ID format"
        ));
    }
}
