//! Axum extractors for authentication and rate limiting.

use crate::auth::cookie::session_token_from_headers;
use crate::auth::session::verify_session_token;
use crate::config::Config;
use crate::error::AppError;
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use redis::AsyncCommands;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub redis: redis::Client,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open a multiplexed connection for one request.
    pub async fn redis_connection(
        &self,
    ) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))
    }
}

/// Authenticated session extractor.
///
/// Reads the session token from the `session` cookie, falling back to an
/// `Authorization: Bearer {token}` header. Tokens are stateless, so no
/// storage lookup happens here.
pub struct AuthSession {
    /// Normalized wallet address of the caller.
    pub address: String,
    /// Unix time at which the token expires.
    pub expires_at: u64,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token_from_headers(&parts.headers)
            .or_else(|| {
                parts
                    .headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
            })
            .ok_or_else(|| AppError::Unauthorized("not authenticated".to_string()))?;

        let claims = verify_session_token(state.config.jwt_secret.as_bytes(), &token)?;

        Ok(AuthSession {
            address: claims.address,
            expires_at: claims.exp,
        })
    }
}

/// Optional session extractor.
///
/// Yields `None` instead of rejecting when the session is missing or invalid.
impl OptionalFromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <AuthSession as FromRequestParts<AppState>>::from_request_parts(parts, state).await {
            Ok(session) => Ok(Some(session)),
            Err(_) => Ok(None),
        }
    }
}

/// Check rate limit using Redis INCR with TTL.
///
/// # Arguments
/// * `con` - Redis connection
/// * `key` - Rate limit key (e.g., "ratelimit:auth:127.0.0.1")
/// * `max` - Maximum requests allowed in window
/// * `window_secs` - Time window in seconds
///
/// # Returns
/// * `Ok(true)` if under limit
/// * `Ok(false)` if limit exceeded
pub async fn check_rate_limit<C>(
    con: &mut C,
    key: &str,
    max: u32,
    window_secs: u64,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let count: u32 = con.incr(key, 1).await?;

    // Start the window on the first request
    if count == 1 {
        con.expire::<_, ()>(key, window_secs as i64).await?;
    }

    Ok(count <= max)
}

/// Hash a client IP for log lines so raw addresses are never written out.
pub fn ip_hash(ip: &IpAddr) -> String {
    let mut hasher = std::hash::DefaultHasher::new();
    ip.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::issue_session_token;
    use axum::http::Request;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";
    const ADDRESS: &str = "0xabcdef0123456789abcdef0123456789abcdef01";

    fn test_state() -> AppState {
        AppState {
            redis: redis::Client::open("redis://127.0.0.1:6379").unwrap(),
            config: Arc::new(Config {
                jwt_secret: SECRET.to_string(),
                redis_url: "redis://127.0.0.1:6379".to_string(),
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                max_body_bytes: 1_048_576,
                session_ttl_secs: 3600,
                nonce_ttl_secs: 300,
                cookie_secure: false,
                rate_limit_auth_per_min: 10,
                cors_allowed_origins: Vec::new(),
            }),
        }
    }

    async fn extract(request: Request<()>) -> Result<AuthSession, AppError> {
        let (mut parts, _) = request.into_parts();
        <AuthSession as FromRequestParts<AppState>>::from_request_parts(&mut parts, &test_state())
            .await
    }

    #[tokio::test]
    async fn test_session_from_cookie() {
        let token = issue_session_token(SECRET.as_bytes(), ADDRESS, 3600).unwrap();
        let request = Request::builder()
            .header("cookie", format!("session={}", token))
            .body(())
            .unwrap();

        let session = extract(request).await.unwrap();
        assert_eq!(session.address, ADDRESS);
        assert!(session.expires_at > crate::models::unix_now());
    }

    #[tokio::test]
    async fn test_session_from_bearer_header() {
        let token = issue_session_token(SECRET.as_bytes(), ADDRESS, 3600).unwrap();
        let request = Request::builder()
            .header("authorization", format!("Bearer {}", token))
            .body(())
            .unwrap();

        assert_eq!(extract(request).await.unwrap().address, ADDRESS);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(
            extract(request).await,
            Err(AppError::Unauthorized(ref msg)) if msg == "not authenticated"
        ));
    }

    #[tokio::test]
    async fn test_invalid_session() {
        let request = Request::builder()
            .header("cookie", "session=not.a.jwt")
            .body(())
            .unwrap();
        assert!(matches!(
            extract(request).await,
            Err(AppError::Unauthorized(ref msg)) if msg == "invalid token"
        ));
    }

    #[tokio::test]
    async fn test_optional_session_swallows_errors() {
        let (mut parts, _) = Request::builder()
            .header("cookie", "session=garbage")
            .body(())
            .unwrap()
            .into_parts();
        let session = <AuthSession as OptionalFromRequestParts<AppState>>::from_request_parts(
            &mut parts,
            &test_state(),
        )
        .await
        .unwrap();
        assert!(session.is_none());
    }

    #[test]
    fn test_ip_hash_is_stable_and_opaque() {
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        assert_eq!(ip_hash(&ip), ip_hash(&ip));
        assert_ne!(ip_hash(&ip), ip.to_string());
        assert!(ip_hash(&ip).chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_check_rate_limit() {
        // Requires a running Redis instance; skipped otherwise
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let client = match redis::Client::open(redis_url) {
            Ok(c) => c,
            Err(_) => {
                eprintln!("Skipping test: Redis not available");
                return;
            }
        };

        let mut con = match client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(_) => {
                eprintln!("Skipping test: Redis connection failed");
                return;
            }
        };

        let test_key = format!("test:ratelimit:unit:{}", nanoid::nanoid!(8));

        assert!(check_rate_limit(&mut con, &test_key, 3, 60).await.unwrap());
        assert!(check_rate_limit(&mut con, &test_key, 3, 60).await.unwrap());
        assert!(check_rate_limit(&mut con, &test_key, 3, 60).await.unwrap());
        assert!(!check_rate_limit(&mut con, &test_key, 3, 60).await.unwrap());

        let _: Result<(), _> = con.del(&test_key).await;
    }
}
