//! Auth API endpoints.

use crate::auth::cookie::{clear_session_cookie, session_cookie};
use crate::auth::middleware::{check_rate_limit, ip_hash, AppState, AuthSession};
use crate::auth::session::{generate_nonce_message, issue_session_token};
use crate::auth::verify::{normalize_address, verify_signature};
use crate::error::AppError;
use crate::models::{
    unix_now, LoginRequest, MeResponse, NonceRequest, NonceResponse, OkResponse, StoredNonce,
};
use crate::routes::ApiJson;
use crate::storage;
use axum::{
    extract::{ConnectInfo, State},
    http::header,
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;

/// Apply the per-IP auth rate limit.
async fn enforce_auth_rate_limit<C>(
    con: &mut C,
    state: &AppState,
    addr: &SocketAddr,
    endpoint: &'static str,
) -> Result<(), AppError>
where
    C: redis::AsyncCommands,
{
    let rate_limit_key = format!("ratelimit:auth:{}", addr.ip());
    let allowed = check_rate_limit(con, &rate_limit_key, state.config.rate_limit_auth_per_min, 60)
        .await
        .map_err(|e| AppError::Internal(format!("Rate limit check failed: {}", e)))?;

    if !allowed {
        tracing::warn!(action = "rate_limited", endpoint, ip_hash = %ip_hash(&addr.ip()), "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(())
}

/// POST /auth/nonce — Issue a login challenge for an address
pub async fn request_nonce(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ApiJson(req): ApiJson<NonceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let address = req
        .address
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("address required".to_string()))?;
    let address = normalize_address(&address)?;

    let mut con = state.redis_connection().await?;
    enforce_auth_rate_limit(&mut con, &state, &addr, "auth/nonce").await?;

    let message = generate_nonce_message();
    let nonce = StoredNonce {
        message: message.clone(),
        created_at: unix_now(),
    };
    storage::nonce::store_nonce(&mut con, &address, &nonce, state.config.nonce_ttl_secs).await?;

    tracing::debug!(action = "nonce_issued", address = %address, "Login nonce issued");

    Ok(Json(NonceResponse { nonce: message }))
}

/// POST /auth/login — Verify the signed nonce and set the session cookie
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (address, signature) = match (req.address, req.signature) {
        (Some(a), Some(s)) if !a.trim().is_empty() && !s.trim().is_empty() => (a, s),
        _ => {
            return Err(AppError::BadRequest(
                "address and signature required".to_string(),
            ))
        }
    };
    let address = normalize_address(&address)?;

    let mut con = state.redis_connection().await?;
    enforce_auth_rate_limit(&mut con, &state, &addr, "auth/login").await?;

    let nonce = storage::nonce::get_nonce(&mut con, &address)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("no nonce for address; request a nonce first".to_string())
        })?;

    if !verify_signature(&address, &nonce.message, &signature)? {
        tracing::warn!(action = "auth_failed", address = %address, "Invalid signature");
        return Err(AppError::Unauthorized("invalid signature".to_string()));
    }

    // Single use: a concurrent login (or a newer nonce) wins over this one
    if !storage::nonce::consume_nonce(&mut con, &address, &nonce.message).await? {
        tracing::warn!(action = "auth_failed", address = %address, "Nonce already consumed");
        return Err(AppError::Unauthorized("nonce already used; request a new one".to_string()));
    }

    let token = issue_session_token(
        state.config.jwt_secret.as_bytes(),
        &address,
        state.config.session_ttl_secs,
    )?;
    let cookie = session_cookie(
        &token,
        state.config.session_ttl_secs,
        state.config.cookie_secure,
    );

    tracing::info!(action = "auth_success", address = %address, "Wallet authenticated");

    Ok(([(header::SET_COOKIE, cookie)], Json(OkResponse::ok())))
}

/// POST /auth/logout — Clear the session cookie
///
/// Tokens are stateless, so logout only removes the browser's copy.
pub async fn logout(
    State(state): State<AppState>,
    session: Option<AuthSession>,
) -> impl IntoResponse {
    if let Some(session) = session {
        tracing::info!(action = "logout", address = %session.address, "User logged out");
    }

    (
        [(header::SET_COOKIE, clear_session_cookie(state.config.cookie_secure))],
        Json(OkResponse::ok()),
    )
}

/// GET /api/me — Current user
pub async fn me(session: AuthSession) -> Json<MeResponse> {
    Json(MeResponse {
        address: session.address,
    })
}
