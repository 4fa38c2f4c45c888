//! Nonce generation and stateless session tokens.

use crate::error::AppError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix of every login challenge shown in the wallet prompt.
pub const NONCE_MESSAGE_PREFIX: &str = "Sign this nonce to login: ";

/// Generate a login challenge message.
///
/// Format: `Sign this nonce to login: {64 hex chars} - {unix millis}`.
/// The hex part comes from 32 bytes of the thread-local CSPRNG.
pub fn generate_nonce_message() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);

    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    format!("{}{} - {}", NONCE_MESSAGE_PREFIX, hex::encode(bytes), millis)
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Normalized wallet address.
    pub address: String,
    pub iat: u64,
    pub exp: u64,
}

/// Mint an HS256 session token for `address` valid for `ttl_secs`.
pub fn issue_session_token(secret: &[u8], address: &str, ttl_secs: u64) -> Result<String, AppError> {
    let now = crate::models::unix_now();
    let exp = now
        .checked_add(ttl_secs)
        .ok_or_else(|| AppError::Internal(format!("Session TTL overflows: {}", ttl_secs)))?;
    let claims = SessionClaims {
        address: address.to_string(),
        iat: now,
        exp,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
}

/// Verify a session token's signature and expiry.
///
/// Any failure (tampered, foreign key, wrong algorithm, expired, malformed)
/// is reported as `Unauthorized("invalid token")`.
pub fn verify_session_token(secret: &[u8], token: &str) -> Result<SessionClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<SessionClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            AppError::Unauthorized("invalid token".to_string())
        })?;

    // Tokens are only ever minted for normalized addresses
    crate::auth::verify::normalize_address(&data.claims.address)
        .ok()
        .filter(|a| a == &data.claims.address)
        .ok_or_else(|| AppError::Unauthorized("invalid token".to_string()))?;

    Ok(data.claims)
}
