use std::env;
use std::net::SocketAddr;

/// Minimum accepted length of `JWT_SECRET` in bytes (HS256 key size).
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Upper bound for session and nonce TTLs (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct Config {
    // Session signing
    pub jwt_secret: String,

    // Redis
    pub redis_url: String,

    // Server
    pub bind_addr: SocketAddr,

    // Limits
    pub max_body_bytes: usize,

    // TTLs (in seconds)
    pub session_ttl_secs: u64,
    pub nonce_ttl_secs: u64,

    // Cookie
    pub cookie_secure: bool,

    // Rate limiting
    pub rate_limit_auth_per_min: u32,

    // CORS
    pub cors_allowed_origins: Vec<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("nonce_ttl_secs", &self.nonce_ttl_secs)
            .field("cookie_secure", &self.cookie_secure)
            .field("rate_limit_auth_per_min", &self.rate_limit_auth_per_min)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // .env is optional; production sets variables directly
        let _ = dotenvy::dotenv();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;

        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                format!("must be at least {} bytes", MIN_JWT_SECRET_BYTES),
            ));
        }

        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        // Limits
        let max_body_bytes = parse_env_or_default("MAX_BODY_BYTES", 1_048_576)?;

        // TTLs
        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", 21_600)?;
        let nonce_ttl_secs = parse_env_or_default("NONCE_TTL_SECS", 300)?;

        validate_ttl("SESSION_TTL_SECS", session_ttl_secs)?;
        validate_ttl("NONCE_TTL_SECS", nonce_ttl_secs)?;

        let cookie_secure = parse_bool_or_default("COOKIE_SECURE", false)?;

        // Rate limiting
        let rate_limit_auth_per_min = parse_env_or_default("RATE_LIMIT_AUTH_PER_MIN", 10)?;

        // CORS
        let cors_allowed_origins: Vec<String> = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            jwt_secret,
            redis_url,
            bind_addr,
            max_body_bytes,
            session_ttl_secs,
            nonce_ttl_secs,
            cookie_secure,
            rate_limit_auth_per_min,
            cors_allowed_origins,
        })
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

/// TTLs must be non-zero and at most `MAX_TTL_SECS`.
fn validate_ttl(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_TTL_SECS {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be between 1 and {}", MAX_TTL_SECS),
        ));
    }
    Ok(())
}

/// Accepts `true`/`false`/`1`/`0` (case-insensitive).
fn parse_bool_or_default(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::ParseError(
                key.to_string(),
                format!("expected true or false: {}", val),
            )),
        },
        Err(_) => Ok(default),
    }
}
