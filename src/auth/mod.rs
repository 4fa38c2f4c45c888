//! Wallet-signature authentication and stateless session handling.

pub mod cookie;
pub mod middleware;
pub mod session;
pub mod verify;

pub use middleware::{check_rate_limit, AppState, AuthSession};
pub use session::{generate_nonce_message, issue_session_token, verify_session_token};
pub use verify::{normalize_address, verify_signature};
