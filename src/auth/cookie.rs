//! Session cookie handling.

use axum::http::{header, HeaderMap};
use cookie::{time::Duration, Cookie, SameSite};

/// Name of the HTTP-only cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Build the `Set-Cookie` value for a freshly issued session token.
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(i64::try_from(max_age_secs).unwrap_or(i64::MAX)))
        .build()
        .to_string()
}

/// Build the `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    cookie.make_removal();
    cookie.to_string()
}

/// Find the session token in the request's `Cookie` headers.
///
/// Unparsable cookie pairs are skipped.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value.to_string()).filter_map(Result::ok))
        .find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}
