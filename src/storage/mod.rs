//! Redis storage layer for items and login nonces.
//!
//! All functions are async and generic over `redis::AsyncCommands`.
//! Documents are serialized to JSON for storage in Redis.

pub mod item;
pub mod nonce;

use serde::{de::DeserializeOwned, Serialize};

/// Serialize a document, reporting failures as Redis errors so storage
/// functions keep a single error type.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, redis::RedisError> {
    serde_json::to_string(value).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "JSON serialize",
            e.to_string(),
        ))
    })
}

pub(crate) fn from_json<T: DeserializeOwned>(data: &str) -> Result<T, redis::RedisError> {
    serde_json::from_str(data).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "JSON deserialize",
            e.to_string(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoredNonce;

    #[test]
    fn test_bad_json_is_type_error() {
        let err = from_json::<StoredNonce>("{not json").unwrap_err();
        assert_eq!(err.kind(), redis::ErrorKind::TypeError);
    }

    #[test]
    fn test_json_roundtrip() {
        let nonce = StoredNonce {
            message: "hello".to_string(),
            created_at: 7,
        };
        let decoded: StoredNonce = from_json(&to_json(&nonce).unwrap()).unwrap();
        assert_eq!(decoded.message, "hello");
        assert_eq!(decoded.created_at, 7);
    }
}
