//! Login nonce Redis operations.
//!
//! Redis key patterns:
//! - `nonce:{address}` — outstanding challenge for a wallet (JSON, TTL)
//!
//! One nonce per address: requesting a new one replaces the old one. Nonce
//! JSON is held in `Zeroizing` buffers while in application memory.

use crate::models::StoredNonce;
use crate::storage::{from_json, to_json};
use redis::AsyncCommands;
use zeroize::Zeroizing;

fn nonce_key(address: &str) -> String {
    format!("nonce:{}", address)
}

/// Store the outstanding nonce for `address`, replacing any previous one.
pub async fn store_nonce<C>(
    con: &mut C,
    address: &str,
    nonce: &StoredNonce,
    ttl_secs: u64,
) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    let json = to_json(nonce)?;
    con.set_ex::<_, _, ()>(nonce_key(address), json, ttl_secs)
        .await?;
    Ok(())
}

/// Get the outstanding nonce for `address` without consuming it.
pub async fn get_nonce<C>(
    con: &mut C,
    address: &str,
) -> Result<Option<StoredNonce>, redis::RedisError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(nonce_key(address)).await?;

    match json {
        Some(data) => {
            let zeroizing_data = Zeroizing::new(data);
            Ok(Some(from_json(&zeroizing_data)?))
        }
        None => Ok(None),
    }
}

/// Delete the nonce for `address` only if it still holds `message`.
///
/// Compare-and-delete runs as one Lua script, so two logins racing on the
/// same nonce cannot both succeed. Returns true if this call consumed it.
pub async fn consume_nonce<C>(
    con: &mut C,
    address: &str,
    message: &str,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let script = redis::Script::new(
        r#"
        local val = redis.call('GET', KEYS[1])
        if not val then
            return 0
        end
        local obj = cjson.decode(val)
        if obj.message ~= ARGV[1] then
            return 0
        end
        redis.call('DEL', KEYS[1])
        return 1
        "#,
    );

    let consumed: i32 = script
        .key(nonce_key(address))
        .arg(message)
        .invoke_async(con)
        .await?;

    Ok(consumed == 1)
}
