//! Item storage operations.
//!
//! Redis key patterns:
//! - `item:{nanoid}` — item document (JSON)
//! - `user_items:{address}` — SET of item IDs owned by a wallet
//!
//! Every read and write is scoped to an owner address. Items belonging to
//! someone else behave exactly like missing items.

use crate::models::{ItemPatch, StoredItem};
use crate::storage::{from_json, to_json};
use redis::AsyncCommands;

fn item_key(id: &str) -> String {
    format!("item:{}", id)
}

fn user_items_key(address: &str) -> String {
    format!("user_items:{}", address)
}

/// Store a new item and index it under its owner.
pub async fn store_item<C>(con: &mut C, item: &StoredItem) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    let json = to_json(item)?;

    // Document first, so the index never points at nothing for long
    con.set::<_, _, ()>(item_key(&item.id), json).await?;
    con.sadd::<_, _, ()>(user_items_key(&item.user_id), &item.id)
        .await?;

    Ok(())
}

/// Get an item if it exists and belongs to `owner`.
pub async fn get_item<C>(
    con: &mut C,
    id: &str,
    owner: &str,
) -> Result<Option<StoredItem>, redis::RedisError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(item_key(id)).await?;

    match json {
        Some(data) => {
            let item: StoredItem = from_json(&data)?;
            if item.user_id == owner {
                Ok(Some(item))
            } else {
                Ok(None)
            }
        }
        None => Ok(None),
    }
}

/// List all items owned by `owner`, oldest first.
///
/// IDs left in the owner's set without a document are dropped from the set.
pub async fn list_items<C>(con: &mut C, owner: &str) -> Result<Vec<StoredItem>, redis::RedisError>
where
    C: AsyncCommands,
{
    let set_key = user_items_key(owner);
    let ids: Vec<String> = con.smembers(&set_key).await?;

    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<String> = ids.iter().map(|id| item_key(id)).collect();
    // Explicit MGET: a single-key mget would otherwise be sent as GET
    let docs: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(con).await?;

    let mut items = Vec::with_capacity(ids.len());
    let mut stale = Vec::new();

    for (id, doc) in ids.into_iter().zip(docs) {
        match doc {
            Some(data) => {
                let item: StoredItem = from_json(&data)?;
                if item.user_id == owner {
                    items.push(item);
                } else {
                    stale.push(id);
                }
            }
            None => stale.push(id),
        }
    }

    if !stale.is_empty() {
        tracing::warn!(
            action = "item_index_repair",
            owner = %owner,
            stale = stale.len(),
            "Dropping stale item ids from owner index"
        );
        con.srem::<_, _, ()>(&set_key, &stale).await?;
    }

    items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(items)
}

/// Attempts before a contended update gives up.
const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Apply `patch` to an item owned by `owner` and stamp `updated_at`.
///
/// The merge happens in Rust, and the write is a Lua compare-and-set against
/// the exact document that was read. If another writer got there first, the
/// item is re-read and the patch re-applied, so concurrent partial updates
/// never overwrite each other.
///
/// Returns the updated item, or None if it is missing or owned by someone else.
pub async fn update_item<C>(
    con: &mut C,
    id: &str,
    owner: &str,
    patch: &ItemPatch,
    now: u64,
) -> Result<Option<StoredItem>, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = item_key(id);
    let script = redis::Script::new(
        r#"
        local val = redis.call('GET', KEYS[1])
        if not val then
            return 0
        end
        if val ~= ARGV[1] then
            return -1
        end
        redis.call('SET', KEYS[1], ARGV[2])
        return 1
        "#,
    );

    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let current: Option<String> = con.get(&key).await?;
        let Some(current) = current else {
            return Ok(None);
        };

        let mut item: StoredItem = from_json(&current)?;
        if item.user_id != owner {
            return Ok(None);
        }
        patch.apply_to(&mut item);
        item.updated_at = now;
        let json = to_json(&item)?;

        let outcome: i32 = script
            .key(&key)
            .arg(&current)
            .arg(json)
            .invoke_async(con)
            .await?;

        match outcome {
            1 => return Ok(Some(item)),
            0 => return Ok(None),
            _ => {
                tracing::debug!(item_id = %id, attempt, "Item changed during update, retrying");
            }
        }
    }

    Err(redis::RedisError::from((
        redis::ErrorKind::ResponseError,
        "Item update contended",
        format!("gave up after {} attempts", MAX_UPDATE_ATTEMPTS),
    )))
}

/// Delete an item owned by `owner` and remove it from the owner's index.
///
/// Returns true if the item was deleted, false if it was missing or owned by
/// someone else.
pub async fn delete_item<C>(con: &mut C, id: &str, owner: &str) -> Result<bool, redis::RedisError>
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
        if obj.userId ~= ARGV[1] then
            return 0
        end
        redis.call('DEL', KEYS[1])
        redis.call('SREM', KEYS[2], ARGV[2])
        return 1
        "#,
    );

    let deleted: i32 = script
        .key(item_key(id))
        .key(user_items_key(owner))
        .arg(owner)
        .arg(id)
        .invoke_async(con)
        .await?;

    Ok(deleted == 1)
}
