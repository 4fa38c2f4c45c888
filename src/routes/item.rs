//! Item CRUD endpoints. Every handler is scoped to the caller's wallet.

use crate::auth::middleware::{AppState, AuthSession};
use crate::error::AppError;
use crate::models::{unix_now, ItemPayload, OkResponse, StoredItem};
use crate::routes::{validate_id, ApiJson, ITEM_ID_LEN};
use crate::storage;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

fn item_not_found() -> AppError {
    AppError::NotFound("Item not found".to_string())
}

/// GET /api/items — List the caller's items
pub async fn list_items(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state.redis_connection().await?;
    let items = storage::item::list_items(&mut con, &session.address).await?;
    Ok(Json(items))
}

/// POST /api/items — Create an item owned by the caller
pub async fn create_item(
    session: AuthSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    let fields = payload.into_new_item()?;
    let item = StoredItem::new(
        nanoid::nanoid!(ITEM_ID_LEN),
        &session.address,
        fields,
        unix_now(),
    );

    let mut con = state.redis_connection().await?;
    storage::item::store_item(&mut con, &item).await?;

    tracing::info!(action = "item_created", item_id = %item.id, owner = %item.user_id, "Item created");

    Ok(Json(item))
}

/// GET /api/items/{id} — Fetch one of the caller's items
pub async fn get_item(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validate_id(&id, "item ID", ITEM_ID_LEN)?;

    let mut con = state.redis_connection().await?;
    let item = storage::item::get_item(&mut con, &id, &session.address)
        .await?
        .ok_or_else(item_not_found)?;

    Ok(Json(item))
}

/// PUT /api/items/{id} — Partially update one of the caller's items
///
/// Only the fields present in the body change. Ownership and id are fixed.
pub async fn update_item(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    validate_id(&id, "item ID", ITEM_ID_LEN)?;
    let patch = patch.into_patch()?;

    let mut con = state.redis_connection().await?;
    let item = storage::item::update_item(&mut con, &id, &session.address, &patch, unix_now())
        .await?
        .ok_or_else(item_not_found)?;

    tracing::info!(action = "item_updated", item_id = %item.id, owner = %item.user_id, "Item updated");

    Ok(Json(item))
}

/// DELETE /api/items/{id} — Delete one of the caller's items
pub async fn delete_item(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validate_id(&id, "item ID", ITEM_ID_LEN)?;

    let mut con = state.redis_connection().await?;
    if !storage::item::delete_item(&mut con, &id, &session.address).await? {
        return Err(item_not_found());
    }

    tracing::info!(action = "item_deleted", item_id = %id, owner = %session.address, "Item deleted");

    Ok(Json(OkResponse::ok()))
}
