//! Request and response models for the API.
//!
//! Wire names follow the browser client (`_id`, `unitPrice`, `imageUrl`, ...).
//! Storage models are the JSON documents kept in Redis.

use crate::error::AppError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Models
// ============================================================================

/// Request for a login nonce.
#[derive(Debug, Deserialize)]
pub struct NonceRequest {
    pub address: Option<String>,
}

/// Response containing the message the wallet must sign.
#[derive(Debug, Serialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// Request to log in with a signed nonce.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub address: Option<String>,
    pub signature: Option<String>, // hex, 65 bytes
}

/// Generic `{ "ok": true }` acknowledgement.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        OkResponse { ok: true }
    }
}

/// Current user lookup.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub address: String,
}

// ============================================================================
// Item Models
// ============================================================================

pub const MAX_ITEM_NAME_LEN: usize = 200;
pub const MAX_UNIT_LEN: usize = 32;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_IMAGE_URL_LEN: usize = 2048;

/// Item fields as sent by the client on create and update.
///
/// Every field is optional at the parsing stage so that missing fields are
/// reported as a JSON 400 instead of a deserializer rejection. Unknown
/// fields such as `_id` or `userId` are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    pub item: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub unit_price: Option<f64>,
    pub image_url: Option<String>,
}

/// A validated set of item fields ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub item: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub image_url: Option<String>,
}

impl ItemPayload {
    /// Validate a create request: `item`, `quantity`, `unit` and `unitPrice`
    /// are required.
    pub fn into_new_item(self) -> Result<NewItem, AppError> {
        let item = self
            .item
            .ok_or_else(|| AppError::BadRequest("item is required".to_string()))?;
        let quantity = self
            .quantity
            .ok_or_else(|| AppError::BadRequest("quantity is required".to_string()))?;
        let unit = self
            .unit
            .ok_or_else(|| AppError::BadRequest("unit is required".to_string()))?;
        let unit_price = self
            .unit_price
            .ok_or_else(|| AppError::BadRequest("unitPrice is required".to_string()))?;

        Ok(NewItem {
            item: validate_text("item", &item, MAX_ITEM_NAME_LEN, true)?,
            description: optional_text("description", self.description, MAX_DESCRIPTION_LEN)?,
            quantity: validate_amount("quantity", quantity)?,
            unit: validate_text("unit", &unit, MAX_UNIT_LEN, true)?,
            unit_price: validate_amount("unitPrice", unit_price)?,
            image_url: optional_text("imageUrl", self.image_url, MAX_IMAGE_URL_LEN)?,
        })
    }

    /// Validate an update request. Only the fields present are checked and
    /// carried into the patch.
    pub fn into_patch(self) -> Result<ItemPatch, AppError> {
        Ok(ItemPatch {
            item: self
                .item
                .map(|v| validate_text("item", &v, MAX_ITEM_NAME_LEN, true))
                .transpose()?,
            description: self
                .description
                .map(|v| optional_text("description", Some(v), MAX_DESCRIPTION_LEN))
                .transpose()?,
            quantity: self
                .quantity
                .map(|v| validate_amount("quantity", v))
                .transpose()?,
            unit: self
                .unit
                .map(|v| validate_text("unit", &v, MAX_UNIT_LEN, true))
                .transpose()?,
            unit_price: self
                .unit_price
                .map(|v| validate_amount("unitPrice", v))
                .transpose()?,
            image_url: self
                .image_url
                .map(|v| optional_text("imageUrl", Some(v), MAX_IMAGE_URL_LEN))
                .transpose()?,
        })
    }
}

/// A validated partial update.
///
/// `description` and `imageUrl` use `Some(None)` to clear the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub item: Option<String>,
    pub description: Option<Option<String>>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub unit_price: Option<f64>,
    pub image_url: Option<Option<String>>,
}

impl ItemPatch {
    /// Apply the patch on top of a stored item.
    ///
    /// Ownership, id and timestamps are never touched.
    pub fn apply_to(&self, stored: &mut StoredItem) {
        if let Some(item) = &self.item {
            stored.item = item.clone();
        }
        if let Some(description) = &self.description {
            stored.description = description.clone();
        }
        if let Some(quantity) = self.quantity {
            stored.quantity = quantity;
        }
        if let Some(unit) = &self.unit {
            stored.unit = unit.clone();
        }
        if let Some(unit_price) = self.unit_price {
            stored.unit_price = unit_price;
        }
        if let Some(image_url) = &self.image_url {
            stored.image_url = image_url.clone();
        }
    }
}

fn validate_text(field: &str, value: &str, max_len: usize, required: bool) -> Result<String, AppError> {
    let trimmed = value.trim();
    if required && trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

/// Empty strings collapse to `None`.
fn optional_text(
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> Result<Option<String>, AppError> {
    match value {
        Some(v) => {
            let text = validate_text(field, &v, max_len, false)?;
            Ok(if text.is_empty() { None } else { Some(text) })
        }
        None => Ok(None),
    }
}

fn validate_amount(field: &str, value: f64) -> Result<f64, AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::BadRequest(format!(
            "{} must be a non-negative number",
            field
        )));
    }
    Ok(value)
}

// ============================================================================
// Storage Models
// ============================================================================

/// Item document as stored in Redis and returned to the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub user_id: String,
    pub created_at: u64,
    pub updated_at: u64,
}

impl StoredItem {
    pub fn new(id: String, owner: &str, fields: NewItem, now: u64) -> Self {
        StoredItem {
            id,
            item: fields.item,
            description: fields.description,
            quantity: fields.quantity,
            unit: fields.unit,
            unit_price: fields.unit_price,
            image_url: fields.image_url,
            user_id: owner.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Nonce data as stored in Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNonce {
    pub message: String,
    pub created_at: u64,
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
