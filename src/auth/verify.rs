//! Ethereum personal-message signature recovery (EIP-191, secp256k1).

use crate::error::AppError;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

/// Length of a `r || s || v` signature in bytes.
const SIGNATURE_LEN: usize = 65;

/// Normalize a wallet address to lowercase `0x` + 40 hex digits.
///
/// Returns `BadRequest("invalid address")` for anything that is not a
/// 20-byte hex address. Checksum casing is accepted but not enforced.
pub fn normalize_address(address: &str) -> Result<String, AppError> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| AppError::BadRequest("invalid address".to_string()))?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::BadRequest("invalid address".to_string()));
    }

    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// Hash a message the way wallets do for `personal_sign`:
/// `keccak256("\x19Ethereum Signed Message:\n" + len + message)`.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Derive the lowercase `0x` address of a secp256k1 public key.
pub fn address_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Decode a hex `r || s || v` signature into its parts.
///
/// `v` may be 0/1 or 27/28. High-S signatures are normalized (flipping the
/// recovery parity) since k256 only verifies low-S.
fn parse_signature(signature_hex: &str) -> Result<(Signature, RecoveryId), AppError> {
    let trimmed = signature_hex.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes = hex::decode(hex_part)
        .map_err(|_| AppError::BadRequest("invalid signature format".to_string()))?;

    if bytes.len() != SIGNATURE_LEN {
        return Err(AppError::BadRequest(format!(
            "invalid signature length: expected {} bytes, got {}",
            SIGNATURE_LEN,
            bytes.len()
        )));
    }

    let v = match bytes[64] {
        0 | 1 => bytes[64],
        27 | 28 => bytes[64] - 27,
        _ => {
            return Err(AppError::BadRequest(
                "invalid signature recovery id".to_string(),
            ))
        }
    };

    let mut signature = Signature::from_slice(&bytes[..64])
        .map_err(|_| AppError::BadRequest("invalid signature format".to_string()))?;
    let mut recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| AppError::BadRequest("invalid signature recovery id".to_string()))?;

    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    Ok((signature, recovery_id))
}

/// Recover the address that produced a `personal_sign` signature over `message`.
///
/// # Returns
/// * `Ok(Some(address))` if a public key was recovered
/// * `Ok(None)` if the signature is well-formed but no key recovers from it
/// * `Err(AppError::BadRequest)` if the signature encoding is malformed
pub fn recover_address(message: &str, signature_hex: &str) -> Result<Option<String>, AppError> {
    let (signature, recovery_id) = parse_signature(signature_hex)?;
    let digest = personal_message_hash(message.as_bytes());

    match VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id) {
        Ok(key) => Ok(Some(address_from_key(&key))),
        Err(_) => Ok(None),
    }
}

/// Verify that `signature_hex` over `message` was produced by `address`.
///
/// `address` must already be normalized.
///
/// # Returns
/// * `Ok(true)` if the recovered signer matches `address`
/// * `Ok(false)` if it does not (or cannot be recovered)
/// * `Err(AppError)` if the signature encoding is malformed
pub fn verify_signature(address: &str, message: &str, signature_hex: &str) -> Result<bool, AppError> {
    Ok(recover_address(message, signature_hex)?.as_deref() == Some(address))
}

/// Sign `message` with a hex private key the way a wallet's `personal_sign` does.
///
/// Returns `(address, signature_hex)`. Used by the `sign` CLI subcommand for
/// exercising the API without a browser wallet.
pub fn sign_personal_message(
    private_key_hex: &str,
    message: &str,
) -> Result<(String, String), AppError> {
    let trimmed = private_key_hex.trim();
    let key_bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|_| AppError::BadRequest("private key must be hex".to_string()))?;
    let signing_key = SigningKey::from_slice(&key_bytes)
        .map_err(|e| AppError::BadRequest(format!("Invalid private key: {}", e)))?;

    let digest = personal_message_hash(message.as_bytes());
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| AppError::Internal(format!("Signing failed: {}", e)))?;

    let mut bytes = Vec::with_capacity(SIGNATURE_LEN);
    bytes.extend_from_slice(&signature.to_bytes());
    bytes.push(27 + recovery_id.to_byte());

    Ok((
        address_from_key(signing_key.verifying_key()),
        format!("0x{}", hex::encode(bytes)),
    ))
}
