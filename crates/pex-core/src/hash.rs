//! Stable content hashing over canonical JSON.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::codec::to_canonical_json_bytes;
use crate::errors::PexError;

/// Computes a stable hexadecimal hash for the provided serializable payload.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, PexError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{:x}", digest))
}
