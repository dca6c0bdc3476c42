/*!
 * Shared helpers: randomness, entropy accounting and constant-time comparison.
 */

mod entropy;

pub use entropy::*;

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::error::{KeystoreError, KeystoreResult};

/// Generate random bytes of the specified length
pub fn random_bytes(length: usize) -> KeystoreResult<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| KeystoreError::Internal(format!("system RNG failure: {}", e)))?;
    Ok(bytes)
}

/// Constant-time comparison of two byte slices
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Big-endian bytes of `value` without leading zeros, keeping a sign octet so
/// the result is a valid positive DER INTEGER body.
pub fn positive_integer_bytes(value: u64) -> Vec<u8> {
    let raw = value.to_be_bytes();
    let first = raw.iter().position(|b| *b != 0).unwrap_or(raw.len() - 1);
    let mut out = Vec::with_capacity(raw.len() - first + 1);
    if raw[first] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&raw[first..]);
    out
}

/// Convert milliseconds since the epoch to a UTC timestamp
pub fn datetime_from_millis(millis: i64) -> KeystoreResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        KeystoreError::invalid_parameter("timestamp", "representable date", &millis.to_string())
    })
}
