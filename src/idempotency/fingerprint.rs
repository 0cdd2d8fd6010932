//! Request fingerprinting.
//!
//! A fingerprint is the SHA-256 of the request's canonical JSON form: object keys
//! sorted, arrays kept in order, no insignificant whitespace. Two requests share a
//! fingerprint exactly when they serialize to the same JSON value.

use super::errors::{IdempotencyError, IdempotencyResult};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Hex-encoded SHA-256 of the canonical JSON form of `request`
pub fn request_fingerprint<T: Serialize + ?Sized>(request: &T) -> IdempotencyResult<String> {
    let value = serde_json::to_value(request)
        .map_err(|e| IdempotencyError::serialization("request", e))?;
    let canonical = canonical_json(&value)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Serialize with recursively sorted object keys
pub fn canonical_json(value: &Value) -> IdempotencyResult<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> IdempotencyResult<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                let key = serde_json::to_string(key)
                    .map_err(|e| IdempotencyError::serialization("request key", e))?;
                out.push_str(&key);
                out.push(':');
                write_canonical(item, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
    Ok(())
}

fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
