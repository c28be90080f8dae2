//! Cache Key Builder
//!
//! Produces deterministic cache keys of the form `namespace:digest`, where
//! the digest is a 128-bit truncation of SHA-256 over the canonical JSON
//! encoding of the key components. The plain-text namespace prefix is what
//! makes prefix-based invalidation possible.

use crate::cache::entry::KeyComponents;
use crate::error::{Error, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Number of digest bytes kept after truncation (128 bits)
const DIGEST_BYTES: usize = 16;

/// Build a cache key from a namespace and key components.
///
/// Two calls with the same namespace and semantically equal components
/// always produce the same key, regardless of the order components were
/// inserted in. Nested (non-primitive) component values are stringified
/// before hashing so any serializable argument can participate.
pub fn build_key(namespace: &str, components: &KeyComponents) -> Result<String> {
    validate_namespace(namespace)?;

    let canonical = canonicalize(components)?;

    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();

    Ok(format!("{namespace}:{}", hex::encode(&digest[..DIGEST_BYTES])))
}

/// Reject namespaces that would corrupt the `namespace:digest` key format
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(Error::InvalidKey {
            reason: "namespace must not be empty".to_string(),
        });
    }
    if namespace.contains(':') {
        return Err(Error::InvalidKey {
            reason: format!("namespace must not contain ':': {namespace}"),
        });
    }
    Ok(())
}

/// Canonical JSON encoding of key components: object with keys in sorted
/// order, no insignificant whitespace, nested values stringified.
fn canonicalize(components: &KeyComponents) -> Result<String> {
    let flattened: BTreeMap<&str, Value> = components
        .iter()
        .map(|(name, value)| (name.as_str(), flatten(value)))
        .collect();
    Ok(serde_json::to_string(&flattened)?)
}

/// Primitives pass through untouched; arrays and objects are collapsed to
/// their compact JSON text so they hash stably.
fn flatten(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

/// Check whether `key` belongs to `namespace`
pub fn in_namespace(key: &str, namespace: &str) -> bool {
    key.strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with(':'))
}
