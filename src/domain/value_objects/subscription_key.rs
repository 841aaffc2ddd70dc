//! Canonical subscription keys.
//!
//! A watch request is grouped by its parameters. Two requests whose
//! parameters are structurally equal must land on the same key, no matter
//! in which order the client wrote the object properties, so the key is
//! computed over a canonical encoding rather than the raw text:
//!
//! - object keys are emitted in sorted order, recursively
//! - arrays keep their element order
//! - scalars use their JSON representation
//!
//! The canonical text is hashed with SHA-256 to keep keys bounded in size.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Order-independent key for a set of watch parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Derive the key for a parameter value.
    pub fn from_params(params: &Value) -> Self {
        let mut canonical = String::new();
        write_canonical(params, &mut canonical);
        let digest = Sha256::digest(canonical.as_bytes());
        Self(format!("{:x}", digest))
    }

    /// Get the key as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Value> for SubscriptionKey {
    fn from(params: &Value) -> Self {
        Self::from_params(params)
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
