//! Deterministic JSON for claim parameters and context.
//!
//! `serde_json::Value` keeps object keys in a sorted map, so re-serializing a
//! parsed value yields the same bytes regardless of the input key order.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::Value;

/// Compact, key-sorted serialization of `value`.
pub fn canonicalize_value(value: &Value) -> ProtocolResult<String> {
    serde_json::to_string(value)
        .map_err(|e| ProtocolError::internal(format!("failed to serialize JSON: {}", e)))
}

/// Canonical form of claim parameters, which must be JSON.
pub fn canonicalize_parameters(parameters: &str) -> ProtocolResult<String> {
    let value: Value = serde_json::from_str(parameters)
        .map_err(|e| ProtocolError::bad_request(format!("parameters are not JSON: {}", e)))?;
    canonicalize_value(&value)
}

/// Canonical form of claim context.
///
/// An empty context stays empty. Anything else must be JSON.
pub fn canonicalize_context(context: &str) -> ProtocolResult<String> {
    if context.is_empty() {
        return Ok(String::new());
    }
    let value: Value = serde_json::from_str(context)
        .map_err(|e| ProtocolError::bad_request(format!("context is not JSON: {}", e)))?;
    canonicalize_value(&value)
}
