//! Rule payload codec
//!
//! Filter groups are persisted as JSON text. `decode(encode(g)) == g` holds
//! for every group.

use crate::error::{DataAuthError, Result};
use crate::filter::FilterGroup;

/// Encode a filter group as JSON text
pub fn encode(group: &FilterGroup) -> Result<String> {
    serde_json::to_string(group)
        .map_err(|e| DataAuthError::Serialization(format!("Failed to encode filter group: {}", e)))
}

/// Decode JSON text into a filter group.
///
/// Blank payloads decode to an empty `And` group. Errors are the parser's own;
/// callers attach the association identity.
pub fn decode(payload: &str) -> std::result::Result<FilterGroup, serde_json::Error> {
    if payload.trim().is_empty() {
        return Ok(FilterGroup::default());
    }

    serde_json::from_str(payload)
}
