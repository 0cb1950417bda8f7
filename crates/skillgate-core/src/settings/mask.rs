//! Secret masking and the mask-aware patch protocol.
//!
//! Reads replace every non-empty sensitive value with [`MASK_SENTINEL`]. A
//! client that edits the masked object and sends it back unchanged at a
//! sensitive path is saying "keep what is stored": the sentinel is swapped for
//! the stored value (or dropped if nothing is stored) before the patch is merged.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::path::{deep_merge, delete_by_path, get_by_path, set_by_path};

/// Placeholder shown in place of a masked secret and accepted back as
/// "keep the existing value".
pub const MASK_SENTINEL: &str = "••••••••";

/// Result of [`mask_sensitive`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedSettings {
    pub masked_settings: Value,
    /// Sensitive paths that were actually masked.
    pub masked_map: BTreeMap<String, bool>,
}

/// Non-empty means: a non-empty string or array, or any other non-null value.
fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn is_sentinel(value: &Value) -> bool {
    value.as_str() == Some(MASK_SENTINEL)
}

/// Replace every non-empty value at a sensitive path with the sentinel.
pub fn mask_sensitive(doc: &Value, sensitive_paths: &[String]) -> MaskedSettings {
    let mut masked_settings = doc.clone();
    let mut masked_map = BTreeMap::new();

    for path in sensitive_paths {
        let present = get_by_path(&masked_settings, path).is_some_and(is_non_empty);
        if present {
            set_by_path(&mut masked_settings, path, Value::String(MASK_SENTINEL.to_string()));
            masked_map.insert(path.clone(), true);
        }
    }

    MaskedSettings {
        masked_settings,
        masked_map,
    }
}

/// Merge `patch` onto `existing`, honouring sentinels at sensitive paths.
///
/// For each sensitive path where `patch` holds exactly the sentinel: the
/// stored value is put back if there is one, otherwise the path is removed
/// from the patch. The sanitized patch is then deep-merged onto `existing`.
pub fn apply_patch_with_mask_handling(
    existing: &Value,
    patch: &Value,
    sensitive_paths: &[String],
) -> Value {
    let mut sanitized = patch.clone();

    for path in sensitive_paths {
        if !get_by_path(&sanitized, path).is_some_and(is_sentinel) {
            continue;
        }
        match get_by_path(existing, path).filter(|v| !v.is_null()) {
            Some(stored) => set_by_path(&mut sanitized, path, stored.clone()),
            None => {
                delete_by_path(&mut sanitized, path);
            }
        }
    }

    deep_merge(existing, &sanitized)
}
