//! Dotted-path navigation and deep merge over JSON documents.
//!
//! Paths are dot-separated object keys (`"api.auth.token"`). The empty path
//! addresses the document root.

use serde_json::{Map, Value};

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
}

/// Look up the value at `path`.
///
/// Returns `None` if any segment is missing or any intermediate is not an object.
pub fn get_by_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(doc);
    }
    let mut current = doc;
    for key in segments(path) {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// Non-object intermediates (including the root) are replaced by objects.
pub fn set_by_path(doc: &mut Value, path: &str, value: Value) {
    if path.is_empty() {
        *doc = value;
        return;
    }

    let keys: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = keys.split_last() else {
        return;
    };

    let mut current = doc;
    for key in parents {
        current = ensure_object(current)
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(current).insert((*last).to_string(), value);
}

/// Remove the value at `path`, returning it.
///
/// Deleting the empty path resets the root to an empty object.
pub fn delete_by_path(doc: &mut Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(std::mem::replace(doc, Value::Object(Map::new())));
    }

    let keys: Vec<&str> = segments(path).collect();
    let (last, parents) = keys.split_last()?;

    let mut current = doc;
    for key in parents {
        current = current.as_object_mut()?.get_mut(*key)?;
    }
    current.as_object_mut()?.remove(*last)
}

/// Recursively merge `patch` onto `base`.
///
/// Where both sides hold objects for the same key the merge recurses;
/// anything else in `patch` (scalars, arrays, null) replaces the base value
/// wholesale. Neither input is modified.
pub fn deep_merge(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            let mut merged = base_map.clone();
            for (key, patch_value) in patch_map {
                let next = match merged.get(key) {
                    Some(base_value) if base_value.is_object() && patch_value.is_object() => {
                        deep_merge(base_value, patch_value)
                    }
                    _ => patch_value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}
