//! Path-based get/set utilities over the session context JSON tree (§9,
//! "JSON context"). Paths are dot-separated identifiers with optional
//! bracketed or bare integer indices, e.g. `apiResult.items.0.name`.

use serde_json::{Map, Value};

/// Split a dot-path into its segments. A segment that parses as an integer
/// indexes into an array; anything else indexes into an object.
fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Read the value at `path` inside `context`. Missing segments (absent key,
/// out-of-range index, or indexing into a scalar) yield `None` — callers
/// render that as the empty string for templating (§4.2).
pub fn get_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in split_path(path) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                arr.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Set the value at `path` inside `context`, creating intermediate objects
/// as needed (§4.5's `api` node `assignTo` and `assign` node semantics).
/// Intermediate segments that look numeric still create an object key
/// (array auto-creation is not required by the spec for writes).
pub fn set_path(context: &mut Value, path: &str, value: Value) {
    let segments = split_path(path);
    if segments.is_empty() {
        return;
    }
    if !context.is_object() {
        *context = Value::Object(Map::new());
    }
    let mut current = context;
    for segment in &segments[..segments.len() - 1] {
        let map = current.as_object_mut().expect("ensured object above");
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
    }
    let last = segments[segments.len() - 1];
    let map = current.as_object_mut().expect("ensured object above");
    map.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_path_traverses_objects_and_arrays() {
        let ctx = json!({"apiResult": {"items": [{"name": "first"}, {"name": "second"}]}});
        assert_eq!(
            get_path(&ctx, "apiResult.items.1.name"),
            Some(&Value::from("second"))
        );
    }

    #[test]
    fn get_path_missing_returns_none() {
        let ctx = json!({"a": 1});
        assert_eq!(get_path(&ctx, "a.b.c"), None);
        assert_eq!(get_path(&ctx, "missing"), None);
    }

    #[test]
    fn set_path_creates_intermediate_objects() {
        let mut ctx = json!({});
        set_path(&mut ctx, "apiResult.status", Value::from("ok"));
        assert_eq!(ctx["apiResult"]["status"], Value::from("ok"));
    }

    #[test]
    fn set_path_overwrites_non_object_intermediate() {
        let mut ctx = json!({"apiResult": "stale"});
        set_path(&mut ctx, "apiResult.status", Value::from("ok"));
        assert_eq!(ctx["apiResult"]["status"], Value::from("ok"));
    }
}
