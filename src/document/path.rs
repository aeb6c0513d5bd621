//! Dotted-path access over JSON value trees.
//!
//! Paths are `.`-separated segments. A segment addresses an object key, or an
//! array element when the current node is an array and the segment parses as
//! an index.

use serde_json::{Map, Value};

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Returns the value at `path`, or `None` when any segment is missing.
///
/// A stored `null` is a present value and is returned as `Some(Value::Null)`.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(value, |node, segment| child(node, segment))
}

/// Writes `new_value` at `path`, creating intermediate objects as needed.
///
/// Non-container nodes found along the way are replaced by empty objects.
pub fn set_path(value: &mut Value, path: &str, new_value: Value) {
    if path.is_empty() {
        return;
    }

    let mut segments = path.split('.').peekable();
    let mut current = value;

    while let Some(segment) = segments.next() {
        let is_last = segments.peek().is_none();

        let array_index = match &*current {
            Value::Array(items) => segment.parse::<usize>().ok().filter(|i| *i < items.len()),
            _ => None,
        };
        if let Some(index) = array_index {
            let Value::Array(items) = current else {
                return;
            };
            if is_last {
                items[index] = new_value;
                return;
            }
            current = &mut items[index];
            continue;
        }

        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };

        if is_last {
            map.insert(segment.to_string(), new_value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Removes the object key at `path` and returns the removed value.
///
/// Missing paths are a no-op. Key order of the parent object is preserved.
pub fn unset_path(value: &mut Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return None;
    }

    let (parent_path, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    };

    let parent = match parent_path {
        Some(parent_path) => parent_path
            .split('.')
            .try_fold(value, |node, segment| child_mut(node, segment))?,
        None => value,
    };

    parent.as_object_mut()?.shift_remove(leaf)
}

/// Returns `true` when a value would be considered empty as a key.
///
/// `null`, `false`, `0` and the empty string count as falsy.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
