//! Dotted-path helpers over the `serde_json::Value` config tree.

use serde_json::{Map, Value};

/// Split `a.b[0].c` into `["a", "b", "0", "c"]`.
pub fn split_key(key: &str) -> Vec<String> {
    key.replace('[', ".")
        .replace(']', "")
        .split('.')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join path segments back into a dotted key.
pub fn join_key(path: &[String]) -> String {
    path.join(".")
}

/// Look up a node; numeric segments index into lists.
pub fn get_path<'a, S: AsRef<str>>(root: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, segment| {
        let segment = segment.as_ref();
        match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}

/// Mutable variant of [`get_path`].
pub fn get_path_mut<'a, S: AsRef<str>>(root: &'a mut Value, path: &[S]) -> Option<&'a mut Value> {
    let mut node = root;
    for segment in path {
        node = child_mut(node, segment.as_ref())?;
    }
    Some(node)
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => items.get_mut(index),
            Err(_) => None,
        },
        _ => None,
    }
}

/// Set `path` to `value`, creating intermediate mappings.
///
/// Returns `false` when an intermediate node exists but is not a container.
pub fn set_path<S: AsRef<str>>(root: &mut Value, path: &[S], value: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return true;
    };

    let mut node = root;
    for segment in parents {
        let segment = segment.as_ref();
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(index) if index < items.len() => &mut items[index],
                _ => return false,
            },
            _ => return false,
        };
    }

    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    let last = last.as_ref();
    match node {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            true
        }
        Value::Array(items) => match last.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items[index] = value;
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Remove the node at `path` and return it.
pub fn remove_path<S: AsRef<str>>(root: &mut Value, path: &[S]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    match get_path_mut(root, parents)? {
        Value::Object(map) => map.remove(last.as_ref()),
        Value::Array(items) => {
            let index = last.as_ref().parse::<usize>().ok()?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}

/// Deep-merge `overlay` into `base`: mappings merge key by key, everything else replaces.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Wrap `value` so that it sits at the dotted `package` (root when empty).
pub fn wrap_at_package(package: &str, value: Value) -> Value {
    split_key(package)
        .into_iter()
        .rev()
        .fold(value, |inner, segment| {
            let mut map = Map::new();
            map.insert(segment, inner);
            Value::Object(map)
        })
}

/// Render a scalar the way it appears inside an interpolated string.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
