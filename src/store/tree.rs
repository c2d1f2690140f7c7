// src/store/tree.rs
//
// Path helpers over a serde_json tree. Paths are `/`-separated; the empty path is the root.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn get<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    let mut node = root;
    for seg in segs {
        node = node.as_object()?.get(*seg)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

/// Writes `value` at `segs`, creating intermediate objects. `None` removes the node.
pub fn write(root: &mut Value, segs: &[&str], value: Option<Value>) {
    match value {
        Some(v) => set(root, segs, v),
        None => remove(root, segs),
    }
}

fn set(root: &mut Value, segs: &[&str], value: Value) {
    let mut node = root;
    for seg in segs {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(obj) = node.as_object_mut() else {
            return;
        };
        node = obj
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    *node = value;
}

fn remove(root: &mut Value, segs: &[&str]) {
    let Some((last, parents)) = segs.split_last() else {
        *root = Value::Null;
        return;
    };

    let mut node = root;
    for seg in parents {
        match node.as_object_mut().and_then(|obj| obj.get_mut(*seg)) {
            Some(child) => node = child,
            None => return,
        }
    }
    if let Some(obj) = node.as_object_mut() {
        obj.remove(*last);
    }
}

/// Accepts a keyed collection stored as an object, or the `null`/`false` placeholder of an
/// empty collection.
pub fn object_or_empty<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(BTreeMap::new()),
        Some(v @ Value::Object(_)) => serde_json::from_value(v).map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!(
            "expected a keyed collection, found {other}"
        ))),
    }
}
