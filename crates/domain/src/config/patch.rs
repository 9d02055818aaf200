use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Patch operations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single config mutation, addressed by JSON Pointer. Mirrors RFC 6902
/// but deliberately narrowed to the three ops the gateway actually needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Replace { path: String, value: Value },
    Add { path: String, value: Value },
    Remove { path: String },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Replace { path, .. } => path,
            PatchOp::Add { path, .. } => path,
            PatchOp::Remove { path } => path,
        }
    }
}

/// Apply a batch of ops to `doc` in order, in place. On any failure the
/// caller must discard `doc` — this function does not roll back partially
/// applied ops, so callers always operate on a clone of the current
/// document and only commit it once every op in the batch has succeeded.
pub fn apply_patch(doc: &mut Value, ops: &[PatchOp]) -> Result<()> {
    for op in ops {
        apply_one(doc, op)?;
    }
    Ok(())
}

fn apply_one(doc: &mut Value, op: &PatchOp) -> Result<()> {
    match op {
        PatchOp::Replace { path, value } => {
            let target = navigate_mut(doc, path)?;
            *target = value.clone();
            Ok(())
        }
        PatchOp::Add { path, value } => {
            let (parent_path, key) = split_pointer(path)?;
            let parent = navigate_mut(doc, &parent_path)?;
            match (parent, key) {
                (Value::Object(map), PointerKey::Key(k)) => {
                    map.insert(k, value.clone());
                    Ok(())
                }
                (Value::Array(arr), PointerKey::Index(i)) => {
                    if i > arr.len() {
                        return Err(Error::InvalidPath(format!(
                            "array index {i} out of bounds for {path}"
                        )));
                    }
                    arr.insert(i, value.clone());
                    Ok(())
                }
                (Value::Array(arr), PointerKey::Dash) => {
                    arr.push(value.clone());
                    Ok(())
                }
                _ => Err(Error::InvalidOp(format!(
                    "cannot add at {path}: parent is not an object or array"
                ))),
            }
        }
        PatchOp::Remove { path } => {
            let (parent_path, key) = split_pointer(path)?;
            let parent = navigate_mut(doc, &parent_path)?;
            match (parent, key) {
                (Value::Object(map), PointerKey::Key(k)) => {
                    map.remove(&k)
                        .ok_or_else(|| Error::InvalidPath(format!("no such key: {path}")))?;
                    Ok(())
                }
                (Value::Array(arr), PointerKey::Index(i)) => {
                    if i >= arr.len() {
                        return Err(Error::InvalidPath(format!(
                            "array index {i} out of bounds for {path}"
                        )));
                    }
                    arr.remove(i);
                    Ok(())
                }
                _ => Err(Error::InvalidOp(format!(
                    "cannot remove at {path}: parent is not an object or array"
                ))),
            }
        }
    }
}

enum PointerKey {
    Key(String),
    Index(usize),
    Dash,
}

fn split_pointer(path: &str) -> Result<(String, PointerKey)> {
    if path.is_empty() || path == "/" {
        return Err(Error::InvalidPath("cannot target document root".into()));
    }
    let idx = path
        .rfind('/')
        .ok_or_else(|| Error::InvalidPath(format!("not a JSON Pointer: {path}")))?;
    let parent = if idx == 0 { "".to_string() } else { path[..idx].to_string() };
    let raw = &path[idx + 1..];
    let unescaped = unescape_token(raw);
    let key = if unescaped == "-" {
        PointerKey::Dash
    } else if let Ok(i) = unescaped.parse::<usize>() {
        PointerKey::Index(i)
    } else {
        PointerKey::Key(unescaped)
    };
    Ok((parent, key))
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Resolve a JSON Pointer to a mutable reference within `doc`. `""` (empty
/// string) resolves to the document root.
fn navigate_mut<'a>(doc: &'a mut Value, path: &str) -> Result<&'a mut Value> {
    if path.is_empty() {
        return Ok(doc);
    }
    if !path.starts_with('/') {
        return Err(Error::InvalidPath(format!("not a JSON Pointer: {path}")));
    }
    let mut current = doc;
    for raw_token in path[1..].split('/') {
        let token = unescape_token(raw_token);
        current = match current {
            Value::Object(map) => map
                .get_mut(&token)
                .ok_or_else(|| Error::InvalidPath(format!("no such path: {path}")))?,
            Value::Array(arr) => {
                let i: usize = token
                    .parse()
                    .map_err(|_| Error::InvalidPath(format!("not an array index: {token}")))?;
                arr.get_mut(i)
                    .ok_or_else(|| Error::InvalidPath(format!("no such path: {path}")))?
            }
            _ => return Err(Error::InvalidPath(format!("no such path: {path}"))),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replace_nested_field() {
        let mut doc = json!({"ai": {"model": "old"}});
        let ops = vec![PatchOp::Replace {
            path: "/ai/model".into(),
            value: json!("new"),
        }];
        apply_patch(&mut doc, &ops).unwrap();
        assert_eq!(doc["ai"]["model"], json!("new"));
    }

    #[test]
    fn add_new_object_key() {
        let mut doc = json!({"channels": {}});
        let ops = vec![PatchOp::Add {
            path: "/channels/telegram".into(),
            value: json!({"enabled": true}),
        }];
        apply_patch(&mut doc, &ops).unwrap();
        assert_eq!(doc["channels"]["telegram"]["enabled"], json!(true));
    }

    #[test]
    fn remove_existing_key() {
        let mut doc = json!({"channels": {"telegram": {"enabled": true}}});
        let ops = vec![PatchOp::Remove {
            path: "/channels/telegram".into(),
        }];
        apply_patch(&mut doc, &ops).unwrap();
        assert!(doc["channels"].get("telegram").is_none());
    }

    #[test]
    fn remove_missing_key_errors() {
        let mut doc = json!({"channels": {}});
        let ops = vec![PatchOp::Remove {
            path: "/channels/telegram".into(),
        }];
        let err = apply_patch(&mut doc, &ops).unwrap_err();
        assert_eq!(err.code(), "INVALID_PATH");
    }

    #[test]
    fn replace_missing_parent_errors() {
        let mut doc = json!({"ai": {}});
        let ops = vec![PatchOp::Replace {
            path: "/ai/missing/field".into(),
            value: json!(1),
        }];
        assert!(apply_patch(&mut doc, &ops).is_err());
    }

    #[test]
    fn root_target_is_rejected() {
        let mut doc = json!({});
        let ops = vec![PatchOp::Remove { path: "/".into() }];
        let err = apply_patch(&mut doc, &ops).unwrap_err();
        assert_eq!(err.code(), "INVALID_PATH");
    }

    #[test]
    fn dash_appends_to_array() {
        let mut doc = json!({"list": [1, 2]});
        let ops = vec![PatchOp::Add {
            path: "/list/-".into(),
            value: json!(3),
        }];
        apply_patch(&mut doc, &ops).unwrap();
        assert_eq!(doc["list"], json!([1, 2, 3]));
    }
}
