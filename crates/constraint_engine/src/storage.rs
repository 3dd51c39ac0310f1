// SPDX-License-Identifier: Apache-2.0

//! The reference storage backend for a target's inventory: in-memory,
//! transactional (begin/commit/abort), guarded by its own lock so it
//! remains safe for concurrent reads once a write returns.

use std::sync::RwLock;

use serde_json::{Map, Value};

use crate::Error;

/// A single target's inventory tree, rooted at `inventory/`.
///
/// Writes below an existing non-object node fail rather than clobber it;
/// the store is left exactly as it was before the failed write (the whole
/// write is one transaction).
#[derive(Default)]
pub struct InventoryStore {
    tree: RwLock<Value>,
}

impl InventoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Value::Object(Map::new())),
        }
    }

    /// Writes `value` at `path` (a `/`-separated path below `inventory/`).
    ///
    /// Every intermediate path segment must name an object (or be absent,
    /// in which case it is created); writing through an existing
    /// non-object node fails with [`Error::Write`] and leaves the store
    /// untouched.
    pub fn add_data(&self, target: &str, path: &str, value: Value) -> Result<(), Error> {
        let mut tree = self
            .tree
            .write()
            .map_err(|e| Error::Transaction {
                target: target.to_owned(),
                reason: e.to_string(),
            })?;
        let backup = tree.clone();
        match write_at_path(&mut tree, path, value) {
            Ok(()) => Ok(()),
            Err(reason) => {
                *tree = backup;
                Err(Error::Write {
                    target: target.to_owned(),
                    path: path.to_owned(),
                    reason,
                })
            }
        }
    }

    /// Deletes the subtree at `path`. A missing path is a no-op.
    pub fn remove_data(&self, target: &str, path: &str) -> Result<(), Error> {
        let mut tree = self
            .tree
            .write()
            .map_err(|e| Error::Transaction {
                target: target.to_owned(),
                reason: e.to_string(),
            })?;
        remove_at_path(&mut tree, path);
        Ok(())
    }

    /// Returns a snapshot of the whole tree, suitable for binding as
    /// `data.inventory` during policy evaluation.
    pub fn snapshot(&self, target: &str) -> Result<Value, Error> {
        let tree = self.tree.read().map_err(|e| Error::Read {
            target: target.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(tree.clone())
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect()
}

fn write_at_path(root: &mut Value, path: &str, value: Value) -> Result<(), String> {
    let segs = segments(path);
    let Some((last, parents)) = segs.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for seg in parents {
        if !current.is_object() {
            return Err(format!("'{seg}' is not an object"));
        }
        let obj = current.as_object_mut().expect("checked is_object above");
        let entry = obj
            .entry((*seg).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            return Err(format!("cannot write through non-object node '{seg}'"));
        }
        current = entry;
    }

    if !current.is_object() {
        return Err(format!("'{last}' is not an object"));
    }
    let obj = current.as_object_mut().expect("checked is_object above");
    let _ = obj.insert((*last).to_owned(), value);
    Ok(())
}

fn remove_at_path(root: &mut Value, path: &str) {
    let segs = segments(path);
    let Some((last, parents)) = segs.split_last() else {
        *root = Value::Object(Map::new());
        return;
    };

    let mut current = root;
    for seg in parents {
        let Some(obj) = current.as_object_mut() else {
            return;
        };
        let Some(entry) = obj.get_mut(*seg) else {
            return;
        };
        current = entry;
    }

    if let Some(obj) = current.as_object_mut() {
        let _ = obj.remove(*last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_nested_paths_creating_intermediate_objects() {
        let store = InventoryStore::new();
        store.add_data("t", "/foo/bar", json!({"a": 1})).unwrap();
        let snapshot = store.snapshot("t").unwrap();
        assert_eq!(snapshot["foo"]["bar"]["a"], json!(1));
    }

    #[test]
    fn write_through_non_object_fails_and_leaves_store_untouched() {
        let store = InventoryStore::new();
        store.add_data("t", "/foo", json!("bar")).unwrap();

        let err = store
            .add_data("t", "/foo/bar", json!({"a": 1}))
            .expect_err("writing through a string must fail");
        assert!(matches!(err, Error::Write { .. }));

        let snapshot = store.snapshot("t").unwrap();
        assert_eq!(snapshot["foo"], json!("bar"));
    }

    #[test]
    fn remove_data_on_missing_path_is_a_no_op() {
        let store = InventoryStore::new();
        store.remove_data("t", "/nope/nothing").unwrap();
        let snapshot = store.snapshot("t").unwrap();
        assert_eq!(snapshot, json!({}));
    }

    #[test]
    fn remove_data_deletes_subtree() {
        let store = InventoryStore::new();
        store.add_data("t", "/foo/bar", json!(1)).unwrap();
        store.add_data("t", "/foo/baz", json!(2)).unwrap();
        store.remove_data("t", "/foo/bar").unwrap();
        let snapshot = store.snapshot("t").unwrap();
        assert_eq!(snapshot["foo"]["bar"], Value::Null);
        assert_eq!(snapshot["foo"]["baz"], json!(2));
    }

    #[test]
    fn overwriting_a_leaf_value_in_place_succeeds() {
        let store = InventoryStore::new();
        store.add_data("t", "/foo", json!(1)).unwrap();
        store.add_data("t", "/foo", json!(2)).unwrap();
        let snapshot = store.snapshot("t").unwrap();
        assert_eq!(snapshot["foo"], json!(2));
    }
}
