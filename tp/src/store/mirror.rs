//! Local JSON mirror of a streamed collection
//!
//! The streaming endpoint sends `put` (replace the value at a path) and
//! `patch` (replace each listed child at a path) events. Applying them here
//! turns the incremental stream back into full snapshots.

use serde_json::{Map, Value};
use tracing::debug;

use super::Documents;

/// Mirror of the collection subtree
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    root: Value,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value at `path`; `null` removes it
    pub fn apply_put(&mut self, path: &str, data: Value) {
        debug!(%path, "Mirror::apply_put: called");
        let segs = segments(path);
        set_at(&mut self.root, &segs, data);
    }

    /// Replace each child of `data` under `path`
    pub fn apply_patch(&mut self, path: &str, data: Value) {
        debug!(%path, "Mirror::apply_patch: called");
        let base = segments(path);
        match data {
            Value::Object(children) => {
                for (child, value) in children {
                    let mut segs = base.clone();
                    segs.extend(segments(&child));
                    set_at(&mut self.root, &segs, value);
                }
            }
            other => {
                debug!("Mirror::apply_patch: non-object patch treated as put");
                set_at(&mut self.root, &base, other);
            }
        }
    }

    /// Top-level children as documents
    pub fn documents(&self) -> Documents {
        match &self.root {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => Documents::new(),
        }
    }
}

fn set_at(node: &mut Value, segs: &[&str], data: Value) {
    let Some((first, rest)) = segs.split_first() else {
        *node = data;
        return;
    };

    if data.is_null() {
        remove_at(node, segs);
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        set_at(child, rest, data);
    }
}

fn remove_at(node: &mut Value, segs: &[&str]) {
    let Value::Object(map) = node else {
        return;
    };
    let Some((first, rest)) = segs.split_first() else {
        return;
    };

    if rest.is_empty() {
        map.remove(*first);
        return;
    }

    let prune = match map.get_mut(*first) {
        Some(child) => {
            remove_at(child, rest);
            child.as_object().is_some_and(Map::is_empty)
        }
        None => false,
    };
    // Empty parents disappear, as they do server-side
    if prune {
        map.remove(*first);
    }
}
