//! A static directory exposes a tree of fixed values which never changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::error::{FsError, FsResult};
use super::static_value::StaticValue;
use super::types::{DirEntry, FileAttr};
use super::Node;

/// A child of a static directory: only nested static directories and static
/// values are representable.
#[derive(Debug, Clone)]
enum StaticNode {
    Dir(StaticDir),
    Value(StaticValue),
}

/// Immutable directory tree, fully materialized at construction.
#[derive(Debug, Clone)]
pub struct StaticDir {
    children: Arc<BTreeMap<String, StaticNode>>,
}

impl StaticDir {
    /// Directory with no children.
    pub fn empty() -> Self {
        Self {
            children: Arc::new(BTreeMap::new()),
        }
    }

    /// Build a tree from a JSON mapping: string leaves become value files,
    /// object leaves recurse into nested directories, anything else is
    /// rejected.
    pub fn new(values: &Map<String, Value>) -> FsResult<Self> {
        let mut children = BTreeMap::new();
        for (name, content) in values {
            let node = match content {
                Value::String(s) => StaticNode::Value(StaticValue::new(s.clone())),
                Value::Object(nested) => StaticNode::Dir(StaticDir::new(nested)?),
                other => {
                    return Err(FsError::InvalidValue(format!(
                        "{name}: expected string or mapping, got {}",
                        json_type_name(other)
                    )))
                }
            };
            children.insert(name.clone(), node);
        }
        Ok(Self {
            children: Arc::new(children),
        })
    }

    pub fn attr(&self) -> FileAttr {
        FileAttr::directory(0o555)
    }

    pub fn lookup(&self, name: &str) -> FsResult<Node> {
        match self.children.get(name) {
            Some(StaticNode::Dir(dir)) => Ok(Node::Dir(dir.clone())),
            Some(StaticNode::Value(value)) => Ok(Node::Value(value.clone())),
            None => Err(FsError::not_found(name)),
        }
    }

    pub fn read_dir_all(&self) -> Vec<DirEntry> {
        self.children
            .iter()
            .map(|(name, child)| match child {
                StaticNode::Dir(_) => DirEntry::directory(name.clone()),
                StaticNode::Value(_) => DirEntry::file(name.clone()),
            })
            .collect()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> FsResult<StaticDir> {
        match value {
            Value::Object(map) => StaticDir::new(&map),
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn nested_tree_round_trips() {
        let dir = tree(json!({"k1": "v1", "k2": {"k3": "v3"}})).unwrap();

        let k1 = dir.lookup("k1").unwrap();
        assert_eq!(k1.read(0, 16).unwrap(), b"v1");

        let k2 = dir.lookup("k2").unwrap();
        let Node::Dir(k2) = k2 else {
            panic!("k2 should be a directory")
        };
        let k3 = k2.lookup("k3").unwrap();
        assert_eq!(k3.read(0, 16).unwrap(), b"v3");

        // Exactly the constructed paths and nothing else.
        let names: Vec<_> = dir.read_dir_all().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["k1", "k2"]);
        assert!(dir.lookup("k3").is_err());
    }

    #[test]
    fn listing_types_children() {
        let dir = tree(json!({"file": "x", "sub": {}})).unwrap();
        let entries = dir.read_dir_all();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.name == "file" && e.kind.is_file()));
        assert!(entries.iter().any(|e| e.name == "sub" && e.kind.is_dir()));
    }

    #[test]
    fn rejects_non_string_leaves() {
        for bad in [json!({"n": 42}), json!({"b": true}), json!({"a": [1]})] {
            assert!(matches!(tree(bad), Err(FsError::InvalidValue(_))));
        }
    }

    #[test]
    fn empty_directory_is_valid() {
        let dir = StaticDir::empty();
        assert!(dir.read_dir_all().is_empty());
        assert!(matches!(dir.lookup("anything"), Err(FsError::NotFound(_))));
        assert_eq!(dir.attr().perm, 0o555);
    }

    #[test]
    fn repeated_lookups_return_equivalent_nodes() {
        let dir = tree(json!({"k": "v"})).unwrap();
        let first = dir.lookup("k").unwrap();
        let second = dir.lookup("k").unwrap();
        match (first, second) {
            (Node::Value(a), Node::Value(b)) => assert_eq!(a, b),
            _ => panic!("expected value nodes"),
        }
    }
}
