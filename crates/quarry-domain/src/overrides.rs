//! Per-subcommand extra-option overrides.
//!
//! Users inject raw arguments into specific engine subcommands through one
//! nested JSON blob, e.g.
//!
//! ```json
//! { "*": ["--global"], "database": { "init": ["--debug"] } }
//! ```
//!
//! A `"*"` entry applies to every subcommand beneath that node. Resolution
//! at a path concatenates wildcard tokens from the root down, then the
//! exact tokens at the path, wildcard before exact at every level.

use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    #[error("extra options are not valid JSON: {source}")]
    MalformedJson { source: serde_json::Error },
    #[error("the extra options for '{path}' ('{value}') are not in an array")]
    NotAnArray { path: String, value: String },
    #[error("the extra option for '{path}' ('{value}') is not a primitive value")]
    NonPrimitiveToken { path: String, value: String },
}

/// A parsed, fully validated override tree.
///
/// The tagged shape makes the merge rule explicit: wildcard tokens live on
/// the node they were declared under, exact tokens only on nodes that were
/// JSON arrays, and children carry everything deeper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTree {
    pub wildcard_tokens: Vec<String>,
    pub exact_tokens: Vec<String>,
    pub children: BTreeMap<String, OverrideTree>,
}

impl OverrideTree {
    /// Parse and validate an override blob. Every token in the whole tree
    /// is checked up front, so resolution afterwards cannot fail.
    pub fn parse(blob: &str) -> Result<Self, OverrideError> {
        let value: Value =
            serde_json::from_str(blob).map_err(|source| OverrideError::MalformedJson { source })?;
        Self::from_json(&value)
    }

    /// Build a tree from an already-parsed JSON value.
    pub fn from_json(value: &Value) -> Result<Self, OverrideError> {
        build_node(value, &mut Vec::new())
    }

    /// Resolve the ordered argument tokens for one subcommand path.
    ///
    /// Wildcard tokens at every ancestor come first (root to leaf), then
    /// the exact tokens at the path itself. Paths with no overrides
    /// resolve to the wildcards that still apply.
    pub fn resolve(&self, path: &[&str]) -> Vec<String> {
        let mut tokens = self.wildcard_tokens.clone();
        match path.split_first() {
            None => tokens.extend(self.exact_tokens.iter().cloned()),
            Some((head, rest)) => {
                if let Some(child) = self.children.get(*head) {
                    tokens.extend(child.resolve(rest));
                }
            }
        }
        tokens
    }

    /// True when no overrides exist anywhere in the tree.
    pub fn is_empty(&self) -> bool {
        self.wildcard_tokens.is_empty()
            && self.exact_tokens.is_empty()
            && self.children.values().all(OverrideTree::is_empty)
    }
}

fn build_node(value: &Value, path: &mut Vec<String>) -> Result<OverrideTree, OverrideError> {
    match value {
        Value::Null => Ok(OverrideTree::default()),
        Value::Array(items) => Ok(OverrideTree {
            exact_tokens: tokens_from_array(items, path)?,
            ..OverrideTree::default()
        }),
        Value::Object(entries) => {
            let mut node = OverrideTree::default();
            for (key, child_value) in entries {
                path.push(key.clone());
                if key == "*" {
                    node.wildcard_tokens = match child_value {
                        Value::Array(items) => tokens_from_array(items, path)?,
                        other => {
                            let err = OverrideError::NotAnArray {
                                path: path.join("."),
                                value: other.to_string(),
                            };
                            path.pop();
                            return Err(err);
                        }
                    };
                } else {
                    let child = build_node(child_value, path);
                    match child {
                        Ok(child) => {
                            node.children.insert(key.clone(), child);
                        }
                        Err(err) => {
                            path.pop();
                            return Err(err);
                        }
                    }
                }
                path.pop();
            }
            Ok(node)
        }
        other => Err(OverrideError::NotAnArray {
            path: path.join("."),
            value: other.to_string(),
        }),
    }
}

fn tokens_from_array(items: &[Value], path: &[String]) -> Result<Vec<String>, OverrideError> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(OverrideError::NonPrimitiveToken {
                path: path.join("."),
                value: other.to_string(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(blob: &str) -> OverrideTree {
        OverrideTree::parse(blob).expect("test blob should parse")
    }

    #[test]
    fn wildcard_precedes_exact_at_the_leaf() {
        let t = tree(r#"{"*": ["--global"], "database": {"init": ["--debug"]}}"#);
        assert_eq!(t.resolve(&["database", "init"]), vec!["--global", "--debug"]);
    }

    #[test]
    fn wildcards_accumulate_root_to_leaf() {
        let t = tree(
            r#"{"*": ["-a"], "database": {"*": ["-b"], "init": ["-c"], "finalize": ["-d"]}}"#,
        );
        assert_eq!(t.resolve(&["database", "init"]), vec!["-a", "-b", "-c"]);
        assert_eq!(t.resolve(&["database", "finalize"]), vec!["-a", "-b", "-d"]);
        assert_eq!(t.resolve(&["database", "analyze"]), vec!["-a", "-b"]);
        assert_eq!(t.resolve(&["resolve", "queries"]), vec!["-a"]);
    }

    #[test]
    fn numbers_and_booleans_are_stringified() {
        let t = tree(r#"{"database": {"init": ["--threads", 4, true]}}"#);
        assert_eq!(
            t.resolve(&["database", "init"]),
            vec!["--threads", "4", "true"]
        );
    }

    #[test]
    fn empty_blob_resolves_to_nothing() {
        let t = tree("{}");
        assert!(t.is_empty());
        assert!(t.resolve(&["database", "init"]).is_empty());
    }

    #[test]
    fn malformed_json_is_fatal() {
        let err = OverrideTree::parse("{not json").expect_err("should fail");
        assert!(matches!(err, OverrideError::MalformedJson { .. }));
    }

    #[test]
    fn non_primitive_token_names_the_exact_path() {
        let err = OverrideTree::parse(r#"{"database": {"init": [{"nested": 1}]}}"#)
            .expect_err("should fail");
        match err {
            OverrideError::NonPrimitiveToken { path, .. } => {
                assert_eq!(path, "database.init");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_array_options_name_the_exact_path() {
        let err = OverrideTree::parse(r#"{"database": {"init": "--debug"}}"#)
            .expect_err("should fail");
        match err {
            OverrideError::NotAnArray { path, value } => {
                assert_eq!(path, "database.init");
                assert_eq!(value, "\"--debug\"");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_array_wildcard_names_the_wildcard_path() {
        let err = OverrideTree::parse(r#"{"database": {"*": 7}}"#).expect_err("should fail");
        match err {
            OverrideError::NotAnArray { path, .. } => assert_eq!(path, "database.*"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resolution_is_deterministic() {
        let t = tree(r#"{"*": ["-a"], "resolve": {"languages": ["-b"]}}"#);
        let first = t.resolve(&["resolve", "languages"]);
        for _ in 0..10 {
            assert_eq!(t.resolve(&["resolve", "languages"]), first);
        }
    }
}
