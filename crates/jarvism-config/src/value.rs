//! The generic configuration tree
//!
//! Everything the plan compiler consumes is a [`Value`]: a tagged tree of
//! strings, lists and string-keyed maps. YAML is the usual producer but any
//! loader returning this shape can drive the parser. Scalars that YAML types
//! as booleans or numbers are carried as their string rendering, since the
//! schema is textual throughout.

use crate::error::{ConfigError, Result};
use indexmap::IndexMap;

/// A node of the generic configuration tree
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null (an empty section)
    Null,
    /// A scalar, always carried as text
    Str(String),
    /// A sequence of nodes
    List(Vec<Value>),
    /// A mapping with document order preserved
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Shorthand for an empty mapping
    pub fn empty_map() -> Value {
        Value::Map(IndexMap::new())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// The scalar text of this node, or a type-mismatch error naming `at`
    pub fn as_str(&self, at: &str) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(at, "string", other)),
        }
    }

    /// The elements of this node as a list, or a type-mismatch error
    pub fn as_list(&self, at: &str) -> Result<&[Value]> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(mismatch(at, "list", other)),
        }
    }

    /// The entries of this node as a map; `Null` reads as an empty section
    pub fn as_map(&self, at: &str) -> Result<IndexMap<String, Value>> {
        match self {
            Value::Map(entries) => Ok(entries.clone()),
            Value::Null => Ok(IndexMap::new()),
            other => Err(mismatch(at, "map", other)),
        }
    }

    /// A list of scalars rendered to strings, or a type-mismatch error
    pub fn as_str_list(&self, at: &str) -> Result<Vec<String>> {
        let items = self.as_list(at)?;
        items
            .iter()
            .map(|v| v.as_str(at).map(str::to_owned))
            .collect()
    }

    /// Scalar-or-list-of-scalars, joined with single spaces
    ///
    /// This is the shape of every command-fragment leaf in the schema.
    pub fn as_text(&self, at: &str) -> Result<String> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            Value::List(_) => Ok(self.as_str_list(at)?.join(" ")),
            other => Err(mismatch(at, "string or list of strings", other)),
        }
    }
}

fn mismatch(at: &str, expected: &'static str, found: &Value) -> ConfigError {
    ConfigError::TypeMismatch {
        at: at.to_string(),
        expected,
        found: found.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_text_joins_lists() {
        let v = Value::List(vec![
            Value::Str("-timescale=1ns/1ps".into()),
            Value::Str("-full64".into()),
        ]);
        assert_eq!(v.as_text("compile_option").unwrap(), "-timescale=1ns/1ps -full64");
    }

    #[test]
    fn test_mismatch_names_the_node() {
        let v = Value::Map(IndexMap::new());
        let err = v.as_str("build1").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("build1"), "{}", msg);
        assert!(msg.contains("expected string"), "{}", msg);
    }

    #[test]
    fn test_null_reads_as_empty_map() {
        assert!(Value::Null.as_map("env").unwrap().is_empty());
    }
}
