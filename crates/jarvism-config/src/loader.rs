//! YAML front end producing the generic tree

use crate::error::{ConfigError, Result};
use crate::value::Value;
use indexmap::IndexMap;
use std::path::Path;

/// Load a configuration tree from a YAML file
pub fn load_file(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    load_str_named(&contents, &path.display().to_string())
}

/// Load a configuration tree from a YAML document in memory
pub fn load_str(contents: &str) -> Result<Value> {
    load_str_named(contents, "<inline>")
}

fn load_str_named(contents: &str, origin: &str) -> Result<Value> {
    let raw: serde_yaml::Value =
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
    convert(&raw, origin)
}

fn convert(raw: &serde_yaml::Value, at: &str) -> Result<Value> {
    match raw {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Str(b.to_string())),
        serde_yaml::Value::Number(n) => Ok(Value::Str(n.to_string())),
        serde_yaml::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_yaml::Value::Sequence(items) => {
            let converted = items
                .iter()
                .map(|v| convert(v, at))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::List(converted))
        }
        serde_yaml::Value::Mapping(entries) => {
            let mut map = IndexMap::new();
            for (k, v) in entries {
                let key = scalar_key(k, at)?;
                let value = convert(v, &key)?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        serde_yaml::Value::Tagged(t) => Err(ConfigError::Unsupported {
            at: at.to_string(),
            what: format!("tagged value {}", t.tag),
        }),
    }
}

fn scalar_key(key: &serde_yaml::Value, at: &str) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        _ => Err(ConfigError::NonScalarKey { at: at.to_string() }),
    }
}
