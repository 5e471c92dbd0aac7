//! YAML input handling
//!
//! Manifests and declarations are parsed with yaml-rust2 and converted to
//! `serde_json::Value`, so every later stage works on one value model.

use serde_json::{Map, Number, Value};
use thiserror::Error;
use yaml_rust2::{Yaml, YamlLoader};

/// Errors raised while reading YAML input
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum YamlError {
    /// The text is not well-formed YAML
    #[error("YAML syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
        /// Scanner message
        message: String,
    },

    /// Well-formed YAML that has no JSON equivalent
    #[error("unsupported YAML construct: {0}")]
    Unsupported(String),
}

/// Parse the first document of `input`. Empty input yields `Value::Null`.
pub fn parse_yaml(input: &str) -> Result<Value, YamlError> {
    load(input)?
        .into_iter()
        .next()
        .map_or(Ok(Value::Null), to_json)
}

/// Parse every non-empty document of a `---` separated stream.
///
/// Empty documents (a stray `---` or a trailing separator) are skipped.
pub fn parse_documents(input: &str) -> Result<Vec<Value>, YamlError> {
    load(input)?
        .into_iter()
        .filter(|doc| !doc.is_null())
        .map(to_json)
        .collect()
}

fn load(input: &str) -> Result<Vec<Yaml>, YamlError> {
    YamlLoader::load_from_str(input).map_err(|e| YamlError::Syntax {
        line: e.marker().line(),
        column: e.marker().col() + 1,
        message: e.info().to_string(),
    })
}

fn to_json(yaml: Yaml) -> Result<Value, YamlError> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::Number(i.into()),
        Yaml::Real(text) => {
            let f: f64 = text
                .parse()
                .map_err(|_| YamlError::Unsupported(format!("float '{}'", text)))?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| YamlError::Unsupported(format!("non-finite float '{}'", text)))?
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => Value::Array(items.into_iter().map(to_json).collect::<Result<_, _>>()?),
        Yaml::Hash(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(key_string(key)?, to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Alias(_) => return Err(YamlError::Unsupported("aliases".to_string())),
        Yaml::BadValue => return Err(YamlError::Unsupported("invalid value".to_string())),
    })
}

fn key_string(key: Yaml) -> Result<String, YamlError> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        _ => Err(YamlError::Unsupported("non-scalar mapping key".to_string())),
    }
}
