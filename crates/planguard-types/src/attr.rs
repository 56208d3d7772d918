//! Typed accessors into the nested attribute tree.
//!
//! Plans carry arbitrary vendor-specific attribute trees. Mappers read a
//! small fixed set of fields through dotted paths (`root_block_device.0.volume_size`)
//! and get a typed value or a missing-field error, uniformly for numbers,
//! booleans, strings, sequences, and nested mappings.

use serde_json::Value;
use thiserror::Error;

/// Attribute lookup errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttrError {
    #[error("attribute not found: {0}")]
    Missing(String),

    #[error("attribute {path} has unexpected type: expected {expected}")]
    WrongType { path: String, expected: &'static str },
}

/// Dotted-path accessor over a [`serde_json::Value`] tree.
///
/// Path segments that parse as integers index into sequences.
pub struct AttrPath<'a> {
    root: &'a Value,
}

impl<'a> AttrPath<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Resolve a dotted path to the raw value.
    pub fn get(&self, path: &str) -> Result<&'a Value, AttrError> {
        let mut current = self.root;
        for part in path.split('.') {
            current = match current {
                Value::Object(map) => map
                    .get(part)
                    .ok_or_else(|| AttrError::Missing(path.to_string()))?,
                Value::Array(items) => {
                    let idx: usize = part
                        .parse()
                        .map_err(|_| AttrError::Missing(path.to_string()))?;
                    items
                        .get(idx)
                        .ok_or_else(|| AttrError::Missing(path.to_string()))?
                }
                _ => return Err(AttrError::Missing(path.to_string())),
            };
        }
        if current.is_null() {
            return Err(AttrError::Missing(path.to_string()));
        }
        Ok(current)
    }

    pub fn string(&self, path: &str) -> Result<String, AttrError> {
        match self.get(path)? {
            Value::String(s) => Ok(s.clone()),
            _ => Err(AttrError::WrongType {
                path: path.to_string(),
                expected: "string",
            }),
        }
    }

    /// Non-empty string, or missing.
    pub fn non_empty_string(&self, path: &str) -> Result<String, AttrError> {
        let s = self.string(path)?;
        if s.is_empty() {
            return Err(AttrError::Missing(path.to_string()));
        }
        Ok(s)
    }

    pub fn number(&self, path: &str) -> Result<f64, AttrError> {
        match self.get(path)? {
            Value::Number(n) => n.as_f64().ok_or(AttrError::WrongType {
                path: path.to_string(),
                expected: "number",
            }),
            _ => Err(AttrError::WrongType {
                path: path.to_string(),
                expected: "number",
            }),
        }
    }

    pub fn boolean(&self, path: &str) -> Result<bool, AttrError> {
        match self.get(path)? {
            Value::Bool(b) => Ok(*b),
            _ => Err(AttrError::WrongType {
                path: path.to_string(),
                expected: "boolean",
            }),
        }
    }

    pub fn sequence(&self, path: &str) -> Result<&'a Vec<Value>, AttrError> {
        match self.get(path)? {
            Value::Array(items) => Ok(items),
            _ => Err(AttrError::WrongType {
                path: path.to_string(),
                expected: "sequence",
            }),
        }
    }

    pub fn mapping(&self, path: &str) -> Result<&'a serde_json::Map<String, Value>, AttrError> {
        match self.get(path)? {
            Value::Object(map) => Ok(map),
            _ => Err(AttrError::WrongType {
                path: path.to_string(),
                expected: "mapping",
            }),
        }
    }

    /// Convenience readers with defaults, for non-price-determining fields.
    pub fn string_or(&self, path: &str, default: &str) -> String {
        self.non_empty_string(path)
            .unwrap_or_else(|_| default.to_string())
    }

    pub fn number_or(&self, path: &str, default: f64) -> f64 {
        self.number(path).unwrap_or(default)
    }

    pub fn boolean_or(&self, path: &str, default: bool) -> bool {
        self.boolean(path).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_paths() {
        let attrs = json!({
            "instance_type": "t3.medium",
            "monitoring": true,
            "root_block_device": [{"volume_size": 50, "volume_type": "gp3"}],
        });
        let path = AttrPath::new(&attrs);
        assert_eq!(path.string("instance_type").unwrap(), "t3.medium");
        assert!(path.boolean("monitoring").unwrap());
        assert_eq!(path.number("root_block_device.0.volume_size").unwrap(), 50.0);
        assert_eq!(
            path.string("root_block_device.0.volume_type").unwrap(),
            "gp3"
        );
    }

    #[test]
    fn missing_paths_report_missing() {
        let attrs = json!({"a": {"b": 1}});
        let path = AttrPath::new(&attrs);
        assert_eq!(
            path.get("a.c"),
            Err(AttrError::Missing("a.c".to_string()))
        );
        assert_eq!(
            path.get("a.b.c"),
            Err(AttrError::Missing("a.b.c".to_string()))
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let attrs = json!({"size": null});
        let path = AttrPath::new(&attrs);
        assert!(matches!(path.get("size"), Err(AttrError::Missing(_))));
    }

    #[test]
    fn wrong_type_is_not_missing() {
        let attrs = json!({"size": "big"});
        let path = AttrPath::new(&attrs);
        assert_eq!(
            path.number("size"),
            Err(AttrError::WrongType {
                path: "size".to_string(),
                expected: "number"
            })
        );
    }
}
