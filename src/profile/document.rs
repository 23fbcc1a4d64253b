//! Profile documents on disk
//!
//! Every supported format is read into a `serde_json::Value` first so that
//! typed validation and linting see the same shape regardless of syntax.

use std::path::Path;

use serde_json::Value;

use super::{ProfileError, RawProfile};

/// File extensions tried, in order, when looking a profile up by name.
pub const PROFILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "toml"];

/// Serialization format of a profile file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Format implied by the file extension. Anything unrecognized is read
    /// as YAML, which also accepts JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => DocumentFormat::Json,
            Some("toml") => DocumentFormat::Toml,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Parse document text into a generic value.
///
/// An empty document yields an empty mapping. A top-level `profiles`
/// mapping holding exactly one entry is unwrapped to that entry.
pub fn parse_document(text: &str, format: DocumentFormat) -> Result<Value, String> {
    let value = match format {
        DocumentFormat::Yaml => {
            serde_yaml::from_str::<Value>(text).map_err(|e| format!("YAML parse error: {}", e))?
        }
        DocumentFormat::Json => {
            serde_json::from_str::<Value>(text).map_err(|e| format!("JSON parse error: {}", e))?
        }
        DocumentFormat::Toml => {
            let table: toml::Value =
                toml::from_str(text).map_err(|e| format!("TOML parse error: {}", e))?;
            toml_to_json(table)
        }
    };

    let value = match value {
        Value::Null => Value::Object(serde_json::Map::new()),
        Value::Object(_) => unwrap_profiles(value),
        _ => return Err("profile document must be a mapping".to_string()),
    };
    Ok(value)
}

fn unwrap_profiles(value: Value) -> Value {
    if let Value::Object(ref map) = value {
        if let Some(Value::Object(profiles)) = map.get("profiles") {
            if profiles.len() == 1 {
                if let Some(inner) = profiles.values().next() {
                    return inner.clone();
                }
            }
        }
    }
    value
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}

/// Parse a profile file's text into the typed schema.
pub(crate) fn parse_profile(
    name: &str,
    path: &Path,
    text: &str,
) -> Result<RawProfile, ProfileError> {
    let parse_error = |message: String| ProfileError::Parse {
        name: name.to_string(),
        path: path.to_path_buf(),
        message,
    };

    let document = parse_document(text, DocumentFormat::from_path(path)).map_err(parse_error)?;
    serde_json::from_value(document).map_err(|e| parse_error(e.to_string()))
}
