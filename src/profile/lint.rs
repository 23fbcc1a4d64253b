//! Profile validation report for the `validate` command.
//!
//! The loader stops at the first schema violation; this collects every
//! problem in a document so a user can fix them in one pass.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::document::{parse_document, DocumentFormat};
use super::{Mount, OneOrMany, Scalar};

/// Top-level keys understood by the loader.
const KNOWN_KEYS: &[&str] = &[
    "description",
    "extends",
    "mounts",
    "env",
    "args",
    "run",
    "tmpfs",
    "dev",
    "proc",
];

/// Outcome of validating one profile document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Schema violations; the loader would reject the file.
    pub errors: Vec<String>,

    /// Keys the loader ignores.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn check<T: DeserializeOwned>(errors: &mut Vec<String>, field: &str, value: &Value) {
    if let Err(e) = serde_json::from_value::<T>(value.clone()) {
        errors.push(format!("'{}': {}", field, e));
    }
}

/// The trailing known flag of `args` when its values are cut off.
fn dangling_flag(value: &Value) -> Option<String> {
    let args: Vec<String> = serde_json::from_value(value.clone()).ok()?;
    let last = bwrap_argv::group_args(&args).pop()?;
    match last.as_slice() {
        [flag] if bwrap_argv::flag_arity(flag).is_some_and(|n| n > 0) => Some(flag.clone()),
        _ => None,
    }
}

/// Validate an already parsed document.
pub fn validate_document(document: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let map = match document.as_object() {
        Some(map) => map,
        None => {
            report.errors.push("profile must be a mapping".to_string());
            return report;
        }
    };

    let mut unknown: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|k| !KNOWN_KEYS.contains(k))
        .collect();
    unknown.sort_unstable();
    if !unknown.is_empty() {
        report
            .warnings
            .push(format!("Unknown keys (ignored): {}", unknown.join(", ")));
    }

    let errors = &mut report.errors;
    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        match key.as_str() {
            "description" => check::<String>(errors, key, value),
            "extends" | "run" | "tmpfs" | "dev" | "proc" => check::<OneOrMany>(errors, key, value),
            "args" => {
                check::<Vec<String>>(errors, key, value);
                if let Some(flag) = dangling_flag(value) {
                    report.warnings.push(format!(
                        "'args': {} is missing its values and will be dropped",
                        flag
                    ));
                }
            }
            "env" => check::<indexmap::IndexMap<String, Scalar>>(errors, key, value),
            "mounts" => match value.as_array() {
                Some(entries) => {
                    for (i, entry) in entries.iter().enumerate() {
                        check::<Mount>(errors, &format!("mounts[{}]", i), entry);
                    }
                }
                None => errors.push("'mounts' must be a list".to_string()),
            },
            _ => {}
        }
    }

    report
}

/// Read and validate a profile file.
pub fn validate_file(path: &Path) -> ValidationReport {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            return ValidationReport {
                errors: vec![format!("cannot read {}: {}", path.display(), e)],
                warnings: Vec::new(),
            }
        }
    };

    match parse_document(&text, DocumentFormat::from_path(path)) {
        Ok(document) => validate_document(&document),
        Err(message) => ValidationReport {
            errors: vec![message],
            warnings: Vec::new(),
        },
    }
}
