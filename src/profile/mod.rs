//! Profile data model
//!
//! A profile describes mounts, environment, extra bwrap arguments,
//! synthetic filesystems and a command to run. Files on disk are read into a
//! [`RawProfile`] (strict schema, still carrying `extends`), and every
//! consumer past the loader works with the normalized [`Profile`].

mod document;
mod lint;

pub(crate) use document::parse_profile;
pub use document::{parse_document, DocumentFormat, PROFILE_EXTENSIONS};
pub use lint::{validate_document, validate_file, ValidationReport};

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Errors raised while loading and resolving profiles.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile '{name}' not found (searched: {})", display_dirs(.searched))]
    NotFound { name: String, searched: Vec<PathBuf> },

    #[error("Failed to parse profile '{name}' ({}): {message}", .path.display())]
    Parse {
        name: String,
        path: PathBuf,
        message: String,
    },

    #[error("Circular extends detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Failed to read profile file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Comma-separated directory list for messages.
pub fn display_dirs(dirs: &[PathBuf]) -> String {
    if dirs.is_empty() {
        return "no search directories".to_string();
    }
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Access mode of a bind mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MountMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

impl MountMode {
    /// Parse the spellings accepted in profile files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ro" | "readonly" | "read-only" => Some(MountMode::ReadOnly),
            "rw" | "readwrite" | "read-write" => Some(MountMode::ReadWrite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MountMode::ReadOnly => "ro",
            MountMode::ReadWrite => "rw",
        }
    }

    /// bwrap flag for binding with this mode.
    pub fn bind_flag(&self) -> &'static str {
        match self {
            MountMode::ReadOnly => "--ro-bind",
            MountMode::ReadWrite => "--bind",
        }
    }
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MountMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MountMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MountMode::parse(&s).ok_or_else(|| {
            de::Error::custom(format!(
                "invalid mount mode '{}': expected 'ro' or 'rw'",
                s
            ))
        })
    }
}

/// A bind mount from the host into the sandbox.
///
/// Identity for de-duplication is the `(host, container)` pair; `mode` is
/// not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub host: String,
    pub container: String,
    #[serde(default)]
    pub mode: MountMode,
}

impl Mount {
    pub fn new(host: impl Into<String>, container: impl Into<String>, mode: MountMode) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode,
        }
    }

    pub fn same_target(&self, other: &Mount) -> bool {
        self.host == other.host && self.container == other.container
    }
}

/// A value given either as a single string or as a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

impl Serialize for OneOrMany {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OneOrMany::One(s) => serializer.serialize_str(s),
            OneOrMany::Many(v) => v.serialize(serializer),
        }
    }
}

/// Environment values may be written as strings, numbers or booleans.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

fn deserialize_env<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IndexMap<String, Scalar>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect())
}

/// Profile as written in a file.
///
/// Unknown keys are ignored; every known key is type-checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,

    #[serde(
        default,
        deserialize_with = "deserialize_env",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub env: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmpfs: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proc: Option<OneOrMany>,
}

impl RawProfile {
    /// Parent profile names in declaration order.
    pub fn parents(&self) -> Vec<String> {
        self.extends
            .clone()
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
    }

    /// Normalize this profile's own fields, dropping `extends`.
    ///
    /// Duplicates inside a single file are collapsed by the same rules the
    /// merge engine applies across profiles, so the result already satisfies
    /// every [`Profile`] invariant.
    pub fn to_profile(&self) -> Profile {
        let own = Profile {
            description: self.description.clone().filter(|d| !d.is_empty()),
            mounts: self.mounts.clone(),
            env: self.env.clone(),
            args: self.args.clone(),
            run: self.run.clone().and_then(|run| command_or_none(run.into_vec())),
            tmpfs: self.tmpfs.clone().map(OneOrMany::into_vec).unwrap_or_default(),
            dev: self.dev.clone().map(OneOrMany::into_vec).unwrap_or_default(),
            proc: self.proc.clone().map(OneOrMany::into_vec).unwrap_or_default(),
        };
        crate::merge::merge(&[own])
    }
}

/// Drop empty leading tokens; `None` when no program is left.
///
/// Empty arguments after the program are kept.
pub(crate) fn command_or_none(mut run: Vec<String>) -> Option<Vec<String>> {
    let program = run.iter().position(|t| !t.is_empty())?;
    run.drain(..program);
    Some(run)
}

/// Normalized profile: inheritance applied, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Never an empty list when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tmpfs: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dev: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proc: Vec<String>,
}

impl Profile {
    pub fn is_empty(&self) -> bool {
        self == &Profile::default()
    }
}
