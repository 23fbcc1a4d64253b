//! Profile Store
//!
//! Locates a profile by name on an ordered search path and loads it into a
//! [`RawProfile`]. Directories are tried in order; inside a directory the
//! extensions of [`PROFILE_EXTENSIONS`] are tried in order, then the bare
//! name. The first match wins.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::profile::{ProfileError, RawProfile, PROFILE_EXTENSIONS};

/// A profile file read from disk.
#[derive(Debug, Clone)]
pub struct LoadedProfile {
    /// Name the profile was requested under.
    pub name: String,

    /// Canonical path of the file.
    pub path: PathBuf,

    /// SHA-256 digest of the raw file bytes.
    pub digest: String,

    pub raw: RawProfile,
}

/// A profile visible on the search path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Ordered set of directories holding profile files.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    search_dirs: Vec<PathBuf>,
}

impl ProfileStore {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Directories consulted for `name`, with `origin` (the directory of the
    /// profile that referenced it) first.
    pub fn candidate_dirs(&self, origin: Option<&Path>) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(self.search_dirs.len() + 1);
        if let Some(origin) = origin {
            dirs.push(origin.to_path_buf());
        }
        for dir in &self.search_dirs {
            if !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        dirs
    }

    /// Find the file for `name`.
    ///
    /// A name that is itself a path to an existing file is used directly. A
    /// relative path is tried against `origin` before the working directory.
    pub fn locate(&self, name: &str, origin: Option<&Path>) -> Option<PathBuf> {
        let direct = Path::new(name);
        if looks_like_path(name) {
            let beside = origin
                .filter(|_| direct.is_relative())
                .map(|o| o.join(direct));
            if let Some(beside) = beside.filter(|p| p.is_file()) {
                return Some(beside);
            }
            if direct.is_file() {
                return Some(direct.to_path_buf());
            }
        }

        for dir in self.candidate_dirs(origin) {
            for ext in PROFILE_EXTENSIONS {
                let candidate = dir.join(format!("{}.{}", name, ext));
                debug!(candidate = %candidate.display(), "probing profile");
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
            let literal = dir.join(name);
            if literal.is_file() {
                return Some(literal);
            }
        }
        None
    }

    /// Locate and parse `name`.
    pub fn load(&self, name: &str, origin: Option<&Path>) -> Result<LoadedProfile, ProfileError> {
        let path = self
            .locate(name, origin)
            .ok_or_else(|| ProfileError::NotFound {
                name: name.to_string(),
                searched: self.candidate_dirs(origin),
            })?;
        let path = fs::canonicalize(&path).unwrap_or(path);
        self.load_path(name, &path)
    }

    /// Parse the profile file at `path`, recording it under `name`.
    pub fn load_path(&self, name: &str, path: &Path) -> Result<LoadedProfile, ProfileError> {
        let bytes = fs::read(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let text = String::from_utf8(bytes).map_err(|e| ProfileError::Parse {
            name: name.to_string(),
            path: path.to_path_buf(),
            message: format!("Invalid UTF-8: {}", e),
        })?;

        let raw = crate::profile::parse_profile(name, path, &text)?;
        debug!(profile = name, path = %path.display(), "loaded profile");

        Ok(LoadedProfile {
            name: name.to_string(),
            path: path.to_path_buf(),
            digest,
            raw,
        })
    }

    /// Every profile name visible on the search path, sorted by name.
    ///
    /// When the same name exists in several directories, the entry that
    /// [`ProfileStore::locate`] would pick is reported.
    pub fn list(&self) -> Vec<ProfileEntry> {
        let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();

        for dir in &self.search_dirs {
            let mut in_dir: Vec<(String, usize, PathBuf)> = WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_file())
                .filter_map(|entry| {
                    let path = entry.into_path();
                    let ext = path.extension()?.to_str()?;
                    let rank = PROFILE_EXTENSIONS.iter().position(|e| *e == ext)?;
                    let stem = path.file_stem()?.to_str()?.to_string();
                    Some((stem, rank, path))
                })
                .collect();
            in_dir.sort();

            for (name, _, path) in in_dir {
                found.entry(name).or_insert(path);
            }
        }

        found
            .into_iter()
            .map(|(name, path)| ProfileEntry { name, path })
            .collect()
    }
}

fn looks_like_path(name: &str) -> bool {
    name.contains(std::path::MAIN_SEPARATOR)
        || name.contains('/')
        || PROFILE_EXTENSIONS
            .iter()
            .any(|ext| name.ends_with(&format!(".{}", ext)))
}
