//! Inheritance Resolver
//!
//! Walks `extends` references depth-first. Each parent is resolved in the
//! order listed, the resolved parents are merged left to right, and the
//! child's own fields are merged last so they take priority.
//!
//! The chain of profiles currently being resolved is passed down by value,
//! so independent resolutions never share cycle-tracking state. Diamonds
//! are not errors: a shared ancestor is simply merged once per path, which
//! the merge rules absorb.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::merge::merge;
use crate::profile::{Profile, ProfileError};
use crate::store::{LoadedProfile, ProfileStore};

/// One link in the chain of profiles being resolved.
#[derive(Debug, Clone)]
struct Visit {
    name: String,
    path: PathBuf,
}

/// Resolves profile names against a store.
///
/// A resolver caches every file it loads, so a profile reached several times
/// within one composition is read once and always seen as the same snapshot.
/// Create one resolver per composition.
pub struct Resolver<'a> {
    store: &'a ProfileStore,
    cache: HashMap<PathBuf, Arc<LoadedProfile>>,
    load_order: Vec<Arc<LoadedProfile>>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a ProfileStore) -> Self {
        Self {
            store,
            cache: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    /// Resolve `name` (a profile name or a path to a profile file) into a
    /// normalized profile with all ancestors applied.
    ///
    /// `run` is not defaulted here; that happens once, at composition.
    pub fn resolve(&mut self, name: &str) -> Result<Profile, ProfileError> {
        self.resolve_from(name, None, Vec::new())
    }

    /// Files loaded so far, in first-load order.
    pub fn loaded(&self) -> &[Arc<LoadedProfile>] {
        &self.load_order
    }

    fn resolve_from(
        &mut self,
        name: &str,
        origin: Option<&Path>,
        visiting: Vec<Visit>,
    ) -> Result<Profile, ProfileError> {
        let path = self
            .store
            .locate(name, origin)
            .ok_or_else(|| ProfileError::NotFound {
                name: name.to_string(),
                searched: self.store.candidate_dirs(origin),
            })?;
        let path = fs::canonicalize(&path).unwrap_or(path);

        if visiting.iter().any(|v| v.path == path) {
            let mut cycle: Vec<String> = visiting.into_iter().map(|v| v.name).collect();
            cycle.push(name.to_string());
            return Err(ProfileError::Cycle { path: cycle });
        }

        let loaded = self.load_cached(name, &path)?;
        let parents = loaded.raw.parents();
        let own = loaded.raw.to_profile();

        if parents.is_empty() {
            return Ok(own);
        }

        debug!(profile = name, parents = ?parents, "resolving extends");

        let mut chain = visiting;
        chain.push(Visit {
            name: name.to_string(),
            path: path.clone(),
        });
        let parent_dir = path.parent().map(Path::to_path_buf);

        let mut layers = Vec::with_capacity(parents.len() + 1);
        for parent in &parents {
            layers.push(self.resolve_from(parent, parent_dir.as_deref(), chain.clone())?);
        }
        layers.push(own);

        Ok(merge(&layers))
    }

    fn load_cached(&mut self, name: &str, path: &Path) -> Result<Arc<LoadedProfile>, ProfileError> {
        if let Some(hit) = self.cache.get(path) {
            debug!(profile = name, path = %path.display(), "profile cache hit");
            return Ok(Arc::clone(hit));
        }
        let loaded = Arc::new(self.store.load_path(name, path)?);
        self.cache.insert(path.to_path_buf(), Arc::clone(&loaded));
        self.load_order.push(Arc::clone(&loaded));
        Ok(loaded)
    }
}
