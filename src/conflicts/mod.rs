//! Conflict analysis for composed profiles
//!
//! Merging always succeeds; this reports the places where a later profile
//! silently changed what an earlier one asked for, or where the merged
//! result asks bwrap for contradictory things.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::profile::{MountMode, Profile};

/// Flag pairs that cannot both be honoured.
const CONTRADICTING_FLAGS: &[(&str, &str)] = &[("--unshare-net", "--share-net")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    MountMode,
    RoWritableSubdir,
    EnvOverride,
    NsContradiction,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::MountMode => "mount-mode",
            ConflictKind::RoWritableSubdir => "ro-writable-subdir",
            ConflictKind::EnvOverride => "env-override",
            ConflictKind::NsContradiction => "ns-contradiction",
        }
    }
}

/// A single detected conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub description: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{} [{}]: {}", level, self.kind.as_str(), self.description)
    }
}

/// Analyse the profiles fed into a merge and the merged result.
pub fn detect_conflicts(inputs: &[Profile], merged: &Profile) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    conflicts.extend(mount_mode_conflicts(inputs));
    conflicts.extend(ro_writable_subdirs(merged));
    conflicts.extend(env_overrides(inputs));
    conflicts.extend(flag_contradictions(merged));
    conflicts
}

/// True when any conflict is severe enough to refuse the composition.
pub fn has_errors(conflicts: &[Conflict]) -> bool {
    conflicts.iter().any(|c| c.severity == Severity::Error)
}

fn mount_mode_conflicts(inputs: &[Profile]) -> Vec<Conflict> {
    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut modes: HashMap<(&str, &str), Vec<MountMode>> = HashMap::new();

    for profile in inputs {
        for mount in &profile.mounts {
            let key = (mount.host.as_str(), mount.container.as_str());
            let seen = modes.entry(key).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });
            if !seen.contains(&mount.mode) {
                seen.push(mount.mode);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let seen = modes.get(&key)?;
            if seen.len() < 2 {
                return None;
            }
            let last = seen.last()?;
            Some(Conflict {
                kind: ConflictKind::MountMode,
                severity: Severity::Warning,
                description: format!(
                    "Mount '{}' -> '{}' is requested both read-only and read-write; \
                     the last mode ({}) takes effect",
                    key.0, key.1, last
                ),
            })
        })
        .collect()
}

fn ro_writable_subdirs(merged: &Profile) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for rw in merged.mounts.iter().filter(|m| m.mode == MountMode::ReadWrite) {
        for ro in merged.mounts.iter().filter(|m| m.mode == MountMode::ReadOnly) {
            let child = Path::new(&rw.container);
            let parent = Path::new(&ro.container);
            if child != parent && child.starts_with(parent) {
                conflicts.push(Conflict {
                    kind: ConflictKind::RoWritableSubdir,
                    severity: Severity::Warning,
                    description: format!(
                        "Writable mount '{}' is nested under read-only mount '{}'",
                        rw.container, ro.container
                    ),
                });
            }
        }
    }
    conflicts
}

fn env_overrides(inputs: &[Profile]) -> Vec<Conflict> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    let mut conflicts = Vec::new();
    for profile in inputs {
        for (key, value) in &profile.env {
            if let Some(previous) = seen.insert(key.as_str(), value.as_str()) {
                if previous != value.as_str() {
                    conflicts.push(Conflict {
                        kind: ConflictKind::EnvOverride,
                        severity: Severity::Warning,
                        description: format!(
                            "Environment variable '{}' is set to '{}' and later overridden to '{}'",
                            key, previous, value
                        ),
                    });
                }
            }
        }
    }
    conflicts
}

fn flag_contradictions(merged: &Profile) -> Vec<Conflict> {
    CONTRADICTING_FLAGS
        .iter()
        .filter(|(a, b)| {
            merged.args.iter().any(|x| x == a) && merged.args.iter().any(|x| x == b)
        })
        .map(|(a, b)| Conflict {
            kind: ConflictKind::NsContradiction,
            severity: Severity::Error,
            description: format!(
                "Contradictory namespace flags '{}' and '{}' are both present",
                a, b
            ),
        })
        .collect()
}
