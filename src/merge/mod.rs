//! Merge Engine
//!
//! Folds profiles left to right into one normalized profile:
//! - mounts: union keyed by `(host, container)`; a later mount with the same
//!   pair replaces the earlier one in place (so its mode wins)
//! - env: later assignment overwrites, first-seen key order kept
//! - args: append flag groups, skipping groups already present; a known flag
//!   whose values are cut off is dropped
//! - run: last non-empty command wins outright
//! - tmpfs/dev/proc: union, first-seen order
//! - description: last non-empty value wins

use bwrap_argv::{flag_arity, group_args};
use tracing::{trace, warn};

use crate::profile::{Mount, Profile};

/// Merge profiles in order. The result is a new value; inputs are untouched.
///
/// An empty slice yields the default profile, and a single normalized
/// profile comes back unchanged.
pub fn merge(profiles: &[Profile]) -> Profile {
    profiles.iter().fold(Profile::default(), |mut acc, next| {
        merge_into(&mut acc, next);
        acc
    })
}

/// Overlay `next` onto `acc`.
pub fn merge_into(acc: &mut Profile, next: &Profile) {
    for mount in &next.mounts {
        merge_mount(&mut acc.mounts, mount);
    }

    for (key, value) in &next.env {
        acc.env.insert(key.clone(), value.clone());
    }

    merge_args(&mut acc.args, &next.args);

    if let Some(run) = next.run.as_ref().filter(|r| !r.is_empty()) {
        acc.run = Some(run.clone());
    }

    union_into(&mut acc.tmpfs, &next.tmpfs);
    union_into(&mut acc.dev, &next.dev);
    union_into(&mut acc.proc, &next.proc);

    if let Some(description) = next.description.as_ref().filter(|d| !d.is_empty()) {
        acc.description = Some(description.clone());
    }
}

fn merge_mount(mounts: &mut Vec<Mount>, mount: &Mount) {
    match mounts.iter_mut().find(|m| m.same_target(mount)) {
        Some(existing) => {
            if existing.mode != mount.mode {
                trace!(
                    host = %mount.host,
                    container = %mount.container,
                    mode = %mount.mode,
                    "mount mode overridden"
                );
            }
            existing.mode = mount.mode;
        }
        None => mounts.push(mount.clone()),
    }
}

fn merge_args(acc: &mut Vec<String>, next: &[String]) {
    let mut seen = group_args(acc.as_slice());
    for group in group_args(next) {
        if is_truncated(&group) {
            warn!(flag = %group[0], "dropping flag with missing values");
            continue;
        }
        if !seen.contains(&group) {
            acc.extend(group.iter().cloned());
            seen.push(group);
        }
    }
}

/// A known value-taking flag that `group_args` left on its own.
fn is_truncated(group: &[String]) -> bool {
    match group {
        [flag] => flag_arity(flag).is_some_and(|n| n > 0),
        _ => false,
    }
}

fn union_into(acc: &mut Vec<String>, next: &[String]) {
    for item in next {
        if !acc.contains(item) {
            acc.push(item.clone());
        }
    }
}
