//! Composition entry point
//!
//! Resolves every requested profile, merges them in the order given, applies
//! the outermost `run` default and an optional command override, and
//! synthesizes the final argument list.

use std::path::PathBuf;

use bwrap_argv::{parse_command, ParseError, ParsedCommand};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{Settings, DEFAULT_RUN};
use crate::conflicts::{detect_conflicts, Conflict};
use crate::merge::merge;
use crate::profile::{command_or_none, Mount, MountMode, Profile, ProfileError};
use crate::resolve::Resolver;
use crate::store::ProfileStore;
use crate::synth::{synthesize_with, SynthOptions};

/// Knobs for one composition.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// `run` used when no profile sets one.
    pub default_run: Vec<String>,

    /// Replaces the merged `run` when given (`--command`).
    pub run_override: Option<Vec<String>>,

    pub expand_paths: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            default_run: DEFAULT_RUN.iter().map(|s| s.to_string()).collect(),
            run_override: None,
            expand_paths: true,
        }
    }
}

impl ComposeOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_run: settings.default_run.clone(),
            run_override: None,
            expand_paths: settings.expand_paths,
        }
    }
}

/// A profile file that contributed to a composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
}

/// Everything produced by one composition.
#[derive(Debug, Clone, Serialize)]
pub struct Composition {
    /// Requested profile names, in order.
    pub profiles: Vec<String>,

    /// The merged, normalized profile with `run` filled in.
    pub profile: Profile,

    /// bwrap arguments, program excluded.
    pub argv: Vec<String>,

    /// Every file read, in first-load order.
    pub sources: Vec<Source>,

    pub conflicts: Vec<Conflict>,
}

/// Resolve and merge `names` without defaulting `run`.
///
/// Returns the resolved top-level profiles alongside the merged result.
pub fn resolve_all(
    store: &ProfileStore,
    names: &[String],
) -> Result<(Vec<Profile>, Profile, Vec<Source>), ProfileError> {
    let mut resolver = Resolver::new(store);
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        resolved.push(resolver.resolve(name)?);
    }
    let merged = merge(&resolved);

    let sources = resolver
        .loaded()
        .iter()
        .map(|loaded| Source {
            name: loaded.name.clone(),
            path: loaded.path.clone(),
            sha256: loaded.digest.clone(),
        })
        .collect();

    Ok((resolved, merged, sources))
}

/// Compose `names` into a single bwrap invocation.
pub fn compose(
    store: &ProfileStore,
    names: &[String],
    options: &ComposeOptions,
) -> Result<Composition, ProfileError> {
    let (inputs, mut profile, sources) = resolve_all(store, names)?;

    let conflicts = detect_conflicts(&inputs, &profile);
    for conflict in &conflicts {
        warn!("{}", conflict);
    }

    finish_run(&mut profile, options);
    let argv = synthesize_with(
        &profile,
        &SynthOptions {
            expand_paths: options.expand_paths,
        },
    );
    debug!(profiles = ?names, tokens = argv.len(), "composition complete");

    Ok(Composition {
        profiles: names.to_vec(),
        profile,
        argv,
        sources,
        conflicts,
    })
}

/// Turn a parsed bwrap command line into a normalized profile.
pub fn profile_from_command(parsed: &ParsedCommand) -> Profile {
    let own = Profile {
        mounts: parsed
            .binds
            .iter()
            .map(|b| {
                let mode = if b.read_only {
                    MountMode::ReadOnly
                } else {
                    MountMode::ReadWrite
                };
                Mount::new(b.source.clone(), b.dest.clone(), mode)
            })
            .collect(),
        env: parsed.env.iter().cloned().collect(),
        args: parsed.args.clone(),
        run: parsed.run.clone().and_then(command_or_none),
        ..Default::default()
    };
    merge(&[own])
}

/// Merge existing bwrap command lines as if each were a profile.
///
/// Paths are taken exactly as they appear on the command lines.
pub fn compose_commands(
    commands: &[String],
    options: &ComposeOptions,
) -> Result<Composition, ParseError> {
    let mut inputs = Vec::with_capacity(commands.len());
    for line in commands {
        inputs.push(profile_from_command(&parse_command(line)?));
    }
    let mut profile = merge(&inputs);

    let conflicts = detect_conflicts(&inputs, &profile);
    for conflict in &conflicts {
        warn!("{}", conflict);
    }

    finish_run(&mut profile, options);
    let argv = synthesize_with(&profile, &SynthOptions { expand_paths: false });

    Ok(Composition {
        profiles: commands.to_vec(),
        profile,
        argv,
        sources: Vec::new(),
        conflicts,
    })
}

/// Apply the command override, then the default when nothing set `run`.
pub fn finish_run(profile: &mut Profile, options: &ComposeOptions) {
    if let Some(command) = options.run_override.as_ref().filter(|c| !c.is_empty()) {
        profile.run = Some(command.clone());
    }
    if profile.run.is_none() && !options.default_run.is_empty() {
        profile.run = Some(options.default_run.clone());
    }
}
