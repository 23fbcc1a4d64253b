//! bwrap-compose - Compose named sandbox profiles into one bwrap invocation
//!
//! Profiles are loaded from a search path, their `extends` chains are
//! resolved, the results are merged in the order requested, and the merged
//! profile is turned into a bubblewrap argument list.

pub mod compose;
pub mod config;
pub mod conflicts;
pub mod exec;
pub mod manifest;
pub mod merge;
pub mod profile;
pub mod resolve;
pub mod store;
pub mod synth;

pub use compose::{compose, ComposeOptions, Composition};
pub use config::{CliOverrides, Settings, SettingsError};
pub use conflicts::{detect_conflicts, Conflict, ConflictKind, Severity};
pub use merge::merge;
pub use profile::{Mount, MountMode, Profile, ProfileError, RawProfile};
pub use resolve::Resolver;
pub use store::ProfileStore;
pub use synth::{synthesize, synthesize_with, SynthOptions};
