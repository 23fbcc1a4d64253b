//! Application settings
//!
//! Settings are layered, lowest precedence first:
//! 1. Built-in defaults
//! 2. Settings file (`~/.config/bwrap-compose/config.toml`)
//! 3. Environment (`BWRAP_COMPOSE_PATH`)
//! 4. CLI flags

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable holding extra profile directories, colon-separated.
pub const PATH_ENV: &str = "BWRAP_COMPOSE_PATH";

/// Command run in the sandbox when no profile sets one.
pub const DEFAULT_RUN: &[&str] = &["uv"];

/// Sandbox tool invoked by default.
pub const DEFAULT_BWRAP: &str = "bwrap";

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Settings file contents. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    /// Sandbox tool program
    pub bwrap: Option<String>,

    /// Extra profile search directories
    #[serde(default)]
    pub profile_dirs: Vec<PathBuf>,

    /// Outermost default for `run`
    pub default_run: Option<Vec<String>>,

    /// Expand `~` and `$VAR` in mount paths
    pub expand_paths: Option<bool>,
}

impl SettingsFile {
    /// Load and parse a settings file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// `--config-dir`, in the order given
    pub config_dirs: Vec<PathBuf>,

    /// `--bwrap`
    pub bwrap: Option<String>,
}

/// Effective settings after layering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub bwrap: String,

    /// Full profile search path, highest priority first.
    pub search_path: Vec<PathBuf>,

    pub default_run: Vec<String>,

    pub expand_paths: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bwrap: DEFAULT_BWRAP.to_string(),
            search_path: Vec::new(),
            default_run: DEFAULT_RUN.iter().map(|s| s.to_string()).collect(),
            expand_paths: true,
        }
    }
}

impl Settings {
    /// Default settings file location.
    pub fn default_file() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bwrap-compose").join("config.toml"))
    }

    /// Per-user profile directory, searched last.
    pub fn user_profile_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bwrap-compose").join("profiles"))
    }

    /// Build settings from all layers.
    ///
    /// An explicitly given `settings_path` must exist; the default location
    /// is optional.
    pub fn load(settings_path: Option<&Path>, cli: &CliOverrides) -> Result<Self, SettingsError> {
        let file = match settings_path {
            Some(path) => Some(SettingsFile::from_file(path)?),
            None => match Self::default_file() {
                Some(path) if path.is_file() => Some(SettingsFile::from_file(&path)?),
                _ => None,
            },
        };

        let env_dirs: Vec<PathBuf> = std::env::var_os(PATH_ENV)
            .map(|v| std::env::split_paths(&v).filter(|p| !p.as_os_str().is_empty()).collect())
            .unwrap_or_default();

        let user_dir = Self::user_profile_dir().filter(|d| d.is_dir());

        Self::layer(file.unwrap_or_default(), env_dirs, cli, user_dir)
    }

    /// Combine layers without touching the filesystem or environment.
    pub fn layer(
        file: SettingsFile,
        env_dirs: Vec<PathBuf>,
        cli: &CliOverrides,
        user_dir: Option<PathBuf>,
    ) -> Result<Self, SettingsError> {
        let mut settings = Settings::default();

        if let Some(bwrap) = file.bwrap {
            settings.bwrap = bwrap;
        }
        if let Some(run) = file.default_run {
            settings.default_run = run;
        }
        if let Some(expand) = file.expand_paths {
            settings.expand_paths = expand;
        }
        if let Some(bwrap) = &cli.bwrap {
            settings.bwrap = bwrap.clone();
        }

        let ordered = cli
            .config_dirs
            .iter()
            .cloned()
            .chain(env_dirs)
            .chain(file.profile_dirs)
            .chain(user_dir);
        for dir in ordered {
            if !settings.search_path.contains(&dir) {
                settings.search_path.push(dir);
            }
        }

        settings.validate()?;
        debug!(search_path = ?settings.search_path, bwrap = %settings.bwrap, "settings resolved");
        Ok(settings)
    }

    /// Validate the effective values
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.bwrap.trim().is_empty() {
            return Err(SettingsError::Validation(
                "'bwrap' must not be empty".to_string(),
            ));
        }
        if self.default_run.is_empty() {
            return Err(SettingsError::Validation(
                "'default_run' must contain at least one element".to_string(),
            ));
        }
        Ok(())
    }
}
