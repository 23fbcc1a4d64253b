//! Execution of a synthesized bwrap invocation
//!
//! The argument list never includes the program; it is prepended here.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, warn};

/// Execution errors
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write script {}: {source}", .path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The full invocation as one shell-quoted line.
pub fn command_line(program: &str, argv: &[String]) -> String {
    let mut words = Vec::with_capacity(argv.len() + 1);
    words.push(program);
    words.extend(argv.iter().map(String::as_str));
    shell_words::join(words)
}

/// Body of a standalone launcher script.
pub fn script_contents(program: &str, argv: &[String]) -> String {
    format!("#!/usr/bin/env sh\nexec {}\n", command_line(program, argv))
}

/// Write an executable launcher script to `path`.
pub fn write_script(path: &Path, program: &str, argv: &[String]) -> Result<(), ExecError> {
    let to_err = |source| ExecError::Script {
        path: path.to_path_buf(),
        source,
    };
    fs::write(path, script_contents(program, argv)).map_err(to_err)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(to_err)?;
    debug!(path = %path.display(), "wrote launcher script");
    Ok(())
}

/// Run `program argv...` with inherited stdio and return its exit code.
///
/// While the child runs, SIGINT and SIGTERM are ignored by this process so
/// that the terminal's signal reaches the sandbox and its exit status is
/// what gets reported.
pub fn run(program: &str, argv: &[String]) -> Result<i32, ExecError> {
    if let Err(e) = ctrlc::set_handler(|| {}) {
        warn!("could not install signal handler: {}", e);
    }

    debug!(program, args = argv.len(), "spawning sandbox");
    let mut child = Command::new(program)
        .args(argv)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let status = child.wait().map_err(|source| ExecError::Wait {
        program: program.to_string(),
        source,
    })?;
    Ok(exit_code(status))
}

/// Exit code to propagate for a finished child; `128 + signal` when killed.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}
