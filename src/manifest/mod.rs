//! Profile generation from a binary's shared-library dependencies
//!
//! Runs `ldd` on the binary and produces a minimal profile: an empty tmpfs
//! root, read-only binds for the binary and every library it links, the
//! directories those files live in, and symlinks where the loader expects a
//! library at a different path than where it resolved.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::profile::{Mount, MountMode, OneOrMany, RawProfile};

/// Namespace flags every generated profile carries.
pub const ISOLATION_ARGS: &[&str] = &["--unshare-all", "--die-with-parent", "--new-session"];

/// Manifest generation errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Failed to run ldd: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ldd failed: {0}")]
    Ldd(String),
}

/// Libraries found in `ldd` output, plus `(resolved, expected)` pairs where
/// the loader looks for a library under a different absolute path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LddReport {
    pub libs: Vec<String>,
    pub symlinks: Vec<(String, String)>,
}

/// Parse `ldd` output, keeping only entries whose file passes `exists`.
pub fn parse_ldd_output<F>(output: &str, exists: F) -> LddReport
where
    F: Fn(&str) -> bool,
{
    let mut report = LddReport::default();

    for line in output.lines().map(str::trim) {
        if line.is_empty() || line.contains("linux-vdso") {
            continue;
        }

        if let Some((expected, rest)) = line.split_once("=>") {
            let expected = expected.trim();
            let resolved = strip_load_address(rest);
            if resolved.is_empty() || !exists(resolved) {
                continue;
            }
            report.libs.push(resolved.to_string());
            if expected.starts_with('/') && expected != resolved {
                report
                    .symlinks
                    .push((resolved.to_string(), expected.to_string()));
            }
        } else if line.starts_with('/') {
            let path = strip_load_address(line);
            if !path.is_empty() && exists(path) {
                report.libs.push(path.to_string());
            }
        }
    }

    report
}

fn strip_load_address(s: &str) -> &str {
    s.split('(').next().unwrap_or_default().trim()
}

/// Every ancestor directory of `paths`, sorted, excluding `/`.
pub fn collect_dirs<S: AsRef<str>>(paths: &[S]) -> Vec<String> {
    let mut dirs = BTreeSet::new();
    for path in paths {
        let mut current = Path::new(path.as_ref()).parent();
        while let Some(dir) = current {
            if dir == Path::new("/") || dir.as_os_str().is_empty() {
                break;
            }
            dirs.insert(dir.to_string_lossy().into_owned());
            current = dir.parent();
        }
    }
    dirs.into_iter().collect()
}

/// Locate `binary` (on `PATH` for bare names) and canonicalize it.
pub fn locate_binary(binary: &str) -> Result<PathBuf, ManifestError> {
    let candidate = which::which(binary).unwrap_or_else(|_| PathBuf::from(binary));
    let resolved = fs::canonicalize(&candidate)
        .map_err(|_| ManifestError::BinaryNotFound(binary.to_string()))?;
    if !resolved.is_file() {
        return Err(ManifestError::BinaryNotFound(binary.to_string()));
    }
    Ok(resolved)
}

/// Build a profile that runs `binary` with only its own dependencies visible.
pub fn manifest_from_binary(
    binary: &str,
    description: Option<&str>,
) -> Result<RawProfile, ManifestError> {
    let binary_path = locate_binary(binary)?;
    let output = Command::new("ldd")
        .arg(&binary_path)
        .output()
        .map_err(ManifestError::Spawn)?;
    if !output.status.success() {
        return Err(ManifestError::Ldd(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let report = parse_ldd_output(&String::from_utf8_lossy(&output.stdout), |p| {
        Path::new(p).is_file()
    });
    debug!(
        binary = %binary_path.display(),
        libs = report.libs.len(),
        symlinks = report.symlinks.len(),
        "parsed ldd output"
    );

    let binary_path = binary_path.to_string_lossy().into_owned();
    Ok(build_manifest(&binary_path, &report, description, |p| {
        fs::canonicalize(p)
            .ok()
            .map(|real| real.to_string_lossy().into_owned())
    }))
}

/// Assemble the profile from parsed `ldd` data.
///
/// `realpath` resolves symlinks; a library that is a symlink gets its target
/// bound too.
pub fn build_manifest<F>(
    binary_path: &str,
    report: &LddReport,
    description: Option<&str>,
    realpath: F,
) -> RawProfile
where
    F: Fn(&str) -> Option<String>,
{
    let mut seen: Vec<String> = Vec::new();
    for file in std::iter::once(binary_path).chain(report.libs.iter().map(String::as_str)) {
        if seen.iter().any(|s| s == file) {
            continue;
        }
        seen.push(file.to_string());
        if let Some(real) = realpath(file) {
            if real != file && !seen.contains(&real) {
                seen.push(real);
            }
        }
    }

    let mounts = seen
        .iter()
        .map(|p| Mount::new(p.clone(), p.clone(), MountMode::ReadOnly))
        .collect();

    let mut dir_inputs = seen.clone();
    dir_inputs.extend(report.symlinks.iter().map(|(_, link)| link.clone()));

    let mut args: Vec<String> = ISOLATION_ARGS.iter().map(|s| s.to_string()).collect();
    for dir in collect_dirs(&dir_inputs) {
        args.push("--dir".to_string());
        args.push(dir);
    }
    for (target, link) in &report.symlinks {
        args.push("--symlink".to_string());
        args.push(target.clone());
        args.push(link.clone());
    }

    RawProfile {
        description: description.map(str::to_string),
        mounts,
        args,
        run: Some(OneOrMany::Many(vec![binary_path.to_string()])),
        tmpfs: Some(OneOrMany::One("/".to_string())),
        ..Default::default()
    }
}
