//! CLI integration tests
//!
//! Run the built `bwrap-compose` binary and check its output and exit codes.
//! Nothing here executes bwrap; every composition is a dry run.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn sample_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("profiles")
}

/// Run the binary with an isolated settings file and no inherited search path.
fn bwrap_compose(settings_dir: &Path, args: &[&str]) -> Output {
    let settings = settings_dir.join("config.toml");
    if !settings.exists() {
        fs::write(&settings, "").unwrap();
    }
    Command::new(env!("CARGO_BIN_EXE_bwrap-compose"))
        .arg("--config")
        .arg(&settings)
        .args(args)
        .env_remove("BWRAP_COMPOSE_PATH")
        .env_remove("BWRAP_COMPOSE_LOG")
        .output()
        .expect("failed to run bwrap-compose")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn profile_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (file, contents) in files {
        fs::write(dir.path().join(file), contents).unwrap();
    }
    dir
}

// =============================================================================
// combine
// =============================================================================

#[test]
fn test_combine_dry_run_prints_command() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[
        ("first.yaml", "env: {TOKEN: x}\nmounts:\n  - {host: /a, container: /a, mode: ro}\n"),
        ("second.yaml", "env: {UV: '1'}\nrun: [uv, sync]\n"),
    ]);
    let dir = profiles.path().to_str().unwrap();

    let output = bwrap_compose(
        settings.path(),
        &["combine", "first", "second", "--config-dir", dir, "--dry-run"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "bwrap --ro-bind /a /a --setenv TOKEN x --setenv UV 1 -- uv sync\n"
    );
}

#[test]
fn test_combine_default_run_and_bwrap_override() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[("p.yaml", "args: [--unshare-pid]\n")]);
    let dir = profiles.path().to_str().unwrap();

    let output = bwrap_compose(
        settings.path(),
        &["--bwrap", "/opt/bwrap", "combine", "p", "--config-dir", dir],
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "/opt/bwrap --unshare-pid -- uv\n");
}

#[test]
fn test_combine_command_override() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[("p.yaml", "run: [uv, sync]\n")]);
    let dir = profiles.path().to_str().unwrap();

    let output = bwrap_compose(
        settings.path(),
        &["combine", "p", "--config-dir", dir, "--command", "sh -c 'echo hi'"],
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "bwrap -- sh -c 'echo hi'\n");
}

#[test]
fn test_combine_json_report() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[("p.yaml", "env: {A: '1'}\n")]);
    let dir = profiles.path().to_str().unwrap();

    let output = bwrap_compose(settings.path(), &["combine", "p", "--config-dir", dir, "--json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["profiles"][0], "p");
    assert_eq!(report["argv"][0], "--setenv");
    assert_eq!(report["profile"]["run"][0], "uv");
    assert_eq!(report["sources"][0]["sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn test_combine_writes_script() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[("p.yaml", "run: [/bin/true]\n")]);
    let dir = profiles.path().to_str().unwrap();
    let script = settings.path().join("launch.sh");

    let output = bwrap_compose(
        settings.path(),
        &["combine", "p", "--config-dir", dir, "--output-script", script.to_str().unwrap()],
    );
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(&script).unwrap(),
        "#!/usr/bin/env sh\nexec bwrap -- /bin/true\n"
    );
}

#[test]
fn test_combine_sample_profiles() {
    let settings = TempDir::new().unwrap();
    let dir = sample_dir();
    let output = bwrap_compose(
        settings.path(),
        &["combine", "github-copilot", "python-uv", "--config-dir", dir.to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let line = stdout(&output);
    assert!(line.starts_with("bwrap --ro-bind /usr /usr"));
    assert!(line.trim_end().ends_with("-- uv sync"));
}

#[test]
fn test_combine_missing_profile_exit_2() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[]);
    let dir = profiles.path().to_str().unwrap();

    let output = bwrap_compose(settings.path(), &["combine", "nope", "--config-dir", dir]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("Profile 'nope' not found"));
}

#[test]
fn test_combine_cycle_exit_2() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[("a.yaml", "extends: b\n"), ("b.yaml", "extends: a\n")]);
    let dir = profiles.path().to_str().unwrap();

    let output = bwrap_compose(settings.path(), &["combine", "a", "--config-dir", dir]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("a -> b -> a"));
}

#[test]
fn test_combine_strict_rejects_contradiction() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[
        ("isolated.yaml", "args: [--unshare-net]\n"),
        ("online.yaml", "args: [--share-net]\n"),
    ]);
    let dir = profiles.path().to_str().unwrap();

    let lenient = bwrap_compose(
        settings.path(),
        &["combine", "isolated", "online", "--config-dir", dir],
    );
    assert!(lenient.status.success());

    let strict = bwrap_compose(
        settings.path(),
        &["combine", "isolated", "online", "--config-dir", dir, "--strict"],
    );
    assert_eq!(strict.status.code(), Some(1));
    assert!(stdout(&strict).is_empty());
    assert!(stderr(&strict).contains("ns-contradiction"));
}

#[test]
fn test_bad_settings_file_exit_2() {
    let settings = TempDir::new().unwrap();
    fs::write(settings.path().join("config.toml"), "default_run = []\n").unwrap();

    let output = bwrap_compose(settings.path(), &["list-profiles"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("default_run"));
}

#[test]
fn test_settings_profile_dirs_used() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[("from-settings.yaml", "run: [/bin/true]\n")]);
    fs::write(
        settings.path().join("config.toml"),
        format!("profile_dirs = [{:?}]\n", profiles.path().to_str().unwrap()),
    )
    .unwrap();

    let output = bwrap_compose(settings.path(), &["combine", "from-settings"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "bwrap -- /bin/true\n");
}

// =============================================================================
// merge-commands
// =============================================================================

#[test]
fn test_merge_commands() {
    let settings = TempDir::new().unwrap();
    let output = bwrap_compose(
        settings.path(),
        &[
            "merge-commands",
            "bwrap --ro-bind /usr /usr --unshare-pid -- /bin/sh",
            "bwrap --ro-bind /etc /etc --unshare-pid --setenv A 1",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "bwrap --ro-bind /usr /usr --ro-bind /etc /etc --setenv A 1 --unshare-pid -- /bin/sh\n"
    );
}

// =============================================================================
// show / validate / list-profiles / conflicts
// =============================================================================

#[test]
fn test_show_resolved_profile() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[
        ("base.yaml", "env: {A: '1'}\n"),
        ("child.yaml", "extends: base\nenv: {B: '2'}\n"),
    ]);
    let dir = profiles.path().to_str().unwrap();

    let output = bwrap_compose(settings.path(), &["show", "child", "--config-dir", dir]);
    assert!(output.status.success());
    let shown: serde_json::Value = serde_yaml::from_str(&stdout(&output)).unwrap();
    assert_eq!(shown["env"]["A"], "1");
    assert_eq!(shown["env"]["B"], "2");
    assert!(shown.get("extends").is_none());
}

#[test]
fn test_validate_reports_errors() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[
        ("good.yaml", "mounts:\n  - {host: /a, container: /a}\n"),
        ("bad.yaml", "mounts: nope\nextra: 1\n"),
    ]);

    let good = profiles.path().join("good.yaml");
    let output = bwrap_compose(settings.path(), &["validate", good.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("ok"));

    let bad = profiles.path().join("bad.yaml");
    let output = bwrap_compose(
        settings.path(),
        &["validate", good.to_str().unwrap(), bad.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("'mounts' must be a list"));
    assert!(text.contains("extra"));
}

#[test]
fn test_list_profiles_first_dir_wins() {
    let settings = TempDir::new().unwrap();
    let first = profile_dir(&[("shared.yaml", "{}\n"), ("only-first.json", "{}")]);
    let second = profile_dir(&[("shared.yaml", "{}\n"), ("only-second.toml", "")]);

    let output = bwrap_compose(
        settings.path(),
        &[
            "list-profiles",
            "--json",
            "--config-dir",
            first.path().to_str().unwrap(),
            "--config-dir",
            second.path().to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    let entries: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let names: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["only-first", "only-second", "shared"]);
    let shared = PathBuf::from(entries[2]["path"].as_str().unwrap());
    assert!(shared.starts_with(first.path()));
}

#[test]
fn test_conflicts_subcommand() {
    let settings = TempDir::new().unwrap();
    let profiles = profile_dir(&[
        ("a.yaml", "env: {MODE: a}\n"),
        ("b.yaml", "env: {MODE: b}\n"),
        ("c.yaml", "env: {OTHER: c}\n"),
    ]);
    let dir = profiles.path().to_str().unwrap();

    let output = bwrap_compose(settings.path(), &["conflicts", "a", "b", "--config-dir", dir]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("warning [env-override]"));

    let output = bwrap_compose(settings.path(), &["conflicts", "a", "c", "--config-dir", dir]);
    assert_eq!(stdout(&output), "No conflicts detected\n");
}
