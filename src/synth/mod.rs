//! Command Synthesizer
//!
//! Turns a normalized profile into the ordered bwrap argument list:
//! binds, `--setenv` pairs, `--tmpfs`/`--dev`/`--proc`, literal args, `--`,
//! then the command. Each token is a discrete argument; nothing is joined
//! into a shell string here.

mod expand;

pub use expand::{expand_path, expand_path_with};

use crate::profile::Profile;

/// Separator between bwrap options and the sandboxed command.
pub const SEPARATOR: &str = "--";

/// Options for token synthesis.
#[derive(Debug, Clone, Copy)]
pub struct SynthOptions {
    /// Expand `~` and `$VAR` in mount and filesystem paths.
    pub expand_paths: bool,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self { expand_paths: true }
    }
}

/// Synthesize with paths passed through verbatim.
pub fn synthesize(profile: &Profile) -> Vec<String> {
    synthesize_with(profile, &SynthOptions { expand_paths: false })
}

/// Synthesize the bwrap argument list (program name excluded).
pub fn synthesize_with(profile: &Profile, options: &SynthOptions) -> Vec<String> {
    let path = |p: &str| {
        if options.expand_paths {
            expand_path(p)
        } else {
            p.to_string()
        }
    };

    let mut tokens = Vec::new();

    for mount in &profile.mounts {
        tokens.push(mount.mode.bind_flag().to_string());
        tokens.push(path(&mount.host));
        tokens.push(path(&mount.container));
    }

    for (key, value) in &profile.env {
        tokens.push("--setenv".to_string());
        tokens.push(key.clone());
        tokens.push(value.clone());
    }

    for (flag, paths) in [
        ("--tmpfs", &profile.tmpfs),
        ("--dev", &profile.dev),
        ("--proc", &profile.proc),
    ] {
        for p in paths {
            tokens.push(flag.to_string());
            tokens.push(path(p));
        }
    }

    tokens.extend(profile.args.iter().cloned());

    tokens.push(SEPARATOR.to_string());
    if let Some(run) = &profile.run {
        tokens.extend(run.iter().cloned());
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Mount, MountMode};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_token_order() {
        let profile = Profile {
            mounts: vec![
                Mount::new("/usr", "/usr", MountMode::ReadOnly),
                Mount::new("/work", "/work", MountMode::ReadWrite),
            ],
            env: [("A".to_string(), "1".to_string())].into_iter().collect(),
            args: strings(&["--unshare-pid"]),
            run: Some(strings(&["/bin/echo", "hello"])),
            tmpfs: strings(&["/tmp"]),
            dev: strings(&["/dev"]),
            proc: strings(&["/proc"]),
            description: None,
        };
        assert_eq!(
            synthesize(&profile),
            strings(&[
                "--ro-bind", "/usr", "/usr",
                "--bind", "/work", "/work",
                "--setenv", "A", "1",
                "--tmpfs", "/tmp",
                "--dev", "/dev",
                "--proc", "/proc",
                "--unshare-pid",
                "--",
                "/bin/echo", "hello",
            ])
        );
    }

    #[test]
    fn test_run_tokens_verbatim() {
        let profile = Profile {
            run: Some(strings(&["sh", "-c", "echo $HOME; ls"])),
            ..Default::default()
        };
        let tokens = synthesize_with(&profile, &SynthOptions::default());
        assert_eq!(tokens, strings(&["--", "sh", "-c", "echo $HOME; ls"]));
    }

    #[test]
    fn test_literal_args_not_expanded() {
        let profile = Profile {
            args: strings(&["--chdir", "~/work"]),
            ..Default::default()
        };
        let tokens = synthesize_with(&profile, &SynthOptions::default());
        assert_eq!(tokens[1], "~/work");
    }

    #[test]
    fn test_single_quoted_mount_kept_literal() {
        let profile = Profile {
            mounts: vec![Mount::new("'$HOME/data'", "/data", MountMode::ReadWrite)],
            ..Default::default()
        };
        let tokens = synthesize_with(&profile, &SynthOptions::default());
        assert_eq!(tokens[..3], strings(&["--bind", "$HOME/data", "/data"])[..]);
    }

    #[test]
    fn test_without_expansion_paths_verbatim() {
        let profile = Profile {
            mounts: vec![Mount::new("~/.config", "~/.config", MountMode::ReadOnly)],
            ..Default::default()
        };
        assert_eq!(synthesize(&profile)[1], "~/.config");
    }
}
