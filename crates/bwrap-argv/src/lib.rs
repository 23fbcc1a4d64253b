//! Bubblewrap argv vocabulary.
//!
//! Knows how many values each bwrap flag consumes, which lets callers treat
//! `--dir /a` or `--symlink a b` as one logical unit when de-duplicating, and
//! parses an existing `bwrap ...` command line back into structured parts.

mod parser;

pub use parser::{parse_command, parse_tokens, BindEntry, ParseError, ParsedCommand};

/// Bind flags (source, destination).
pub const BIND_FLAGS: &[&str] = &[
    "--bind",
    "--bind-try",
    "--dev-bind",
    "--dev-bind-try",
    "--ro-bind",
    "--ro-bind-try",
];

/// Flags that take exactly three values.
pub const THREE_VALUE_FLAGS: &[&str] = &["--overlay"];

/// Flags that take exactly two values (other than the bind flags).
pub const TWO_VALUE_FLAGS: &[&str] = &[
    "--setenv",
    "--symlink",
    "--chmod",
    "--file",
    "--bind-data",
    "--ro-bind-data",
    "--bind-fd",
    "--ro-bind-fd",
];

/// Flags that take exactly one value.
pub const ONE_VALUE_FLAGS: &[&str] = &[
    // filesystem
    "--tmpfs",
    "--dir",
    "--proc",
    "--dev",
    "--mqueue",
    "--remount-ro",
    "--overlay-src",
    "--tmp-overlay",
    "--ro-overlay",
    "--perms",
    "--size",
    "--lock-file",
    // process
    "--unsetenv",
    "--chdir",
    "--argv0",
    "--uid",
    "--gid",
    "--hostname",
    "--cap-add",
    "--cap-drop",
    "--exec-label",
    "--file-label",
    // namespaces
    "--userns",
    "--userns2",
    "--pidns",
    // file descriptors
    "--args",
    "--seccomp",
    "--add-seccomp-fd",
    "--sync-fd",
    "--info-fd",
    "--json-status-fd",
    "--block-fd",
    "--userns-block-fd",
];

/// Flags that take no value.
pub const ZERO_VALUE_FLAGS: &[&str] = &[
    "--unshare-user",
    "--unshare-user-try",
    "--unshare-ipc",
    "--unshare-pid",
    "--unshare-net",
    "--unshare-uts",
    "--unshare-cgroup",
    "--unshare-cgroup-try",
    "--unshare-all",
    "--share-net",
    "--disable-userns",
    "--assert-userns-disabled",
    "--die-with-parent",
    "--as-pid-1",
    "--new-session",
    "--clearenv",
    "--level-prefix",
];

/// Number of values a flag consumes, or `None` for tokens that are not a
/// known flag.
pub fn flag_arity(flag: &str) -> Option<usize> {
    if ZERO_VALUE_FLAGS.contains(&flag) {
        Some(0)
    } else if ONE_VALUE_FLAGS.contains(&flag) {
        Some(1)
    } else if TWO_VALUE_FLAGS.contains(&flag) || BIND_FLAGS.contains(&flag) {
        Some(2)
    } else if THREE_VALUE_FLAGS.contains(&flag) {
        Some(3)
    } else {
        None
    }
}

/// Split a flat argv into logical groups.
///
/// A known flag is grouped with the values it consumes. A flag whose values
/// are cut off by the end of the argv, and any unknown token, becomes a
/// group of its own.
pub fn group_args<S: AsRef<str>>(args: &[S]) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let token = args[i].as_ref();
        let width = match flag_arity(token) {
            Some(n) if n > 0 && i + n < args.len() => n + 1,
            _ => 1,
        };
        groups.push(
            args[i..i + width]
                .iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
        );
        i += width;
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_argv(s: &str) -> Vec<String> {
        s.split_whitespace().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_zero_value_flags_stand_alone() {
        let groups = group_args(&to_argv("--unshare-all --die-with-parent"));
        assert_eq!(
            groups,
            vec![vec!["--unshare-all"], vec!["--die-with-parent"]]
        );
    }

    #[test]
    fn test_one_value_flags_keep_their_value() {
        let groups = group_args(&to_argv("--dir /bin --dir /lib"));
        assert_eq!(groups, vec![vec!["--dir", "/bin"], vec!["--dir", "/lib"]]);
    }

    #[test]
    fn test_two_value_flags_grouped_as_triples() {
        let groups = group_args(&to_argv(
            "--symlink /a /b --dir /tmp --ro-bind /x /y",
        ));
        assert_eq!(
            groups,
            vec![
                vec!["--symlink", "/a", "/b"],
                vec!["--dir", "/tmp"],
                vec!["--ro-bind", "/x", "/y"],
            ]
        );
    }

    #[test]
    fn test_unknown_token_is_its_own_group() {
        let groups = group_args(&to_argv("--unknown-flag value"));
        assert_eq!(groups, vec![vec!["--unknown-flag"], vec!["value"]]);
    }

    #[test]
    fn test_truncated_flag_is_not_grouped() {
        let groups = group_args(&to_argv("--unshare-pid --chdir"));
        assert_eq!(groups, vec![vec!["--unshare-pid"], vec!["--chdir"]]);
    }

    #[test]
    fn test_flag_arity() {
        assert_eq!(flag_arity("--new-session"), Some(0));
        assert_eq!(flag_arity("--hostname"), Some(1));
        assert_eq!(flag_arity("--bind-try"), Some(2));
        assert_eq!(flag_arity("/usr/bin"), None);
    }

    #[test]
    fn test_flag_arity_covers_option_categories() {
        for flag in ["--cap-add", "--cap-drop", "--argv0", "--exec-label", "--file-label"] {
            assert_eq!(flag_arity(flag), Some(1), "{}", flag);
        }
        for flag in ["--userns", "--userns2", "--pidns"] {
            assert_eq!(flag_arity(flag), Some(1), "{}", flag);
        }
        for flag in [
            "--seccomp",
            "--add-seccomp-fd",
            "--sync-fd",
            "--info-fd",
            "--json-status-fd",
            "--block-fd",
            "--userns-block-fd",
        ] {
            assert_eq!(flag_arity(flag), Some(1), "{}", flag);
        }
        for flag in ["--overlay-src", "--tmp-overlay", "--ro-overlay", "--mqueue"] {
            assert_eq!(flag_arity(flag), Some(1), "{}", flag);
        }
        for flag in [
            "--chmod",
            "--bind-fd",
            "--ro-bind-fd",
            "--file",
            "--bind-data",
            "--ro-bind-data",
        ] {
            assert_eq!(flag_arity(flag), Some(2), "{}", flag);
        }
        assert_eq!(flag_arity("--overlay"), Some(3));
        assert_eq!(flag_arity("--disable-userns"), Some(0));
    }

    #[test]
    fn test_repeated_capability_flags_grouped() {
        let groups = group_args(&to_argv("--cap-add CAP_NET_RAW --cap-add CAP_SYS_ADMIN"));
        assert_eq!(
            groups,
            vec![vec!["--cap-add", "CAP_NET_RAW"], vec!["--cap-add", "CAP_SYS_ADMIN"]]
        );
    }

    #[test]
    fn test_overlay_grouped_with_three_values() {
        let groups = group_args(&to_argv(
            "--overlay-src /lower --overlay /rw /work /dest --chmod 0755 /dest",
        ));
        assert_eq!(
            groups,
            vec![
                vec!["--overlay-src", "/lower"],
                vec!["--overlay", "/rw", "/work", "/dest"],
                vec!["--chmod", "0755", "/dest"],
            ]
        );
    }
}
