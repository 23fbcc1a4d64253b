//! Home-directory and environment-variable expansion for host paths.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex_lite::{Captures, Regex};

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("variable pattern is a valid regex")
    })
}

/// Expand `path` against the process environment and home directory.
pub fn expand_path(path: &str) -> String {
    expand_path_with(path, |name| std::env::var(name).ok(), dirs::home_dir())
}

/// Expand `path` using the given variable lookup and home directory.
///
/// - `'...'` is returned literally, quotes stripped
/// - a leading `~` or `~/` becomes the home directory
/// - `$VAR` and `${VAR}` are substituted; unknown variables stay as written
pub fn expand_path_with<F>(path: &str, lookup: F, home: Option<PathBuf>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if path.len() >= 2 && path.starts_with('\'') && path.ends_with('\'') {
        return path[1..path.len() - 1].to_string();
    }

    let tilde_expanded = match home {
        Some(home) if path == "~" => home.to_string_lossy().into_owned(),
        Some(home) if path.starts_with("~/") => {
            format!("{}{}", home.to_string_lossy(), &path[1..])
        }
        _ => path.to_string(),
    };

    var_pattern()
        .replace_all(&tilde_expanded, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(path: &str) -> String {
        let lookup = |name: &str| match name {
            "HOME" => Some("/home/test".to_string()),
            "APP_DIR" => Some("/opt/app".to_string()),
            _ => None,
        };
        expand_path_with(path, lookup, Some(PathBuf::from("/home/test")))
    }

    #[test]
    fn test_tilde_expanded() {
        assert_eq!(expand("~/Documents"), "/home/test/Documents");
        assert_eq!(expand("~"), "/home/test");
    }

    #[test]
    fn test_tilde_inside_path_untouched() {
        assert_eq!(expand("/srv/~user"), "/srv/~user");
    }

    #[test]
    fn test_env_var_expanded() {
        assert_eq!(expand("$APP_DIR/lib"), "/opt/app/lib");
        assert_eq!(expand("${HOME}/.config"), "/home/test/.config");
    }

    #[test]
    fn test_unknown_var_left_verbatim() {
        assert_eq!(expand("$NOPE/x"), "$NOPE/x");
    }

    #[test]
    fn test_single_quoted_not_expanded() {
        assert_eq!(expand("'$HOME/.config'"), "$HOME/.config");
        assert_eq!(expand("'~/Documents'"), "~/Documents");
    }

    #[test]
    fn test_plain_and_degenerate_paths() {
        assert_eq!(expand("/usr/bin"), "/usr/bin");
        assert_eq!(expand(""), "");
        assert_eq!(expand("'"), "'");
    }
}
