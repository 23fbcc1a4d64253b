//! bwrap command-line parser.
//!
//! Parses an existing bubblewrap invocation back into binds, environment,
//! residual arguments and the trailing command.

use serde::{Deserialize, Serialize};

use crate::flag_arity;

/// Program names accepted (and skipped) as the first token.
const PROGRAM_NAMES: &[&str] = &["bwrap", "/usr/bin/bwrap", "/bin/bwrap"];

/// Bind flags recorded as [`BindEntry`]. The `-try` and `--dev-bind`
/// variants stay in `args` since a plain bind cannot express them.
const MOUNT_FLAGS: &[&str] = &["--bind", "--ro-bind"];

/// Errors from command-line parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to split command line: {0}")]
    Split(#[from] shell_words::ParseError),

    #[error("Empty command line")]
    Empty,
}

/// A bind flag occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindEntry {
    pub source: String,
    pub dest: String,
    pub read_only: bool,
}

/// Structured form of a bwrap command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// Bind mounts in the order they appeared.
    pub binds: Vec<BindEntry>,

    /// `--setenv` pairs; later assignments of the same key replace earlier ones.
    pub env: Vec<(String, String)>,

    /// Every other flag with its values, plus unknown tokens.
    pub args: Vec<String>,

    /// Tokens after `--`. None when the command line has no separator.
    pub run: Option<Vec<String>>,
}

impl ParsedCommand {
    fn set_env(&mut self, key: &str, value: &str) {
        match self.env.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.env.push((key.to_string(), value.to_string())),
        }
    }
}

/// Parse a bwrap command line given as a single shell-quoted string.
pub fn parse_command(line: &str) -> Result<ParsedCommand, ParseError> {
    let tokens = shell_words::split(line)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(parse_tokens(&tokens))
}

/// Parse an already tokenized bwrap argv.
///
/// A leading program name is skipped. Known flags consume their values;
/// a known flag without enough values left is kept as a raw token.
pub fn parse_tokens(tokens: &[String]) -> ParsedCommand {
    let mut parsed = ParsedCommand::default();

    let start = match tokens.first() {
        Some(first) if PROGRAM_NAMES.contains(&first.as_str()) => 1,
        _ => 0,
    };

    let mut i = start;
    while i < tokens.len() {
        let tok = tokens[i].as_str();

        if tok == "--" {
            parsed.run = Some(tokens[i + 1..].to_vec());
            break;
        }

        let arity = flag_arity(tok).unwrap_or(0);
        if i + arity >= tokens.len() {
            parsed.args.push(tok.to_string());
            i += 1;
            continue;
        }

        if MOUNT_FLAGS.contains(&tok) {
            parsed.binds.push(BindEntry {
                source: tokens[i + 1].clone(),
                dest: tokens[i + 2].clone(),
                read_only: tok == "--ro-bind",
            });
        } else if tok == "--setenv" {
            parsed.set_env(&tokens[i + 1], &tokens[i + 2]);
        } else {
            parsed
                .args
                .extend(tokens[i..=i + arity].iter().cloned());
        }
        i += arity + 1;
    }

    parsed
}
