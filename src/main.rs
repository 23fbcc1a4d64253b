//! bwrap-compose CLI
//!
//! Entry point for the `bwrap-compose` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bwrap_compose::compose::{compose, compose_commands, resolve_all, ComposeOptions, Composition};
use bwrap_compose::conflicts::{detect_conflicts, has_errors, Conflict};
use bwrap_compose::exec;
use bwrap_compose::manifest::manifest_from_binary;
use bwrap_compose::profile::{display_dirs, validate_file};
use bwrap_compose::{CliOverrides, ProfileStore, Settings};

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "BWRAP_COMPOSE_LOG";

/// Exit code for profile and settings errors.
const EXIT_PROFILE_ERROR: i32 = 2;

/// Exit code for validation failures and other runtime errors.
const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "bwrap-compose")]
#[command(about = "Compose bubblewrap profiles into a single bwrap command", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to settings file (default: ~/.config/bwrap-compose/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra profile directory, searched before configured ones (repeatable)
    #[arg(long = "config-dir", global = true)]
    config_dirs: Vec<PathBuf>,

    /// bwrap program to invoke
    #[arg(long, global = true)]
    bwrap: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OutputArgs {
    /// Print the command instead of running it (the default)
    #[arg(long, conflicts_with = "run")]
    dry_run: bool,

    /// Execute the command
    #[arg(long)]
    run: bool,

    /// Command to run inside the sandbox, overriding the profiles' `run`
    #[arg(long)]
    command: Option<String>,

    /// Write a launcher shell script to this path
    #[arg(long, short = 'o')]
    output_script: Option<PathBuf>,

    /// Print the composition report as JSON instead of a command line
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine one or more profiles into a single bwrap command
    Combine {
        /// Profile names or file paths
        #[arg(required = true)]
        profiles: Vec<String>,

        #[command(flatten)]
        output: OutputArgs,

        /// Fail when an error-level conflict is detected
        #[arg(long)]
        strict: bool,
    },

    /// Merge existing bwrap command lines into one
    MergeCommands {
        /// Quoted bwrap command lines
        #[arg(num_args = 2.., required = true)]
        commands: Vec<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print a profile with its inheritance applied
    Show {
        /// Profile name or file path
        profile: String,
    },

    /// Check profile files for schema problems
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List profiles found on the search path
    ListProfiles {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Report conflicts between profiles
    Conflicts {
        #[arg(required = true)]
        profiles: Vec<String>,
    },

    /// Generate a profile for a binary from its shared-library dependencies
    FromBinary {
        /// Binary name or path
        binary: String,

        /// Description for the generated profile
        #[arg(long, short = 'd')]
        description: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match &cli.command {
        Commands::Combine {
            profiles,
            output,
            strict,
        } => run_combine(&cli, profiles, output, *strict),
        Commands::MergeCommands { commands, output } => run_merge_commands(&cli, commands, output),
        Commands::Show { profile } => run_show(&cli, profile),
        Commands::Validate { files } => run_validate(files),
        Commands::ListProfiles { json } => run_list_profiles(&cli, *json),
        Commands::Conflicts { profiles } => run_conflicts(&cli, profiles),
        Commands::FromBinary {
            binary,
            description,
        } => run_from_binary(binary, description.as_deref()),
    };

    process::exit(code);
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_settings(cli: &Cli) -> Result<Settings, i32> {
    let overrides = CliOverrides {
        config_dirs: cli.config_dirs.clone(),
        bwrap: cli.bwrap.clone(),
    };
    Settings::load(cli.config.as_deref(), &overrides).map_err(|e| {
        eprintln!("Configuration error: {}", e);
        EXIT_PROFILE_ERROR
    })
}

fn compose_options(settings: &Settings, output: &OutputArgs) -> Result<ComposeOptions, i32> {
    let mut options = ComposeOptions::from_settings(settings);
    if let Some(command) = &output.command {
        let words = shell_words::split(command).map_err(|e| {
            eprintln!("Invalid --command: {}", e);
            EXIT_FAILURE
        })?;
        options.run_override = Some(words);
    }
    Ok(options)
}

fn run_combine(cli: &Cli, profiles: &[String], output: &OutputArgs, strict: bool) -> i32 {
    let settings = match load_settings(cli) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let options = match compose_options(&settings, output) {
        Ok(o) => o,
        Err(code) => return code,
    };

    let store = ProfileStore::new(settings.search_path.clone());
    let composition = match compose(&store, profiles, &options) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_PROFILE_ERROR;
        }
    };

    if strict && has_errors(&composition.conflicts) {
        report_conflicts(&composition.conflicts);
        eprintln!("Refusing to compose: conflicts detected (--strict)");
        return EXIT_FAILURE;
    }

    emit(&settings, &composition, output)
}

fn run_merge_commands(cli: &Cli, commands: &[String], output: &OutputArgs) -> i32 {
    let settings = match load_settings(cli) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let options = match compose_options(&settings, output) {
        Ok(o) => o,
        Err(code) => return code,
    };

    match compose_commands(commands, &options) {
        Ok(composition) => emit(&settings, &composition, output),
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
    }
}

/// Print, write and/or execute a finished composition.
fn emit(settings: &Settings, composition: &Composition, output: &OutputArgs) -> i32 {
    if let Some(path) = &output.output_script {
        if let Err(e) = exec::write_script(path, &settings.bwrap, &composition.argv) {
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
        eprintln!("Wrote script to {}", path.display());
    }

    if output.run && !output.dry_run {
        return match exec::run(&settings.bwrap, &composition.argv) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_FAILURE
            }
        };
    }

    if output.json {
        match serde_json::to_string_pretty(composition) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                return EXIT_FAILURE;
            }
        }
    } else {
        println!("{}", exec::command_line(&settings.bwrap, &composition.argv));
    }
    0
}

fn run_show(cli: &Cli, profile: &str) -> i32 {
    let settings = match load_settings(cli) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let store = ProfileStore::new(settings.search_path);

    let resolved = match resolve_all(&store, &[profile.to_string()]) {
        Ok((_, merged, _)) => merged,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_PROFILE_ERROR;
        }
    };

    match serde_yaml::to_string(&resolved) {
        Ok(yaml) => {
            print!("{}", yaml);
            0
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            EXIT_FAILURE
        }
    }
}

fn run_validate(files: &[PathBuf]) -> i32 {
    let mut all_valid = true;

    for file in files {
        let report = validate_file(file);
        for warning in &report.warnings {
            println!("{}: warning: {}", file.display(), warning);
        }
        if report.is_valid() {
            println!("{}: ok", file.display());
        } else {
            all_valid = false;
            for error in &report.errors {
                println!("{}: error: {}", file.display(), error);
            }
        }
    }

    if all_valid {
        0
    } else {
        EXIT_FAILURE
    }
}

fn run_list_profiles(cli: &Cli, json: bool) -> i32 {
    let settings = match load_settings(cli) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let store = ProfileStore::new(settings.search_path);
    let entries = store.list();

    if json {
        match serde_json::to_string_pretty(&entries) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                return EXIT_FAILURE;
            }
        }
        return 0;
    }

    if entries.is_empty() {
        eprintln!("No profiles found (searched: {})", display_dirs(store.search_dirs()));
        return 0;
    }

    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    for entry in &entries {
        println!("{:<width$}  {}", entry.name, entry.path.display(), width = width);
    }
    0
}

fn run_conflicts(cli: &Cli, profiles: &[String]) -> i32 {
    let settings = match load_settings(cli) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let store = ProfileStore::new(settings.search_path);

    let (inputs, merged, _) = match resolve_all(&store, profiles) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_PROFILE_ERROR;
        }
    };

    let conflicts = detect_conflicts(&inputs, &merged);
    if conflicts.is_empty() {
        println!("No conflicts detected");
        return 0;
    }
    for conflict in &conflicts {
        println!("{}", conflict);
    }
    if has_errors(&conflicts) {
        EXIT_FAILURE
    } else {
        0
    }
}

fn run_from_binary(binary: &str, description: Option<&str>) -> i32 {
    let profile = match manifest_from_binary(binary, description) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
    };

    match serde_yaml::to_string(&profile) {
        Ok(yaml) => {
            print!("{}", yaml);
            0
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            EXIT_FAILURE
        }
    }
}

fn report_conflicts(conflicts: &[Conflict]) {
    for conflict in conflicts {
        eprintln!("{}", conflict);
    }
}
