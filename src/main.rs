mod claude;
mod commands;
mod config;
mod error;
mod flags;
mod frontmatter;
mod prompt;
mod session;
mod storage;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::CreateOptions;

// =============================================================================
// ANSI Colors (shared across commands)
// =============================================================================

pub(crate) mod colors {
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";
    pub const RESET: &str = "\x1b[0m";
}

// =============================================================================
// CLI Interface
// =============================================================================

#[derive(Parser)]
#[command(
    name = "cc-fork",
    version,
    about = "Claude Code kickstart session manager"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Create a new base session
    #[command(alias = "new")]
    Create {
        /// Session name
        name: Option<String>,

        /// Enter Claude Code after sending prompt
        #[arg(short, long)]
        interactive: bool,

        /// Provide prompt inline (skip editor)
        #[arg(short, long)]
        prompt: Option<String>,

        /// Flags passed through to claude (--key value, --key=value, --key)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        passthrough: Vec<String>,
    },

    /// Fork from a base session for daily work
    Fork {
        name: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        passthrough: Vec<String>,
    },

    /// Resume a base session to add more context
    Use {
        name: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        passthrough: Vec<String>,
    },

    /// Recreate base session with current prompt
    #[command(alias = "rebuild")]
    Refresh {
        name: String,

        /// Enter Claude Code after sending prompt
        #[arg(short, long)]
        interactive: bool,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        passthrough: Vec<String>,
    },

    /// List all base sessions
    List,

    /// Delete one or more sessions
    Delete {
        #[arg(required = true)]
        names: Vec<String>,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Open session file in editor
    Edit { name: String },
}

/// Commands and aliases that a bare first argument must not shadow.
const KNOWN_COMMANDS: [&str; 10] = [
    "create", "new", "fork", "use", "refresh", "rebuild", "list", "delete", "edit", "help",
];

/// A first argument that is not a known command or an option is treated as
/// a session name for the configured default command, so `cc-fork my-api`
/// just works.
fn inject_default_command(mut argv: Vec<String>, default: &str) -> Vec<String> {
    if let Some(first) = argv.get(1) {
        if !first.starts_with('-') && !KNOWN_COMMANDS.contains(&first.as_str()) {
            argv.insert(1, default.to_string());
        }
    }
    argv
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn run() -> Result<()> {
    let base = std::env::current_dir()?;
    let project_config = config::read_project_config(&base)?;

    let argv = inject_default_command(
        std::env::args().collect(),
        project_config.default_command.as_str(),
    );
    let cli = Cli::parse_from(argv);

    match cli.command {
        CliCommand::Create {
            name,
            interactive,
            prompt,
            passthrough,
        } => commands::create(
            &base,
            &project_config,
            name,
            flags::parse_cli_args(&passthrough),
            CreateOptions {
                interactive: interactive.then_some(true),
                prompt,
            },
        ),
        CliCommand::Fork { name, passthrough } => commands::fork(
            &base,
            &project_config,
            &name,
            flags::parse_cli_args(&passthrough),
        ),
        CliCommand::Use { name, passthrough } => commands::use_session(
            &base,
            &project_config,
            &name,
            flags::parse_cli_args(&passthrough),
        ),
        CliCommand::Refresh {
            name,
            interactive,
            passthrough,
        } => commands::refresh(
            &base,
            &project_config,
            &name,
            flags::parse_cli_args(&passthrough),
            interactive.then_some(true),
        ),
        CliCommand::List => commands::list(&base, &project_config),
        CliCommand::Delete { names, force } => {
            commands::delete(&base, &project_config, &names, force)
        }
        CliCommand::Edit { name } => commands::edit(&base, &name),
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{}{err}{}", colors::RED, colors::RESET);
        if let Some(cc_err) = err.downcast_ref::<error::CcForkError>() {
            if let Some(stderr) = cc_err.stderr() {
                if !stderr.is_empty() {
                    eprintln!("{stderr}");
                }
            }
        }
        std::process::exit(1);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn bare_session_name_gets_default_command() {
        let result = inject_default_command(argv(&["cc-fork", "my-api"]), "fork");
        assert_eq!(result, argv(&["cc-fork", "fork", "my-api"]));
    }

    #[test]
    fn known_commands_are_left_alone() {
        for command in KNOWN_COMMANDS {
            let result = inject_default_command(argv(&["cc-fork", command]), "fork");
            assert_eq!(result, argv(&["cc-fork", command]), "{command}");
        }
    }

    #[test]
    fn options_are_left_alone() {
        let result = inject_default_command(argv(&["cc-fork", "--version"]), "fork");
        assert_eq!(result, argv(&["cc-fork", "--version"]));
    }

    #[test]
    fn no_arguments_is_left_alone() {
        let result = inject_default_command(argv(&["cc-fork"]), "fork");
        assert_eq!(result, argv(&["cc-fork"]));
    }

    #[test]
    fn configured_default_command_is_honored() {
        let result = inject_default_command(argv(&["cc-fork", "my-api", "--model", "opus"]), "use");
        assert_eq!(
            result,
            argv(&["cc-fork", "use", "my-api", "--model", "opus"])
        );
    }
}
