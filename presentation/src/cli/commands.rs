//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Text,
    /// JSON output
    Json,
}

/// CLI arguments for conductor
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version, about = "Route tool calls across multiple tool servers")]
#[command(long_about = r#"
Conductor connects to the tool servers listed in its configuration,
merges their tools into one namespace and runs tool calls through a
permission gate.

Tools with the same name on several servers are exposed as
<server>__<tool>; unique names are exposed as-is.

Configuration files are loaded from (in priority order):
1. --config <path>                   Explicit config file
2. ./conductor.toml                  Project-level config
3. ~/.config/conductor/config.toml   Global config

Example:
  conductor tools
  conductor call fs__read '{"path": "README.md"}'
  conductor permissions forget fs/write
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Write logs to daily-rotated files in this directory
    #[arg(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Append tool call updates to this JSONL file
    #[arg(long, value_name = "PATH", global = true)]
    pub updates_log: Option<PathBuf>,

    /// Answer every permission prompt with "allow once"
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the merged tool catalog
    Tools {
        /// Drop cached listings and ask every server again
        #[arg(long)]
        refresh: bool,
    },

    /// Connect to every server and show its state
    Status,

    /// Call one tool
    Call {
        /// Exposed tool name (bare or <server>__<tool>)
        name: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,

        /// Deadline in seconds (defaults to calls.timeout_seconds)
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },

    /// Manage remembered permission decisions
    Permissions {
        #[command(subcommand)]
        action: PermissionsCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PermissionsCommand {
    /// Show remembered decisions
    List,
    /// Forget the decision for <server>/<tool>
    Forget { key: String },
    /// Forget every decision
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call() {
        let cli = Cli::parse_from([
            "conductor",
            "-vv",
            "call",
            "A__echo",
            r#"{"text":"hi"}"#,
            "--timeout",
            "5",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.command,
            Some(Command::Call {
                name: "A__echo".into(),
                args: r#"{"text":"hi"}"#.into(),
                timeout: Some(5),
            })
        );
    }

    #[test]
    fn test_call_args_default_to_empty_object() {
        let cli = Cli::parse_from(["conductor", "call", "shout"]);
        match cli.command {
            Some(Command::Call { args, timeout, .. }) => {
                assert_eq!(args, "{}");
                assert!(timeout.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_permissions_forget() {
        let cli = Cli::parse_from(["conductor", "--no-config", "permissions", "forget", "fs/write"]);
        assert!(cli.no_config);
        assert_eq!(
            cli.command,
            Some(Command::Permissions {
                action: PermissionsCommand::Forget {
                    key: "fs/write".into()
                }
            })
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["conductor", "tools", "--refresh", "-o", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.command, Some(Command::Tools { refresh: true }));
    }
}
