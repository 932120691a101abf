//! Command line argument parsing.
//!
//! Subcommands:
//! - `run`: execute a task from the runfile
//! - `list`: list registered tasks
//! - `plan`: show the execution plan for a task
//! - `check`: parse and validate the runfile without executing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "drover")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A semantic task runner: near-English task definitions with dependencies, parameters, and hooks")]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute a task with its dependencies
    Run {
        /// Task name to execute
        task: String,
        /// Runfile path (default: tasks.drv, or drover.toml setting)
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,
        /// Task parameters as key=value (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Announce side effects without performing them
        #[arg(short = 'n', long = "dry-run")]
        dry_run: bool,
        /// Treat unknown {placeholders} as errors
        #[arg(long = "strict")]
        strict: bool,
        /// Enable verbose logging
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// List tasks defined in the runfile
    List {
        /// Runfile path
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,
    },
    /// Show the execution plan for a task
    Plan {
        /// Task name to plan
        task: String,
        /// Runfile path
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,
        /// Print the plan as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Parse and validate the runfile without executing anything
    Check {
        /// Runfile path
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,
    },
}

/// Split one `--set key=value` argument.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid parameter `{raw}`, expected key=value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_param("msg=a=b").unwrap(),
            ("msg".to_string(), "a=b".to_string())
        );
        assert!(parse_param("no-equals").is_err());
        assert!(parse_param("=value").is_err());
    }

    #[test]
    fn test_args_parse_run() {
        let args = Args::try_parse_from([
            "drover", "run", "deploy", "--set", "env=prod", "--dry-run",
        ])
        .unwrap();
        match args.command {
            Commands::Run {
                task,
                params,
                dry_run,
                ..
            } => {
                assert_eq!(task, "deploy");
                assert_eq!(params, vec!["env=prod"]);
                assert!(dry_run);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }
}
