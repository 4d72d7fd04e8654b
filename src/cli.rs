//! CLI argument parsing and command dispatch

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use branch_sync::output::OutputConfig;

use crate::commands;

/// Branch Sync - switch many git working copies to the same branch
#[derive(Parser, Debug)]
#[command(name = "branch-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Path to a .branch-sync.yaml configuration file.
    ///
    /// Without this flag, `.branch-sync.yaml` in the current directory is used
    /// when present.
    #[arg(short, long, global = true, value_name = "FILE", env = "BRANCH_SYNC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Switch every discovered repository to a branch
    Sync(commands::sync::SyncArgs),

    /// Show the branch and upstream state of every repository
    Status(commands::status::StatusArgs),

    /// List the branches known across repositories
    Branches(commands::branches::BranchesArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<ExitCode> {
        init_logging(&self.log_level);
        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Sync(args) => {
                let ws = commands::Workspace::load(self.config.as_deref(), output)?;
                commands::sync::execute(&ws, args)
            }
            Commands::Status(args) => {
                let ws = commands::Workspace::load(self.config.as_deref(), output)?;
                commands::status::execute(&ws, args)
            }
            Commands::Branches(args) => {
                let ws = commands::Workspace::load(self.config.as_deref(), output)?;
                commands::branches::execute(&ws, args)
            }
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
