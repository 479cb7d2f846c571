//! CLI command definitions and execution
//!
//! This module contains all CLI commands and their implementations, plus the
//! configuration and client setup they share.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use yb_core::{Config, ConfigManager, Error, Result};
use yb_disk::DiskClient;

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

mod completions;
mod init;
mod ls;
mod prune;
mod run;

/// yb - timestamped backups to Yandex Disk
///
/// Copies local files and directory trees to Yandex Disk, names each copy
/// with a date stamp and deletes the oldest copies beyond a retention count.
#[derive(Parser, Debug)]
#[command(name = "yb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the configuration comes from and how to reach the remote
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Configuration file (.toml, or a legacy .yml backup list)
    #[arg(long, global = true, env = "YB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Yandex Disk OAuth token
    #[arg(long, global = true, env = "YB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Remote root directory, overrides the configuration file
    #[arg(long, global = true, env = "YB_REMOTE_DIR")]
    pub remote_dir: Option<String>,

    /// Name prefix for every backup, overrides the configuration file
    #[arg(long, global = true, env = "YB_PREFIX")]
    pub prefix: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prune old backups and back up every configured target
    Run(run::RunArgs),

    /// Delete old backups of one target without backing it up
    Prune(prune::PruneArgs),

    /// List remote backups, newest first
    Ls(ls::LsArgs),

    /// Write a starter configuration file
    Init(init::InitArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Run(args) => run::execute(args, &cli.remote, output_config).await,
        Commands::Prune(args) => prune::execute(args, &cli.remote, output_config).await,
        Commands::Ls(args) => ls::execute(args, &cli.remote, output_config).await,
        Commands::Init(args) => init::execute(args, &cli.remote, output_config),
        Commands::Completions(args) => completions::execute(args),
    }
}

impl RemoteArgs {
    /// Configuration manager for `--config` or the default location
    pub fn config_manager(&self) -> Result<ConfigManager> {
        match &self.config {
            Some(path) => Ok(ConfigManager::with_path(path.clone())),
            None => ConfigManager::new(),
        }
    }

    /// Load the configuration and apply command-line overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = self.config_manager()?.load()?;
        config.apply_overrides(self.remote_dir.clone(), self.prefix.clone());
        Ok(config)
    }

    /// Build the Yandex Disk client
    pub fn connect(&self, config: &Config) -> Result<DiskClient> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Error::Auth("no OAuth token, set YB_TOKEN or pass --token".into()))?;
        DiskClient::new(token, &config.timeout)
    }
}
