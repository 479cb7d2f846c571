//! prune command - Delete old backups of one target
//!
//! Runs only the retention step for a configured target, leaving the newest
//! backups in place and uploading nothing.

use std::path::PathBuf;

use clap::Args;
use yb_core::{Error, Runner};

use super::RemoteArgs;
use super::run::resolver_for;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Prune old backups of a configured target
#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Local path of the target, as written in the configuration
    pub path: PathBuf,

    /// Number of backups to keep instead of the configured count
    #[arg(long)]
    pub retain: Option<usize>,
}

/// Execute the prune command
pub async fn execute(args: PruneArgs, remote: &RemoteArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let config = match remote.load_config() {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from(&e);
        }
    };

    let Some(mut target) = config.target(&args.path).cloned() else {
        let e = Error::InvalidPath(format!("{} is not a configured target", args.path.display()));
        formatter.error(&e.to_string());
        return ExitCode::from(&e);
    };
    if let Some(retain) = args.retain {
        target.retain = retain;
    }

    let resolver = match resolver_for(&config) {
        Ok(r) => r,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from(&e);
        }
    };
    let client = match remote.connect(&config) {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to create Yandex Disk client: {e}"));
            return ExitCode::from(&e);
        }
    };

    let runner = Runner::new(&client, resolver);
    match runner.prune(&target).await {
        Ok(report) => {
            formatter.prune_report(&report);
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to prune {}: {e}", target.path.display()));
            ExitCode::from(&e)
        }
    }
}
