//! run command - Prune and back up every configured target
//!
//! Targets are processed one after another. A failing target is reported and
//! the run moves on to the next one.

use std::path::PathBuf;

use clap::Args;
use jiff::Zoned;
use serde::Serialize;
use yb_core::{
    BackupTarget, Config, Error, PathResolver, RemoteRoot, Result, Runner, TargetOutcome,
    TargetPlan,
};

use super::RemoteArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Back up the configured targets
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Show what would be uploaded and deleted without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Only back up these configured paths
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RunOutput<'a> {
    stamp: &'a str,
    success: bool,
    targets: &'a [TargetOutcome],
}

#[derive(Debug, Serialize)]
struct PlanOutput<'a> {
    stamp: &'a str,
    targets: &'a [TargetPlan],
}

/// Execute the run command
pub async fn execute(args: RunArgs, remote: &RemoteArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let config = match remote.load_config() {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from(&e);
        }
    };

    let targets = match select_targets(&config, &args.paths) {
        Ok(t) => t,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from(&e);
        }
    };
    if targets.is_empty() {
        formatter.warning("No backup targets configured");
        return ExitCode::Success;
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
    if args.dry_run {
        return dry_run(&runner, &targets, &formatter).await;
    }

    tracing::info!(
        targets = targets.len(),
        stamp = runner.resolver().stamp(),
        "starting backup run"
    );
    let outcomes = runner.run(&targets).await;
    let success = outcomes.iter().all(TargetOutcome::is_success);

    if formatter.is_json() {
        formatter.json(&RunOutput {
            stamp: runner.resolver().stamp(),
            success,
            targets: &outcomes,
        });
    } else {
        for outcome in &outcomes {
            formatter.outcome(outcome);
        }
    }

    if success {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}

/// Resolver for today's date in the local time zone
pub(super) fn resolver_for(config: &Config) -> Result<PathResolver> {
    let root = RemoteRoot::new(&config.remote.root, config.remote.prefix.clone());
    PathResolver::new(root, &config.remote.date_format, &Zoned::now())
}

/// Configured targets, narrowed to `paths` when any are given
fn select_targets(config: &Config, paths: &[PathBuf]) -> Result<Vec<BackupTarget>> {
    if paths.is_empty() {
        return Ok(config.targets.clone());
    }
    paths
        .iter()
        .map(|path| {
            config.target(path).cloned().ok_or_else(|| {
                Error::InvalidPath(format!("{} is not a configured target", path.display()))
            })
        })
        .collect()
}

async fn dry_run(runner: &Runner<'_>, targets: &[BackupTarget], formatter: &Formatter) -> ExitCode {
    let plans = match runner.plan(targets).await {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&format!("Failed to plan backup: {e}"));
            return ExitCode::from(&e);
        }
    };

    if formatter.is_json() {
        formatter.json(&PlanOutput {
            stamp: runner.resolver().stamp(),
            targets: &plans,
        });
        return ExitCode::Success;
    }

    for plan in &plans {
        formatter.plan(plan);
    }
    ExitCode::Success
}
