//! yb - timestamped backups to Yandex Disk
//!
//! Archives or mirrors local paths to a remote directory and keeps only the
//! most recent copies of each.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ya_backup::commands::{self, Cli};
use ya_backup::exit_code::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = tokio::select! {
        code = commands::execute(cli) => code,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted");
            ExitCode::Interrupted
        }
    };

    std::process::exit(exit_code.as_i32());
}
