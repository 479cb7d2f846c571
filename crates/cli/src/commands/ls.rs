//! ls command - List remote backups
//!
//! Lists the children of a remote directory, most recently modified first.
//! Without a path the configured remote root is listed.

use clap::Args;
use serde::Serialize;
use yb_core::{RemoteFs, ResourceInfo, SortKey, path};

use super::RemoteArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List remote backups
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Remote directory (defaults to the configured root)
    pub path: Option<String>,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    path: String,
    items: Vec<ResourceInfo>,
    total_size_bytes: u64,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, remote: &RemoteArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let config = match remote.load_config() {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
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

    let dir = path::join(&[args.path.as_deref().unwrap_or(&config.remote.root)]);
    let fs = RemoteFs::new(&client);

    match fs.is_dir(&dir).await {
        Ok(true) => {}
        Ok(false) => {
            formatter.error(&format!("Directory not found: {dir}"));
            return ExitCode::NotFound;
        }
        Err(e) => {
            formatter.error(&format!("Failed to look up {dir}: {e}"));
            return ExitCode::from(&e);
        }
    }

    let items = match fs.list_children(&dir, Some(SortKey::newest_first())).await {
        Ok(items) => items,
        Err(e) => {
            formatter.error(&format!("Failed to list {dir}: {e}"));
            return ExitCode::from(&e);
        }
    };
    let total_size: u64 = items.iter().filter_map(|i| i.size_bytes).sum();

    if formatter.is_json() {
        formatter.json(&LsOutput {
            path: dir,
            items,
            total_size_bytes: total_size,
        });
    } else {
        for item in &items {
            formatter.println(&format_item(item));
        }
        formatter.println(&format!(
            "\nTotal: {} entries, {}",
            items.len(),
            humansize::format_size(total_size, humansize::BINARY)
        ));
    }
    ExitCode::Success
}

/// One listing line: `[date] size name`
fn format_item(item: &ResourceInfo) -> String {
    let date = item
        .modified
        .map(|d| d.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19));
    if item.is_dir() {
        format!("[{date}] {:>10} {}/", "0B", item.name)
    } else {
        let size = item.size_human.clone().unwrap_or_else(|| "0B".to_string());
        format!("[{date}] {size:>10} {}", item.name)
    }
}
