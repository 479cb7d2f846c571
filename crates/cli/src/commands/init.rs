//! init command - Write a starter configuration file

use std::path::PathBuf;

use clap::Args;
use yb_core::{BackupTarget, Config};

use super::RemoteArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Create a configuration file
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Remote directory backups are stored in
    #[arg(long, default_value = "/backups")]
    pub root: String,

    /// Name prefix for every backup
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Local path to back up (repeatable)
    #[arg(long = "target", value_name = "PATH")]
    pub targets: Vec<PathBuf>,

    /// Backups to keep per target
    #[arg(long, default_value_t = 7)]
    pub retain: usize,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Execute the init command
pub fn execute(args: InitArgs, remote: &RemoteArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let manager = match remote.config_manager() {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from(&e);
        }
    };
    let path = manager.config_path();
    if path.exists() && !args.force {
        formatter.error(&format!(
            "{} already exists, use --force to overwrite",
            path.display()
        ));
        return ExitCode::UsageError;
    }

    let mut config = Config::default();
    config.remote.root = args.root;
    config.remote.prefix = args.prefix;
    config.targets = args
        .targets
        .into_iter()
        .map(|t| BackupTarget::new(t, args.retain, true))
        .collect();

    if let Err(e) = manager.save(&config) {
        formatter.error(&format!("Failed to write {}: {e}", path.display()));
        return ExitCode::from(&e);
    }

    if formatter.is_json() {
        formatter.json(&serde_json::json!({
            "path": path,
            "targets": config.targets.len(),
        }));
    } else {
        formatter.success(&format!("Configuration written to {}", path.display()));
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use yb_core::ConfigManager;

    fn args(force: bool) -> InitArgs {
        InitArgs {
            root: "/server".into(),
            prefix: "n-".into(),
            targets: vec![PathBuf::from("/etc")],
            retain: 3,
            force,
        }
    }

    fn quiet() -> OutputConfig {
        OutputConfig {
            quiet: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_init_writes_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let remote = RemoteArgs {
            config: Some(path.clone()),
            ..Default::default()
        };

        assert_eq!(execute(args(false), &remote, quiet()), ExitCode::Success);

        let config = ConfigManager::with_path(path).load().unwrap();
        assert_eq!(config.remote.root, "/server");
        assert_eq!(config.remote.prefix, "n-");
        assert_eq!(config.targets, vec![BackupTarget::new("/etc", 3, true)]);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "schema_version = 1\n").unwrap();
        let remote = RemoteArgs {
            config: Some(path.clone()),
            ..Default::default()
        };

        assert_eq!(execute(args(false), &remote, quiet()), ExitCode::UsageError);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "schema_version = 1\n");

        assert_eq!(execute(args(true), &remote, quiet()), ExitCode::Success);
        assert!(std::fs::read_to_string(&path).unwrap().contains("/server"));
    }

    #[test]
    fn test_init_rejects_yaml_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let remote = RemoteArgs {
            config: Some(temp.path().join("backup_list.yml")),
            ..Default::default()
        };
        assert_eq!(execute(args(false), &remote, quiet()), ExitCode::UsageError);
    }
}
