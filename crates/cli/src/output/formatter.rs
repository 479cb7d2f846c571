//! Rendering of run, prune and plan results
//!
//! Every message goes through a [`Formatter`]. In JSON mode stdout carries one
//! JSON document per command and status lines are suppressed; errors still
//! reach stderr as `{"error": ...}`.

use serde::Serialize;
use yb_core::{BackupMode, PruneReport, TargetOutcome, TargetPlan};

use super::OutputConfig;

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Failed,
    Skipped,
    Info,
}

impl Status {
    /// Mark and ANSI color for the line, `None` for plain text
    fn mark(self) -> Option<(&'static str, &'static str)> {
        match self {
            Status::Done => Some(("✓", "32")),
            Status::Failed => Some(("✗", "31")),
            Status::Skipped => Some(("⚠", "33")),
            Status::Info => None,
        }
    }
}

/// One rendered line of human-readable output
pub type Line = (Status, String);

/// Writes command output to stdout and stderr
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    fn colored(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// Print one status line; failures go to stderr and survive `--quiet`
    pub fn emit(&self, status: Status, text: &str) {
        if status == Status::Failed {
            if self.config.json {
                let error = serde_json::json!({ "error": text });
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&error).unwrap_or_else(|_| text.to_string())
                );
            } else {
                eprintln!("{}", self.decorate(status, text));
            }
            return;
        }
        if self.config.quiet || (self.config.json && status != Status::Info) {
            return;
        }
        match status {
            Status::Skipped => eprintln!("{}", self.decorate(status, text)),
            _ => println!("{}", self.decorate(status, text)),
        }
    }

    fn decorate(&self, status: Status, text: &str) -> String {
        match status.mark() {
            Some((mark, color)) if self.colored() => format!("\x1b[{color}m{mark}\x1b[0m {text}"),
            Some((mark, _)) => format!("{mark} {text}"),
            None => text.to_string(),
        }
    }

    pub fn success(&self, message: &str) {
        self.emit(Status::Done, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(Status::Failed, message);
    }

    pub fn warning(&self, message: &str) {
        self.emit(Status::Skipped, message);
    }

    pub fn println(&self, message: &str) {
        self.emit(Status::Info, message);
    }

    /// Print a value as the command's JSON document
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    fn lines(&self, lines: Vec<Line>) {
        for (status, text) in lines {
            self.emit(status, &text);
        }
    }

    /// Summary of one target of a run
    pub fn outcome(&self, outcome: &TargetOutcome) {
        self.lines(outcome_lines(outcome));
    }

    /// Result of pruning one target
    pub fn prune_report(&self, report: &PruneReport) {
        if self.is_json() {
            self.json(report);
        } else {
            self.lines(prune_lines(report));
        }
    }

    /// Dry-run view of one target
    pub fn plan(&self, plan: &TargetPlan) {
        self.lines(plan_lines(plan));
    }
}

pub fn mode_name(mode: BackupMode) -> &'static str {
    match mode {
        BackupMode::Archive => "archive",
        BackupMode::Mirror => "mirror",
        BackupMode::File => "file",
        BackupMode::Missing => "missing",
    }
}

pub fn outcome_lines(outcome: &TargetOutcome) -> Vec<Line> {
    let path = outcome.target.path.display();
    if let Some(error) = &outcome.error {
        return vec![(Status::Failed, format!("{path}: {error}"))];
    }
    let Some(backup) = &outcome.backup else {
        return Vec::new();
    };
    if backup.mode == BackupMode::Missing {
        return vec![(
            Status::Skipped,
            format!("{path} does not exist, nothing uploaded"),
        )];
    }

    let deleted = outcome.prune.as_ref().map_or(0, |p| p.deleted.len());
    let summary = format!(
        "{path} -> {} ({}, {} uploaded, {deleted} old removed)",
        backup.destination,
        mode_name(backup.mode),
        backup.uploaded.len()
    );
    if backup.is_success() {
        return vec![(Status::Done, summary)];
    }

    let mut lines = vec![(
        Status::Failed,
        format!("{summary}, {} failed", backup.failures.len()),
    )];
    lines.extend(
        backup
            .failures
            .iter()
            .map(|f| (Status::Failed, format!("  {}: {}", f.remote, f.error))),
    );
    lines
}

pub fn prune_lines(report: &PruneReport) -> Vec<Line> {
    let mut lines: Vec<Line> = report
        .deleted
        .iter()
        .map(|name| (Status::Info, format!("Removed {}/{name}", report.location)))
        .collect();
    lines.push((
        Status::Done,
        format!(
            "{} kept, {} removed in {}",
            report.kept.len(),
            report.deleted.len(),
            report.location
        ),
    ));
    lines
}

pub fn plan_lines(plan: &TargetPlan) -> Vec<Line> {
    let mut lines = vec![(
        Status::Info,
        format!(
            "{} ({}) -> {}",
            plan.target.path.display(),
            mode_name(plan.backup.mode),
            plan.backup.destination
        ),
    )];
    lines.extend(
        plan.prune
            .delete
            .iter()
            .map(|name| (Status::Info, format!("  delete {}/{name}", plan.prune.location))),
    );
    lines
}
