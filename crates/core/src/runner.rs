//! One backup run over all configured targets
//!
//! For each target the old backups are pruned first, then the new backup is
//! produced. A failing target does not stop the run; its error is recorded in
//! the run summary.

use serde::Serialize;

use crate::backup::{BackupPlan, BackupReport, BackupTarget, Orchestrator};
use crate::cache::RemoteFs;
use crate::error::Result;
use crate::path::PathResolver;
use crate::retention::{PrunePlan, PruneReport, RetentionManager};
use crate::traits::RemoteStore;

/// Result of processing one target
#[derive(Debug, Serialize)]
pub struct TargetOutcome {
    pub target: BackupTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune: Option<PruneReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetOutcome {
    /// Whether the target was pruned and backed up without any failure
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.backup.as_ref().is_some_and(BackupReport::is_success)
    }
}

/// Dry-run view of one target
#[derive(Debug, Serialize)]
pub struct TargetPlan {
    pub target: BackupTarget,
    pub prune: PrunePlan,
    pub backup: BackupPlan,
}

/// Drives prune + backup for a list of targets against one store
pub struct Runner<'a> {
    fs: RemoteFs<'a>,
    resolver: PathResolver,
}

impl<'a> Runner<'a> {
    /// Start a run; the metadata cache lives as long as the runner
    pub fn new(store: &'a dyn RemoteStore, resolver: PathResolver) -> Self {
        Self {
            fs: RemoteFs::new(store),
            resolver,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Prune old backups of `target` in the remote root
    pub async fn prune(&self, target: &BackupTarget) -> Result<PruneReport> {
        let pattern = Orchestrator::new(&self.fs, &self.resolver).pattern(target);
        RetentionManager::new(&self.fs)
            .prune_matching(target.retain, self.resolver.root().dir(), |name| {
                pattern.matches(name)
            })
            .await
    }

    /// Prune, then back up one target
    pub async fn run_target(&self, target: &BackupTarget) -> TargetOutcome {
        let mut outcome = TargetOutcome {
            target: target.clone(),
            prune: None,
            backup: None,
            error: None,
        };

        match self.prune(target).await {
            Ok(report) => outcome.prune = Some(report),
            Err(e) => {
                tracing::warn!(path = %target.path.display(), error = %e, "pruning failed");
                outcome.error = Some(e.to_string());
                return outcome;
            }
        }

        match Orchestrator::new(&self.fs, &self.resolver)
            .backup(target)
            .await
        {
            Ok(report) => outcome.backup = Some(report),
            Err(e) => {
                tracing::warn!(path = %target.path.display(), error = %e, "backup failed");
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }

    /// Process every target in order
    pub async fn run(&self, targets: &[BackupTarget]) -> Vec<TargetOutcome> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.run_target(target).await);
        }
        outcomes
    }

    /// What `run` would do, reading remote listings but writing nothing
    pub async fn plan(&self, targets: &[BackupTarget]) -> Result<Vec<TargetPlan>> {
        let retention = RetentionManager::new(&self.fs);
        let orchestrator = Orchestrator::new(&self.fs, &self.resolver);
        let mut plans = Vec::with_capacity(targets.len());
        for target in targets {
            let pattern = orchestrator.pattern(target);
            let prune = retention
                .plan_matching(target.retain, self.resolver.root().dir(), |name| {
                    pattern.matches(name)
                })
                .await?;
            plans.push(TargetPlan {
                target: target.clone(),
                prune,
                backup: orchestrator.plan(target),
            });
        }
        Ok(plans)
    }
}
