use chrono::{DateTime, Utc};
use prunevault_core::{AppError, RunId};
use prunevault_domain::{
    AgePredicate, ArtifactHandle, ArtifactScope, PartitionSpec, RunPhase, RunStamp,
};

use super::report::{
    ArtifactStatus, CleanupStatus, PartitionReport, PurgeStatus, RunOutcome, RunReport,
};
use crate::backup_ports::DumpRequest;

/// Per-partition progress inside a run.
#[derive(Debug, Clone)]
pub(super) struct PartitionState {
    pub(super) spec: PartitionSpec,
    pub(super) predicate: AgePredicate,
    pub(super) artifact: ArtifactStatus,
    pub(super) copy_confirmed: bool,
    pub(super) purge: PurgeStatus,
}

impl PartitionState {
    pub(super) fn new(spec: PartitionSpec, predicate: AgePredicate) -> Self {
        Self {
            spec,
            predicate,
            artifact: ArtifactStatus::NotAttempted,
            copy_confirmed: false,
            purge: PurgeStatus::NotAttempted,
        }
    }

    pub(super) fn scope(&self) -> ArtifactScope {
        ArtifactScope::Partition(self.spec.name().clone())
    }

    pub(super) fn dump_request(&self) -> DumpRequest {
        DumpRequest {
            scope: self.scope(),
            predicate: Some(self.predicate.clone()),
        }
    }
}

/// The single mutable object of one run, owned by the orchestrator.
#[derive(Debug)]
pub(super) struct RunState {
    pub(super) run_id: RunId,
    pub(super) started_at: DateTime<Utc>,
    pub(super) stamp: RunStamp,
    pub(super) phase: RunPhase,
    pub(super) partitions: Vec<PartitionState>,
    pub(super) full_artifact: Option<ArtifactHandle>,
    pub(super) abort_reason: Option<String>,
    pub(super) cleanup: CleanupStatus,
    pub(super) warnings: Vec<String>,
}

impl RunState {
    pub(super) fn new(run_id: RunId, started_at: DateTime<Utc>, cleanup: CleanupStatus) -> Self {
        Self {
            run_id,
            started_at,
            stamp: RunStamp::from_datetime(started_at),
            phase: RunPhase::Start,
            partitions: Vec::new(),
            full_artifact: None,
            abort_reason: None,
            cleanup,
            warnings: Vec::new(),
        }
    }

    /// Moves to `next`. An illegal transition aborts the run instead and
    /// returns `false`.
    pub(super) fn advance(&mut self, next: RunPhase) -> bool {
        if self.phase.can_advance_to(next) {
            self.phase = next;
            return true;
        }

        let error = AppError::Internal(format!(
            "illegal run transition {} -> {}",
            self.phase.as_str(),
            next.as_str()
        ));
        self.abort(&error);
        false
    }

    /// Stops the run. Source rows and remote files are left as they are.
    pub(super) fn abort(&mut self, error: &AppError) {
        if self.phase.can_advance_to(RunPhase::Aborted) {
            self.phase = RunPhase::Aborted;
            self.abort_reason = Some(error.to_string());
        } else {
            self.warnings.push(format!(
                "ignored abort in phase {}: {error}",
                self.phase.as_str()
            ));
        }
    }

    /// A partition may be purged only once the local copy is confirmed and
    /// its own artifact exists here.
    pub(super) fn purge_eligible(&self, index: usize) -> bool {
        self.phase == RunPhase::LocalCopyConfirmed
            && self.partitions.get(index).is_some_and(|partition| {
                partition.artifact.is_produced() && partition.copy_confirmed
            })
    }

    fn outcome(&self) -> RunOutcome {
        if self.phase == RunPhase::Aborted {
            return RunOutcome::Aborted;
        }

        let degraded = self.partitions.iter().any(|partition| {
            matches!(partition.artifact, ArtifactStatus::Failed { .. })
                || matches!(partition.purge, PurgeStatus::Failed { .. })
        });

        if degraded {
            RunOutcome::Degraded
        } else {
            RunOutcome::Succeeded
        }
    }

    pub(super) fn into_report(self, mode: &'static str) -> RunReport {
        let outcome = self.outcome();

        RunReport {
            run_id: self.run_id,
            stamp: self.stamp,
            started_at: self.started_at,
            mode,
            final_phase: self.phase,
            outcome,
            abort_reason: self.abort_reason,
            full_artifact: self.full_artifact,
            partitions: self
                .partitions
                .into_iter()
                .map(|partition| PartitionReport {
                    partition: partition.spec.name().clone(),
                    retention_days: partition.spec.retention_days(),
                    cutoff: partition.predicate.cutoff(),
                    artifact: partition.artifact,
                    purge: partition.purge,
                })
                .collect(),
            cleanup: self.cleanup,
            warnings: self.warnings,
        }
    }
}
