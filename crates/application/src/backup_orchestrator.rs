use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use prunevault_core::{AppError, AppResult, RunId};
use prunevault_domain::{AgeCutoff, AgePredicate, PartitionSpec, RetentionPolicy, SqlIdentifier};

use crate::artifact_producer::ArtifactProducer;
use crate::batch_purger::BatchPurger;

mod local_run;
mod remote_run;
mod report;
mod state;

pub use report::{
    ArtifactStatus, CleanupStatus, PartitionReport, PurgeStatus, RunOutcome, RunReport,
};

use state::{PartitionState, RunState};

/// Immutable description of what one run backs up and prunes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSettings {
    /// Dataset (database) name, used in full-dump artifact names.
    pub dataset: SqlIdentifier,
    /// Partitions in processing order.
    pub partitions: Vec<SqlIdentifier>,
    /// Retention overrides and default.
    pub retention: RetentionPolicy,
    /// Column holding each row's creation time.
    pub age_column: SqlIdentifier,
}

/// Sequences artifact production, copy confirmation, purge and remote
/// cleanup so that no row is deleted before a confirmed copy exists.
///
/// Runs never return an error: every failure ends up in the [`RunReport`].
#[derive(Clone)]
pub struct BackupOrchestrator {
    settings: BackupSettings,
    producer: ArtifactProducer,
    purger: BatchPurger,
}

impl BackupOrchestrator {
    /// Creates an orchestrator over injected collaborators.
    #[must_use]
    pub fn new(settings: BackupSettings, producer: ArtifactProducer, purger: BatchPurger) -> Self {
        Self {
            settings,
            producer,
            purger,
        }
    }

    /// Returns the run settings.
    #[must_use]
    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    /// Executes one run that started at `started_at`.
    ///
    /// At most one run may execute at a time against the same dataset and
    /// directories.
    pub async fn run(&self, run_id: RunId, started_at: DateTime<Utc>) -> RunReport {
        let cleanup = match self.producer {
            ArtifactProducer::Local(_) => CleanupStatus::NotApplicable,
            ArtifactProducer::Remote(_) => CleanupStatus::Skipped,
        };
        let mut state = RunState::new(run_id, started_at, cleanup);

        match self.plan_partitions(started_at) {
            Ok(partitions) => state.partitions = partitions,
            Err(error) => {
                state.abort(&error);
                return state.into_report(self.producer.mode());
            }
        }

        match &self.producer {
            ArtifactProducer::Local(producer) => self.run_local(producer, &mut state).await,
            ArtifactProducer::Remote(producer) => self.run_remote(producer, &mut state).await,
        }

        state.into_report(self.producer.mode())
    }

    /// Resolves retention once per partition so every batch of a purge and
    /// the matching dump share one cutoff.
    fn plan_partitions(&self, started_at: DateTime<Utc>) -> AppResult<Vec<PartitionState>> {
        self.settings.retention.validate()?;

        let mut seen = BTreeSet::new();
        let mut partitions = Vec::with_capacity(self.settings.partitions.len());

        for name in &self.settings.partitions {
            if !seen.insert(name.as_str()) {
                return Err(AppError::Configuration(format!(
                    "partition '{name}' is listed more than once"
                )));
            }

            let retention = self.settings.retention.resolve(name.as_str())?;
            let cutoff = AgeCutoff::from_run_start(started_at, retention);
            let predicate = AgePredicate::new(self.settings.age_column.clone(), cutoff);

            partitions.push(PartitionState::new(
                PartitionSpec::new(name.clone(), retention),
                predicate,
            ));
        }

        Ok(partitions)
    }

    /// Purges every eligible partition, one at a time. A failed purge is
    /// recorded and the next partition proceeds.
    async fn purge_phase(&self, state: &mut RunState) {
        let eligible: Vec<usize> = (0..state.partitions.len())
            .filter(|index| state.purge_eligible(*index))
            .collect();

        for index in eligible {
            let Some(partition) = state.partitions.get_mut(index) else {
                continue;
            };
            partition.purge = match self
                .purger
                .purge(partition.spec.name(), &partition.predicate)
                .await
            {
                Ok(result) => PurgeStatus::Completed { result },
                Err(error) => PurgeStatus::Failed {
                    message: error.to_string(),
                },
            };
        }
    }
}
