use chrono::{DateTime, Utc};
use prunevault_core::RunId;
use prunevault_domain::{
    AgeCutoff, ArtifactHandle, PurgeResult, RetentionDays, RunPhase, RunStamp, SqlIdentifier,
};
use serde::Serialize;

/// Artifact progress of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// The run stopped before this partition was dumped.
    NotAttempted,
    /// Dumped on the remote host, not yet copied here.
    Remote {
        /// Dump path on the remote host.
        remote_path: String,
    },
    /// A durable local copy exists.
    Produced {
        /// The local artifact.
        handle: ArtifactHandle,
    },
    /// Dumping, sealing or confirming failed.
    Failed {
        /// Failure description.
        message: String,
    },
}

impl ArtifactStatus {
    /// Returns whether a local copy exists.
    #[must_use]
    pub fn is_produced(&self) -> bool {
        matches!(self, Self::Produced { .. })
    }
}

/// Purge progress of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PurgeStatus {
    /// No delete was issued against the partition.
    NotAttempted,
    /// Every eligible row was deleted.
    Completed {
        /// Rows and batches deleted.
        result: PurgeResult,
    },
    /// A batch failed; earlier batches stay committed.
    Failed {
        /// Failure description.
        message: String,
    },
}

/// Remote cleanup progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupStatus {
    /// Local runs leave nothing remote.
    NotApplicable,
    /// Cleanup was not attempted; remote files are intact.
    Skipped,
    /// Remote leftovers were removed.
    Completed,
    /// Removing leftovers failed. The run outcome is unaffected.
    Failed {
        /// Failure description.
        message: String,
    },
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every partition was backed up and purged.
    Succeeded,
    /// The run finished but at least one partition failed.
    Degraded,
    /// The run stopped at a dataset-level failure.
    Aborted,
}

impl RunOutcome {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Degraded => "degraded",
            Self::Aborted => "aborted",
        }
    }
}

/// Per-partition section of a run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    /// Partition name.
    pub partition: SqlIdentifier,
    /// Retention applied in this run.
    pub retention_days: RetentionDays,
    /// Cutoff applied to both the dump and the purge.
    pub cutoff: AgeCutoff,
    /// Artifact progress.
    pub artifact: ArtifactStatus,
    /// Purge progress.
    pub purge: PurgeStatus,
}

/// Structured end-of-run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Run stamp used in artifact names.
    pub stamp: RunStamp,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// `local` or `remote`.
    pub mode: &'static str,
    /// Last phase reached.
    pub final_phase: RunPhase,
    /// Overall classification.
    pub outcome: RunOutcome,
    /// Why the run aborted, when it did.
    pub abort_reason: Option<String>,
    /// The whole-dataset artifact, once it exists locally.
    pub full_artifact: Option<ArtifactHandle>,
    /// Partitions in processing order.
    pub partitions: Vec<PartitionReport>,
    /// Remote cleanup progress.
    pub cleanup: CleanupStatus,
    /// Non-fatal problems, such as a session that failed to close.
    pub warnings: Vec<String>,
}

impl RunReport {
    /// Finds a partition section by name.
    #[must_use]
    pub fn partition(&self, name: &str) -> Option<&PartitionReport> {
        self.partitions
            .iter()
            .find(|partition| partition.partition.as_str() == name)
    }

    /// Total rows deleted across all partitions.
    #[must_use]
    pub fn rows_deleted(&self) -> u64 {
        self.partitions
            .iter()
            .filter_map(|partition| match &partition.purge {
                PurgeStatus::Completed { result } => Some(result.rows_deleted),
                _ => None,
            })
            .sum()
    }

    /// Partitions whose artifact or purge failed.
    #[must_use]
    pub fn failed_partitions(&self) -> Vec<&SqlIdentifier> {
        self.partitions
            .iter()
            .filter(|partition| {
                matches!(partition.artifact, ArtifactStatus::Failed { .. })
                    || matches!(partition.purge, PurgeStatus::Failed { .. })
            })
            .map(|partition| &partition.partition)
            .collect()
    }
}
