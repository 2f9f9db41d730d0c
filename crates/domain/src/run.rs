use serde::Serialize;

use crate::partition::SqlIdentifier;

/// Phases of one backup-and-purge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Nothing produced yet.
    Start,
    /// The whole-dataset artifact exists.
    FullArtifactReady,
    /// Every partition artifact was attempted.
    PartitionArtifactsReady,
    /// Every successful artifact is confirmed on local disk.
    LocalCopyConfirmed,
    /// Eligible partitions were purged.
    Purged,
    /// Remote leftovers were handled.
    RemoteCleaned,
    /// The run finished.
    Done,
    /// The run stopped before purging anything further.
    Aborted,
}

impl RunPhase {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FullArtifactReady => "full_artifact_ready",
            Self::PartitionArtifactsReady => "partition_artifacts_ready",
            Self::LocalCopyConfirmed => "local_copy_confirmed",
            Self::Purged => "purged",
            Self::RemoteCleaned => "remote_cleaned",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Returns whether the run may move from `self` to `next`.
    ///
    /// `Purged` may go straight to `Done` because local runs have nothing
    /// to clean remotely. Nothing after `LocalCopyConfirmed` can abort.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::FullArtifactReady)
                | (Self::FullArtifactReady, Self::PartitionArtifactsReady)
                | (Self::PartitionArtifactsReady, Self::LocalCopyConfirmed)
                | (Self::LocalCopyConfirmed, Self::Purged)
                | (Self::Purged, Self::RemoteCleaned)
                | (Self::Purged, Self::Done)
                | (Self::RemoteCleaned, Self::Done)
                | (
                    Self::Start
                        | Self::FullArtifactReady
                        | Self::PartitionArtifactsReady
                        | Self::LocalCopyConfirmed,
                    Self::Aborted
                )
        )
    }

    /// Returns whether the run has finished.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

/// Rows removed from one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeResult {
    /// Purged partition.
    pub partition: SqlIdentifier,
    /// Total rows deleted across all batches.
    pub rows_deleted: u64,
    /// Number of batches that deleted at least one row.
    pub batches: u64,
}

impl PurgeResult {
    /// Creates an empty result for a partition.
    #[must_use]
    pub fn empty(partition: SqlIdentifier) -> Self {
        Self {
            partition,
            rows_deleted: 0,
            batches: 0,
        }
    }
}
