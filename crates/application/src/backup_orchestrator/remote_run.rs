use prunevault_core::AppError;
use prunevault_domain::{ArtifactHandle, ArtifactScope, RunPhase};

use super::BackupOrchestrator;
use super::report::{ArtifactStatus, CleanupStatus};
use super::state::RunState;
use crate::artifact_producer::{PlannedDump, RemoteArtifactProducer};
use crate::backup_ports::RemoteSession;

impl BackupOrchestrator {
    pub(super) async fn run_remote(&self, producer: &RemoteArtifactProducer, state: &mut RunState) {
        let mut session = match producer.connect().await {
            Ok(session) => session,
            Err(error) => {
                state.abort(&error);
                return;
            }
        };

        self.drive_remote(producer, session.as_ref(), state).await;

        // The session is released on every path out of the sequence above.
        if let Err(error) = session.close().await {
            state
                .warnings
                .push(format!("failed to close remote session: {error}"));
        }
    }

    async fn drive_remote(
        &self,
        producer: &RemoteArtifactProducer,
        session: &dyn RemoteSession,
        state: &mut RunState,
    ) {
        let dataset = &self.settings.dataset;
        let layout = producer.layout(&state.stamp);
        let plan: Vec<PlannedDump> = std::iter::once(PlannedDump::full())
            .chain(state.partitions.iter().map(|partition| {
                PlannedDump::partition(partition.spec.clone(), partition.predicate.clone())
            }))
            .collect();

        // One all-or-nothing script produces every dump.
        if let Err(error) = producer.produce(session, dataset, &layout, &plan).await {
            state.abort(&error);
            return;
        }
        if !state.advance(RunPhase::FullArtifactReady) {
            return;
        }

        for partition in &mut state.partitions {
            let file_name = partition.scope().dump_file_name(dataset, &state.stamp);
            partition.artifact = ArtifactStatus::Remote {
                remote_path: layout.dump_path(&file_name),
            };
        }
        if !state.advance(RunPhase::PartitionArtifactsReady) {
            return;
        }

        let pulled = match producer.pull(session, &layout).await {
            Ok(pulled) => pulled,
            Err(error) => {
                state.abort(&error);
                return;
            }
        };

        let full_entry =
            layout.archive_entry(&ArtifactScope::Full.dump_file_name(dataset, &state.stamp));
        if !pulled
            .manifest
            .entry(&full_entry)
            .is_some_and(|entry| entry.size_bytes > 0)
        {
            state.abort(&AppError::RemoteTransfer(format!(
                "pulled archive '{}' has no non-empty '{full_entry}' entry",
                pulled.handle.local_path.display()
            )));
            return;
        }
        state.full_artifact = Some(pulled.handle.clone());

        for partition in &mut state.partitions {
            let scope = partition.scope();
            let entry_name = layout.archive_entry(&scope.dump_file_name(dataset, &state.stamp));
            match pulled.manifest.entry(&entry_name) {
                Some(entry) if entry.size_bytes > 0 => {
                    partition.artifact = ArtifactStatus::Produced {
                        handle: ArtifactHandle {
                            local_path: pulled.handle.local_path.clone(),
                            size_bytes: entry.size_bytes,
                            scope,
                            sha256: pulled.handle.sha256.clone(),
                        },
                    };
                    partition.copy_confirmed = true;
                }
                Some(_) => {
                    partition.artifact = ArtifactStatus::Failed {
                        message: format!("pulled archive entry '{entry_name}' is empty"),
                    };
                }
                None => {
                    partition.artifact = ArtifactStatus::Failed {
                        message: format!("pulled archive has no '{entry_name}' entry"),
                    };
                }
            }
        }
        if !state.advance(RunPhase::LocalCopyConfirmed) {
            return;
        }

        self.purge_phase(state).await;
        if !state.advance(RunPhase::Purged) {
            return;
        }

        state.cleanup = match producer.cleanup(session, &layout).await {
            Ok(()) => CleanupStatus::Completed,
            Err(error) => CleanupStatus::Failed {
                message: error.to_string(),
            },
        };
        if state.advance(RunPhase::RemoteCleaned) {
            state.advance(RunPhase::Done);
        }
    }
}
