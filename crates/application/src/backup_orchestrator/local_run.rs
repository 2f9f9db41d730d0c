use prunevault_domain::RunPhase;

use super::BackupOrchestrator;
use super::report::ArtifactStatus;
use super::state::RunState;
use crate::artifact_producer::LocalArtifactProducer;
use crate::backup_ports::DumpRequest;

impl BackupOrchestrator {
    pub(super) async fn run_local(&self, producer: &LocalArtifactProducer, state: &mut RunState) {
        let dataset = &self.settings.dataset;
        let stamp = state.stamp.clone();

        match producer.produce(dataset, &stamp, &DumpRequest::full()).await {
            Ok(handle) => state.full_artifact = Some(handle),
            Err(error) => {
                state.abort(&error);
                return;
            }
        }
        if !state.advance(RunPhase::FullArtifactReady) {
            return;
        }

        for partition in &mut state.partitions {
            partition.artifact = match producer
                .produce(dataset, &stamp, &partition.dump_request())
                .await
            {
                Ok(handle) => ArtifactStatus::Produced { handle },
                Err(error) => ArtifactStatus::Failed {
                    message: error.to_string(),
                },
            };
        }
        if !state.advance(RunPhase::PartitionArtifactsReady) {
            return;
        }

        // Local archives are already on this host.
        for partition in &mut state.partitions {
            partition.copy_confirmed = partition.artifact.is_produced();
        }
        if !state.advance(RunPhase::LocalCopyConfirmed) {
            return;
        }

        self.purge_phase(state).await;
        if state.advance(RunPhase::Purged) {
            state.advance(RunPhase::Done);
        }
    }
}
