//! Application services and ports.

#![forbid(unsafe_code)]

mod artifact_producer;
mod backup_orchestrator;
mod backup_ports;
mod batch_purger;

pub use artifact_producer::{
    ArtifactProducer, LocalArtifactProducer, PlannedDump, PulledArchive, RemoteArtifactProducer,
    RemoteScript, RemoteSettings, shell_quote,
};
pub use backup_orchestrator::{
    ArtifactStatus, BackupOrchestrator, BackupSettings, CleanupStatus, PartitionReport,
    PurgeStatus, RunOutcome, RunReport,
};
pub use backup_ports::{
    ArchiveCodec, ArchiveEntry, ArchiveManifest, BatchDeleter, CommandOutput, DumpRequest,
    DumpTool, RemoteChannel, RemoteSession,
};
pub use batch_purger::BatchPurger;
