use std::path::PathBuf;
use std::sync::Arc;

use prunevault_core::{AppError, RemoteCredentials};
use prunevault_domain::{AgePredicate, ArtifactHandle, ArtifactScope, PartitionSpec};

use crate::backup_ports::{ArchiveCodec, ArchiveManifest, DumpRequest, DumpTool, RemoteChannel};

mod local;
mod remote;
mod script;

pub use script::{RemoteScript, shell_quote};

/// Produces the durable copies a purge depends on.
#[derive(Clone)]
pub enum ArtifactProducer {
    /// Dumps and compresses on this host.
    Local(LocalArtifactProducer),
    /// Dumps and compresses on the remote host, then pulls the archive.
    Remote(RemoteArtifactProducer),
}

impl ArtifactProducer {
    /// Returns a stable mode label.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
        }
    }
}

/// Runs the dump tool locally and seals each dump into its own archive.
#[derive(Clone)]
pub struct LocalArtifactProducer {
    dump_tool: Arc<dyn DumpTool>,
    archive_codec: Arc<dyn ArchiveCodec>,
    staging_dir: PathBuf,
    archive_dir: PathBuf,
}

/// Where and how remote runs happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    /// SSH target.
    pub credentials: RemoteCredentials,
    /// Remote directory holding the run's working files.
    pub work_root: String,
}

/// Ships a generated dump script to the remote host and pulls back its
/// archive.
#[derive(Clone)]
pub struct RemoteArtifactProducer {
    channel: Arc<dyn RemoteChannel>,
    dump_tool: Arc<dyn DumpTool>,
    archive_codec: Arc<dyn ArchiveCodec>,
    settings: RemoteSettings,
    staging_dir: PathBuf,
    archive_dir: PathBuf,
}

/// One planned remote dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDump {
    /// Dump request.
    pub request: DumpRequest,
    /// Retention the predicate was derived from, for script comments.
    pub partition: Option<PartitionSpec>,
}

impl PlannedDump {
    /// Plans the unfiltered full dump.
    #[must_use]
    pub fn full() -> Self {
        Self {
            request: DumpRequest::full(),
            partition: None,
        }
    }

    /// Plans one partition dump.
    #[must_use]
    pub fn partition(spec: PartitionSpec, predicate: AgePredicate) -> Self {
        Self {
            request: DumpRequest {
                scope: ArtifactScope::Partition(spec.name().clone()),
                predicate: Some(predicate),
            },
            partition: Some(spec),
        }
    }
}

/// A remote archive that now exists on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulledArchive {
    /// Handle over the local archive.
    pub handle: ArtifactHandle,
    /// Archive contents.
    pub manifest: ArchiveManifest,
}

fn scope_error(scope: &ArtifactScope, error: AppError) -> AppError {
    match error {
        AppError::Artifact(message) => {
            AppError::Artifact(format!("{} artifact: {message}", scope.label()))
        }
        other => AppError::Artifact(format!("{} artifact: {other}", scope.label())),
    }
}
