use std::path::PathBuf;
use std::sync::Arc;

use prunevault_core::AppResult;
use prunevault_domain::{ArtifactHandle, RunStamp, SqlIdentifier};

use super::{LocalArtifactProducer, scope_error};
use crate::backup_ports::{ArchiveCodec, DumpRequest, DumpTool};

impl LocalArtifactProducer {
    /// Creates a local producer writing dumps to `staging_dir` and archives to
    /// `archive_dir`.
    #[must_use]
    pub fn new(
        dump_tool: Arc<dyn DumpTool>,
        archive_codec: Arc<dyn ArchiveCodec>,
        staging_dir: PathBuf,
        archive_dir: PathBuf,
    ) -> Self {
        Self {
            dump_tool,
            archive_codec,
            staging_dir,
            archive_dir,
        }
    }

    /// Dumps one scope and seals it.
    ///
    /// The dump handle moves straight into the archive codec, which removes
    /// the uncompressed file once the archive is written.
    pub async fn produce(
        &self,
        dataset: &SqlIdentifier,
        stamp: &RunStamp,
        request: &DumpRequest,
    ) -> AppResult<ArtifactHandle> {
        let dump_path = self
            .staging_dir
            .join(request.scope.dump_file_name(dataset, stamp));
        let archive_path = self
            .archive_dir
            .join(request.scope.archive_file_name(dataset, stamp));

        let dump = self
            .dump_tool
            .dump(request, &dump_path)
            .await
            .map_err(|error| scope_error(&request.scope, error))?;

        self.archive_codec
            .seal(dump, &archive_path)
            .await
            .map_err(|error| scope_error(&request.scope, error))
    }
}
