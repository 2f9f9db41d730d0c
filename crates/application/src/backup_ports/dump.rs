use std::path::Path;

use async_trait::async_trait;
use prunevault_core::AppResult;
use prunevault_domain::{AgePredicate, ArtifactHandle, ArtifactScope};

/// One invocation of the external dump program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRequest {
    /// Scope being dumped.
    pub scope: ArtifactScope,
    /// Row filter, absent for the full dataset.
    pub predicate: Option<AgePredicate>,
}

impl DumpRequest {
    /// Requests the whole dataset.
    #[must_use]
    pub fn full() -> Self {
        Self {
            scope: ArtifactScope::Full,
            predicate: None,
        }
    }
}

/// Port for the external program that writes SQL dumps.
#[async_trait]
pub trait DumpTool: Send + Sync {
    /// Runs the dump on this host and writes it to `output`.
    ///
    /// Returns a handle over the uncompressed dump file.
    async fn dump(&self, request: &DumpRequest, output: &Path) -> AppResult<ArtifactHandle>;

    /// Renders the same dump as a shell command for a remote script.
    ///
    /// Credentials are read from `option_file`, never from the command line.
    /// The returned command writes to stdout.
    fn shell_command(&self, request: &DumpRequest, option_file: &str) -> String;

    /// Writes a client option file holding the credentials, owner-readable
    /// only.
    async fn write_option_file(&self, path: &Path) -> AppResult<()>;

    /// Removes a file previously written by [`DumpTool::write_option_file`].
    async fn remove_option_file(&self, path: &Path) -> AppResult<()>;
}
