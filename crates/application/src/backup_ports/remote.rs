use std::path::Path;

use async_trait::async_trait;
use prunevault_core::{AppResult, RemoteCredentials};

/// Captured result of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit status.
    pub exit_code: i32,
}

/// Port for establishing sessions on the remote dump host.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Opens a session. Fails with `AppError::RemoteConnection`.
    async fn connect(&self, credentials: &RemoteCredentials) -> AppResult<Box<dyn RemoteSession>>;
}

/// An open session on the remote host.
///
/// Nothing here retries. A partially applied remote script must not be
/// replayed blindly.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Runs a shell command.
    ///
    /// A non-zero exit fails with `AppError::RemoteCommand`.
    async fn run(&self, command: &str) -> AppResult<CommandOutput>;

    /// Uploads a local file. Fails with `AppError::RemoteTransfer`.
    async fn put_file(&self, local_path: &Path, remote_path: &str) -> AppResult<()>;

    /// Downloads a remote file. Fails with `AppError::RemoteTransfer`.
    async fn get_file(&self, remote_path: &str, local_path: &Path) -> AppResult<()>;

    /// Releases the session. Calling it twice is a no-op.
    async fn close(&mut self) -> AppResult<()>;
}
