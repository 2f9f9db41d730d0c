//! Shared primitives for all Rust crates in prunevault.

#![forbid(unsafe_code)]

/// Credential primitives shared across adapters.
pub mod credentials;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use credentials::{DatabaseCredentials, RemoteCredentials, Secret};

/// Result type used across prunevault crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Configuration(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Identifier of one backup run, used to correlate logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a random run identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a run identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Error categories of a backup-and-purge run.
///
/// Dataset-scoped categories (`Configuration`, full-scope `Artifact`,
/// `RemoteConnection`, `RemoteCommand`, `RemoteTransfer`) abort a run.
/// Partition-scoped ones are contained at the partition boundary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid retention value or missing required configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Dump or compression failed for one artifact scope.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// The remote channel could not be established.
    #[error("remote connection error: {0}")]
    RemoteConnection(String),

    /// A remote command exited with a non-zero status.
    #[error("remote command exited with status {exit_code}: {stderr}")]
    RemoteCommand {
        /// Exit status reported by the remote shell.
        exit_code: i32,
        /// Captured standard error of the command.
        stderr: String,
    },

    /// A file transfer to or from the remote host failed.
    #[error("remote transfer error: {0}")]
    RemoteTransfer(String),

    /// Deleting a batch of rows failed.
    #[error("purge error: {0}")]
    Purge(String),

    /// Removing remote leftovers failed.
    #[error("cleanup error: {0}")]
    Cleanup(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
