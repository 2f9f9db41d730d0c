use std::path::Path;

use async_trait::async_trait;
use prunevault_core::AppResult;
use prunevault_domain::ArtifactHandle;

/// One file stored in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry path inside the archive.
    pub name: String,
    /// Uncompressed size.
    pub size_bytes: u64,
}

/// What an archive on local disk contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveManifest {
    /// Archive file size.
    pub size_bytes: u64,
    /// Hex SHA-256 of the archive file.
    pub sha256: String,
    /// Entries in archive order.
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveManifest {
    /// Finds an entry by exact name.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

/// Port for the compression utility.
#[async_trait]
pub trait ArchiveCodec: Send + Sync {
    /// Seals a dump into a single-entry archive at `archive_path`.
    ///
    /// Takes ownership of the dump and deletes the uncompressed file right
    /// after the archive is closed. Returns a handle over the archive.
    async fn seal(&self, dump: ArtifactHandle, archive_path: &Path) -> AppResult<ArtifactHandle>;

    /// Reads the size, checksum and entry list of an existing archive.
    async fn inspect(&self, archive_path: &Path) -> AppResult<ArchiveManifest>;
}
