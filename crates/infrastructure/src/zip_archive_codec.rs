//! Deflate-compressed zip archives with SHA-256 checksums.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use prunevault_application::{ArchiveCodec, ArchiveEntry, ArchiveManifest};
use prunevault_core::{AppError, AppResult};
use prunevault_domain::ArtifactHandle;

/// Zip archive codec. Compression runs on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveCodec;

impl ZipArchiveCodec {
    /// Creates a codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn write_archive(source: &Path, archive_path: &Path) -> AppResult<()> {
    let entry_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            AppError::Artifact(format!("dump path '{}' has no file name", source.display()))
        })?;

    let archive_error = |error: &dyn std::fmt::Display| {
        AppError::Artifact(format!(
            "failed to write archive '{}': {error}",
            archive_path.display()
        ))
    };

    let mut input = File::open(source).map_err(|error| {
        AppError::Artifact(format!("failed to open dump '{}': {error}", source.display()))
    })?;
    let output = File::create(archive_path).map_err(|error| archive_error(&error))?;

    let mut writer = ZipWriter::new(BufWriter::new(output));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    writer
        .start_file(entry_name, options)
        .map_err(|error| archive_error(&error))?;
    std::io::copy(&mut input, &mut writer).map_err(|error| archive_error(&error))?;

    let buffered = writer.finish().map_err(|error| archive_error(&error))?;
    let file = buffered
        .into_inner()
        .map_err(|error| archive_error(error.error()))?;
    file.sync_all().map_err(|error| archive_error(&error))
}

fn read_manifest(archive_path: &Path) -> AppResult<ArchiveManifest> {
    let read_error = |error: &dyn std::fmt::Display| {
        AppError::Artifact(format!(
            "failed to read archive '{}': {error}",
            archive_path.display()
        ))
    };

    let mut file = File::open(archive_path).map_err(|error| read_error(&error))?;
    let size_bytes = file
        .metadata()
        .map(|metadata| metadata.len())
        .map_err(|error| read_error(&error))?;

    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|error| read_error(&error))?;
    let sha256 = hex::encode(hasher.finalize());

    let file = File::open(archive_path).map_err(|error| read_error(&error))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|error| read_error(&error))?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|error| read_error(&error))?;
        entries.push(ArchiveEntry {
            name: entry.name().to_owned(),
            size_bytes: entry.size(),
        });
    }

    Ok(ArchiveManifest {
        size_bytes,
        sha256,
        entries,
    })
}

async fn blocking<T, F>(task: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|error| AppError::Internal(format!("archive task failed: {error}")))?
}

async fn remove_dump(path: &Path) -> AppResult<()> {
    tokio::fs::remove_file(path).await.map_err(|error| {
        AppError::Artifact(format!(
            "archive written but uncompressed dump '{}' could not be removed: {error}",
            path.display()
        ))
    })
}

#[async_trait]
impl ArchiveCodec for ZipArchiveCodec {
    async fn seal(&self, dump: ArtifactHandle, archive_path: &Path) -> AppResult<ArtifactHandle> {
        let source = dump.local_path.clone();
        let target: PathBuf = archive_path.to_path_buf();

        let written = {
            let source = source.clone();
            let target = target.clone();
            blocking(move || write_archive(&source, &target)).await
        };
        if let Err(error) = written {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(error);
        }

        remove_dump(&source).await?;

        let manifest = {
            let target = target.clone();
            blocking(move || read_manifest(&target)).await?
        };

        info!(
            archive = %target.display(),
            dump_bytes = dump.size_bytes,
            archive_bytes = manifest.size_bytes,
            "archive sealed"
        );

        Ok(ArtifactHandle {
            local_path: target,
            size_bytes: manifest.size_bytes,
            scope: dump.scope,
            sha256: Some(manifest.sha256),
        })
    }

    async fn inspect(&self, archive_path: &Path) -> AppResult<ArchiveManifest> {
        let target = archive_path.to_path_buf();
        blocking(move || read_manifest(&target)).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use prunevault_application::ArchiveCodec;
    use prunevault_core::AppError;
    use prunevault_domain::{ArtifactHandle, ArtifactScope};

    use super::{ZipArchiveCodec, remove_dump};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("prunevault-zip-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        if let Err(error) = std::fs::create_dir_all(&dir) {
            panic!("failed to create scratch dir: {error}");
        }
        dir
    }

    #[tokio::test]
    async fn seal_compresses_dump_and_removes_source() {
        let dir = scratch_dir("seal");
        let dump_path = dir.join("shop_full_20261019031500.sql");
        let contents = "INSERT INTO callbacklog VALUES (1);\n".repeat(500);
        assert!(std::fs::write(&dump_path, &contents).is_ok());

        let codec = ZipArchiveCodec::new();
        let dump = ArtifactHandle {
            local_path: dump_path.clone(),
            size_bytes: contents.len() as u64,
            scope: ArtifactScope::Full,
            sha256: None,
        };
        let archive_path = dir.join("shop_full_20261019031500.zip");

        let Ok(sealed) = codec.seal(dump, &archive_path).await else {
            panic!("seal failed");
        };

        assert!(!dump_path.exists());
        assert_eq!(sealed.local_path, archive_path);
        assert_eq!(sealed.scope, ArtifactScope::Full);
        assert!(sealed.size_bytes > 0 && sealed.size_bytes < contents.len() as u64);
        assert!(sealed.sha256.as_ref().is_some_and(|digest| digest.len() == 64));

        let Ok(manifest) = codec.inspect(&archive_path).await else {
            panic!("inspect failed");
        };
        assert_eq!(manifest.sha256, sealed.sha256.unwrap_or_default());
        let Some(entry) = manifest.entry("shop_full_20261019031500.sql") else {
            panic!("missing entry");
        };
        assert_eq!(entry.size_bytes, contents.len() as u64);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn inspect_rejects_a_file_that_is_not_an_archive() {
        let dir = scratch_dir("garbage");
        let path = dir.join("backup_20261019031500.zip");
        assert!(std::fs::write(&path, b"truncated transfer").is_ok());

        let result = ZipArchiveCodec::new().inspect(&path).await;

        assert!(matches!(result, Err(AppError::Artifact(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn seal_keeps_dump_when_archive_cannot_be_written() {
        let dir = scratch_dir("unwritable");
        let dump_path = dir.join("callbacklog_20261019031500.sql");
        assert!(std::fs::write(&dump_path, b"-- dump").is_ok());
        let dump = ArtifactHandle {
            local_path: dump_path.clone(),
            size_bytes: 7,
            scope: ArtifactScope::Full,
            sha256: None,
        };

        let result = ZipArchiveCodec::new()
            .seal(dump, &dir.join("missing").join("out.zip"))
            .await;

        assert!(matches!(result, Err(AppError::Artifact(_))));
        assert!(dump_path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn dump_removal_failure_is_reported() {
        let dir = scratch_dir("remove_failure");
        let stuck = dir.join("callbacklog_20261019031500.sql");
        assert!(std::fs::create_dir_all(&stuck).is_ok());

        let result = remove_dump(&stuck).await;

        assert!(matches!(
            result,
            Err(AppError::Artifact(ref message)) if message.contains("could not be removed")
        ));
        assert!(stuck.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
