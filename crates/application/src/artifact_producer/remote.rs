use std::path::{Path, PathBuf};
use std::sync::Arc;

use prunevault_core::{AppError, AppResult};
use prunevault_domain::{ArtifactHandle, ArtifactScope, RemoteLayout, RunStamp, SqlIdentifier};

use super::{
    PlannedDump, PulledArchive, RemoteArtifactProducer, RemoteScript, RemoteSettings, shell_quote,
};
use crate::backup_ports::{ArchiveCodec, ArchiveManifest, DumpTool, RemoteChannel, RemoteSession};

impl RemoteArtifactProducer {
    /// Creates a remote producer.
    ///
    /// `staging_dir` holds the script and option file between rendering and
    /// upload; `archive_dir` receives the pulled archive.
    #[must_use]
    pub fn new(
        channel: Arc<dyn RemoteChannel>,
        dump_tool: Arc<dyn DumpTool>,
        archive_codec: Arc<dyn ArchiveCodec>,
        settings: RemoteSettings,
        staging_dir: PathBuf,
        archive_dir: PathBuf,
    ) -> Self {
        Self {
            channel,
            dump_tool,
            archive_codec,
            settings,
            staging_dir,
            archive_dir,
        }
    }

    /// Returns the remote settings.
    #[must_use]
    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    /// Returns the remote layout for a run.
    #[must_use]
    pub fn layout(&self, stamp: &RunStamp) -> RemoteLayout {
        RemoteLayout::new(self.settings.work_root.as_str(), stamp.clone())
    }

    /// Opens a session on the remote host.
    pub async fn connect(&self) -> AppResult<Box<dyn RemoteSession>> {
        self.channel
            .connect(&self.settings.credentials)
            .await
            .map_err(|error| match error {
                AppError::RemoteConnection(_) => error,
                other => AppError::RemoteConnection(other.to_string()),
            })
    }

    /// Renders the script that dumps every planned scope on the remote host.
    #[must_use]
    pub fn render_script(
        &self,
        dataset: &SqlIdentifier,
        layout: &RemoteLayout,
        plan: &[PlannedDump],
    ) -> RemoteScript {
        RemoteScript::render(self.dump_tool.as_ref(), dataset, layout, plan)
    }

    /// Uploads and runs the dump script.
    ///
    /// Succeeds exactly when the script exits with status zero.
    pub async fn produce(
        &self,
        session: &dyn RemoteSession,
        dataset: &SqlIdentifier,
        layout: &RemoteLayout,
        plan: &[PlannedDump],
    ) -> AppResult<()> {
        let script = self.render_script(dataset, layout, plan);
        let local_script = self.staging_dir.join(&script.file_name);
        let local_options = self.staging_dir.join(layout.option_file_name());

        let uploaded = self
            .upload(session, layout, &script, &local_script, &local_options)
            .await;

        // Local copies are removed whatever the upload outcome.
        let _ = tokio::fs::remove_file(&local_script).await;
        let _ = self.dump_tool.remove_option_file(&local_options).await;
        if let Err(error) = uploaded {
            // The option file may already sit on the remote host.
            let _ = session
                .run(&format!("rm -f -- {}", shell_quote(&layout.option_file_path())))
                .await;
            return Err(error);
        }

        session
            .run(&format!("sh {}", shell_quote(&layout.script_path())))
            .await
            .map(|_| ())
    }

    async fn upload(
        &self,
        session: &dyn RemoteSession,
        layout: &RemoteLayout,
        script: &RemoteScript,
        local_script: &Path,
        local_options: &Path,
    ) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|error| {
                AppError::Artifact(format!(
                    "failed to create staging directory '{}': {error}",
                    self.staging_dir.display()
                ))
            })?;
        tokio::fs::write(local_script, script.body.as_bytes())
            .await
            .map_err(|error| {
                AppError::Artifact(format!(
                    "failed to write remote script '{}': {error}",
                    local_script.display()
                ))
            })?;
        self.dump_tool.write_option_file(local_options).await?;

        session
            .put_file(local_options, &layout.option_file_path())
            .await?;
        session.put_file(local_script, &layout.script_path()).await
    }

    /// Pulls the remote archive and confirms the local copy is readable and
    /// non-empty.
    pub async fn pull(
        &self,
        session: &dyn RemoteSession,
        layout: &RemoteLayout,
    ) -> AppResult<PulledArchive> {
        let local_path = self.archive_dir.join(layout.archive_name());
        let fetched = self.fetch(session, layout, &local_path).await;
        if fetched.is_err() {
            // An unconfirmed archive never stays under its final name.
            let _ = tokio::fs::remove_file(&local_path).await;
        }
        let manifest = fetched?;

        Ok(PulledArchive {
            handle: ArtifactHandle {
                local_path,
                size_bytes: manifest.size_bytes,
                scope: ArtifactScope::Full,
                sha256: Some(manifest.sha256.clone()),
            },
            manifest,
        })
    }

    async fn fetch(
        &self,
        session: &dyn RemoteSession,
        layout: &RemoteLayout,
        local_path: &Path,
    ) -> AppResult<ArchiveManifest> {
        session.get_file(&layout.archive_path(), local_path).await?;

        let manifest = self
            .archive_codec
            .inspect(local_path)
            .await
            .map_err(|error| {
                AppError::RemoteTransfer(format!(
                    "pulled archive '{}' is unreadable: {error}",
                    local_path.display()
                ))
            })?;

        if manifest.size_bytes == 0 {
            return Err(AppError::RemoteTransfer(format!(
                "pulled archive '{}' is empty",
                local_path.display()
            )));
        }

        Ok(manifest)
    }

    /// Removes the working directory, archive, script and option file from
    /// the remote host.
    pub async fn cleanup(
        &self,
        session: &dyn RemoteSession,
        layout: &RemoteLayout,
    ) -> AppResult<()> {
        let command = format!(
            "rm -rf -- {} {} {} {}",
            shell_quote(&layout.work_dir()),
            shell_quote(&layout.archive_path()),
            shell_quote(&layout.script_path()),
            shell_quote(&layout.option_file_path()),
        );

        session
            .run(&command)
            .await
            .map(|_| ())
            .map_err(|error| AppError::Cleanup(error.to_string()))
    }
}
