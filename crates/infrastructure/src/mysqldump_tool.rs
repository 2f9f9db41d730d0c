//! `mysqldump` adapter for local dumps and remote script rendering.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use prunevault_application::{DumpRequest, DumpTool, shell_quote};
use prunevault_core::{AppError, AppResult, DatabaseCredentials};
use prunevault_domain::{ArtifactHandle, ArtifactScope};

/// Runs `mysqldump` with the password passed through the environment.
#[derive(Debug, Clone)]
pub struct MysqldumpTool {
    program: String,
    credentials: DatabaseCredentials,
}

impl MysqldumpTool {
    /// Creates a dump tool invoking `program`.
    #[must_use]
    pub fn new(program: impl Into<String>, credentials: DatabaseCredentials) -> Self {
        Self {
            program: program.into(),
            credentials,
        }
    }

    /// Arguments selecting what to dump. Connection details are not included.
    fn scope_arguments(&self, request: &DumpRequest) -> Vec<String> {
        let mut arguments = vec![self.credentials.database().to_owned()];
        if let ArtifactScope::Partition(partition) = &request.scope {
            arguments.push(partition.to_string());
        }
        if let Some(predicate) = &request.predicate {
            arguments.push(format!("--where={}", predicate.where_clause()));
        }
        arguments
    }

    fn connection_arguments(&self) -> Vec<String> {
        vec![
            format!("--host={}", self.credentials.host()),
            format!("--port={}", self.credentials.port()),
            format!("--user={}", self.credentials.user()),
        ]
    }

    fn option_file_body(&self) -> String {
        format!(
            "[client]\nhost={}\nport={}\nuser={}\npassword=\"{}\"\n",
            self.credentials.host(),
            self.credentials.port(),
            self.credentials.user(),
            escape_option_value(self.credentials.password().expose())
        )
    }
}

fn escape_option_value(value: &str) -> String {
    value.replace('\\', r"\\").replace('"', "\\\"")
}

#[async_trait]
impl DumpTool for MysqldumpTool {
    async fn dump(&self, request: &DumpRequest, output: &Path) -> AppResult<ArtifactHandle> {
        let file = tokio::fs::File::create(output).await.map_err(|error| {
            AppError::Artifact(format!(
                "failed to create dump file '{}': {error}",
                output.display()
            ))
        })?;

        debug!(
            scope = %request.scope.label(),
            output = %output.display(),
            "starting mysqldump"
        );

        let spawned = Command::new(self.program.as_str())
            .args(self.connection_arguments())
            .args(self.scope_arguments(request))
            .env("MYSQL_PWD", self.credentials.password().expose())
            .stdin(Stdio::null())
            .stdout(file.into_std().await)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let result = match spawned {
            Ok(child) => child.wait_with_output().await,
            Err(error) => Err(error),
        };

        let output_status = match result {
            Ok(status) => status,
            Err(error) => {
                let _ = tokio::fs::remove_file(output).await;
                return Err(AppError::Artifact(format!(
                    "failed to start '{}': {error}",
                    self.program
                )));
            }
        };

        if !output_status.status.success() {
            let _ = tokio::fs::remove_file(output).await;
            return Err(AppError::Artifact(format!(
                "mysqldump exited with {}: {}",
                output_status.status,
                String::from_utf8_lossy(&output_status.stderr).trim()
            )));
        }

        let size_bytes = tokio::fs::metadata(output)
            .await
            .map(|metadata| metadata.len())
            .map_err(|error| {
                AppError::Artifact(format!(
                    "failed to stat dump file '{}': {error}",
                    output.display()
                ))
            })?;

        if size_bytes == 0 {
            let _ = tokio::fs::remove_file(output).await;
            return Err(AppError::Artifact(format!(
                "mysqldump wrote nothing to '{}'",
                output.display()
            )));
        }

        info!(
            scope = %request.scope.label(),
            size_bytes,
            "dump written"
        );

        Ok(ArtifactHandle {
            local_path: output.to_path_buf(),
            size_bytes,
            scope: request.scope.clone(),
            sha256: None,
        })
    }

    fn shell_command(&self, request: &DumpRequest, option_file: &str) -> String {
        // --defaults-extra-file must come first on the command line.
        let mut words = vec![
            shell_quote(self.program.as_str()),
            shell_quote(&format!("--defaults-extra-file={option_file}")),
        ];
        words.extend(
            self.scope_arguments(request)
                .iter()
                .map(|argument| shell_quote(argument)),
        );
        words.join(" ")
    }

    async fn write_option_file(&self, path: &Path) -> AppResult<()> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await.map_err(|error| {
            AppError::Artifact(format!(
                "failed to create option file '{}': {error}",
                path.display()
            ))
        })?;

        file.write_all(self.option_file_body().as_bytes())
            .await
            .map_err(|error| {
                AppError::Artifact(format!(
                    "failed to write option file '{}': {error}",
                    path.display()
                ))
            })?;
        file.flush().await.map_err(|error| {
            AppError::Artifact(format!(
                "failed to flush option file '{}': {error}",
                path.display()
            ))
        })
    }

    async fn remove_option_file(&self, path: &Path) -> AppResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(AppError::Artifact(format!(
                "failed to remove option file '{}': {error}",
                path.display()
            ))),
        }
    }
}
