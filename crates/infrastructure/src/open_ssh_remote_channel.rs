//! Remote sessions over the system OpenSSH client.
//!
//! `connect` authenticates once and leaves a control master in the
//! background. Every command and transfer of the session reuses its socket,
//! and `close` asks the master to exit.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use prunevault_application::{CommandOutput, RemoteChannel, RemoteSession};
use prunevault_core::{AppError, AppResult, RemoteCredentials};

/// ssh exits with this status when the connection itself failed.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Opens control-master sessions with `ssh` and transfers files with `scp`.
#[derive(Debug, Clone)]
pub struct OpenSshRemoteChannel {
    ssh_program: String,
    scp_program: String,
    control_dir: PathBuf,
    connect_timeout_secs: u32,
}

impl OpenSshRemoteChannel {
    /// Creates a channel that keeps control sockets in `control_dir`.
    #[must_use]
    pub fn new(control_dir: PathBuf) -> Self {
        Self {
            ssh_program: "ssh".to_owned(),
            scp_program: "scp".to_owned(),
            control_dir,
            connect_timeout_secs: 15,
        }
    }

    /// Overrides the `ssh` and `scp` executables.
    #[must_use]
    pub fn with_programs(mut self, ssh: impl Into<String>, scp: impl Into<String>) -> Self {
        self.ssh_program = ssh.into();
        self.scp_program = scp.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SshTarget {
    destination: String,
    port: u16,
    identity_file: Option<String>,
    control_path: PathBuf,
}

impl SshTarget {
    fn from_credentials(credentials: &RemoteCredentials, control_dir: &Path) -> Self {
        Self {
            destination: credentials.destination(),
            port: credentials.port(),
            identity_file: credentials.identity_file().map(str::to_owned),
            control_path: control_dir.join(format!("ssh-{}.sock", std::process::id())),
        }
    }

    fn shared_options(&self) -> Vec<String> {
        let mut options = vec![
            "-o".to_owned(),
            "BatchMode=yes".to_owned(),
            "-o".to_owned(),
            format!("ControlPath={}", self.control_path.display()),
        ];
        if let Some(identity_file) = &self.identity_file {
            options.push("-i".to_owned());
            options.push(identity_file.clone());
        }
        options
    }

    fn master_arguments(&self, connect_timeout_secs: u32, log_path: &Path) -> Vec<String> {
        let mut arguments = vec![
            "-M".to_owned(),
            "-N".to_owned(),
            "-f".to_owned(),
            "-E".to_owned(),
            log_path.display().to_string(),
            "-o".to_owned(),
            format!("ConnectTimeout={connect_timeout_secs}"),
        ];
        arguments.extend(self.shared_options());
        arguments.push("-p".to_owned());
        arguments.push(self.port.to_string());
        arguments.push(self.destination.clone());
        arguments
    }

    fn command_arguments(&self, command: &str) -> Vec<String> {
        let mut arguments = self.shared_options();
        arguments.push("-p".to_owned());
        arguments.push(self.port.to_string());
        arguments.push(self.destination.clone());
        arguments.push(command.to_owned());
        arguments
    }

    fn exit_arguments(&self) -> Vec<String> {
        vec![
            "-o".to_owned(),
            format!("ControlPath={}", self.control_path.display()),
            "-O".to_owned(),
            "exit".to_owned(),
            self.destination.clone(),
        ]
    }

    fn copy_arguments(&self, source: String, target: String) -> Vec<String> {
        let mut arguments = vec!["-q".to_owned()];
        arguments.extend(self.shared_options());
        arguments.push("-P".to_owned());
        arguments.push(self.port.to_string());
        arguments.push(source);
        arguments.push(target);
        arguments
    }

    fn remote_spec(&self, remote_path: &str) -> String {
        format!("{}:{remote_path}", self.destination)
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[async_trait]
impl RemoteChannel for OpenSshRemoteChannel {
    async fn connect(&self, credentials: &RemoteCredentials) -> AppResult<Box<dyn RemoteSession>> {
        tokio::fs::create_dir_all(&self.control_dir)
            .await
            .map_err(|error| {
                AppError::RemoteConnection(format!(
                    "failed to create control directory '{}': {error}",
                    self.control_dir.display()
                ))
            })?;

        let target = SshTarget::from_credentials(credentials, &self.control_dir);
        let log_path = self
            .control_dir
            .join(format!("ssh-{}.log", std::process::id()));

        // The master forks into the background, so its stdio must not be
        // piped or waiting on it would never finish.
        let status = Command::new(self.ssh_program.as_str())
            .args(target.master_arguments(self.connect_timeout_secs, &log_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        let log = tokio::fs::read_to_string(&log_path)
            .await
            .unwrap_or_default();
        let _ = tokio::fs::remove_file(&log_path).await;

        match status {
            Ok(status) if status.success() => {
                info!(
                    destination = %target.destination,
                    port = target.port,
                    "remote session opened"
                );
                Ok(Box::new(OpenSshSession {
                    ssh_program: self.ssh_program.clone(),
                    scp_program: self.scp_program.clone(),
                    target,
                    closed: false,
                }))
            }
            Ok(status) => Err(AppError::RemoteConnection(format!(
                "ssh to {} exited with status {}: {}",
                target.destination,
                exit_code(status),
                log.trim()
            ))),
            Err(error) => Err(AppError::RemoteConnection(format!(
                "failed to start '{}': {error}",
                self.ssh_program
            ))),
        }
    }
}

/// One control-master session.
pub struct OpenSshSession {
    ssh_program: String,
    scp_program: String,
    target: SshTarget,
    closed: bool,
}

impl OpenSshSession {
    async fn copy(&self, source: String, target: String, description: &str) -> AppResult<()> {
        let output = Command::new(self.scp_program.as_str())
            .args(self.target.copy_arguments(source, target))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| {
                AppError::RemoteTransfer(format!(
                    "failed to start '{}': {error}",
                    self.scp_program
                ))
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(AppError::RemoteTransfer(format!(
            "{description} exited with status {}: {}",
            exit_code(output.status),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    async fn run(&self, command: &str) -> AppResult<CommandOutput> {
        debug!(destination = %self.target.destination, command, "running remote command");

        let output = Command::new(self.ssh_program.as_str())
            .args(self.target.command_arguments(command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| {
                AppError::RemoteConnection(format!(
                    "failed to start '{}': {error}",
                    self.ssh_program
                ))
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: exit_code(output.status),
        };

        match result.exit_code {
            0 => Ok(result),
            SSH_CONNECTION_FAILURE => Err(AppError::RemoteConnection(format!(
                "lost connection to {}: {}",
                self.target.destination,
                result.stderr.trim()
            ))),
            exit_code => Err(AppError::RemoteCommand {
                exit_code,
                stderr: result.stderr.trim().to_owned(),
            }),
        }
    }

    async fn put_file(&self, local_path: &Path, remote_path: &str) -> AppResult<()> {
        self.copy(
            local_path.display().to_string(),
            self.target.remote_spec(remote_path),
            "upload",
        )
        .await
    }

    async fn get_file(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                AppError::RemoteTransfer(format!(
                    "failed to create '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        self.copy(
            self.target.remote_spec(remote_path),
            local_path.display().to_string(),
            "download",
        )
        .await
    }

    async fn close(&mut self) -> AppResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let output = Command::new(self.ssh_program.as_str())
            .args(self.target.exit_arguments())
            .stdin(Stdio::null())
            .output()
            .await;
        let _ = tokio::fs::remove_file(&self.target.control_path).await;

        match output {
            Ok(output) if output.status.success() => {
                info!(destination = %self.target.destination, "remote session closed");
                Ok(())
            }
            Ok(output) => Err(AppError::RemoteConnection(format!(
                "control master for {} exited with status {}: {}",
                self.target.destination,
                exit_code(output.status),
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Err(error) => Err(AppError::RemoteConnection(format!(
                "failed to start '{}': {error}",
                self.ssh_program
            ))),
        }
    }
}

impl Drop for OpenSshSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        warn!(destination = %self.target.destination, "remote session dropped without close");
        let _ = std::process::Command::new(self.ssh_program.as_str())
            .args(self.target.exit_arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use prunevault_application::RemoteChannel;
    use prunevault_core::{AppError, RemoteCredentials};

    use super::{OpenSshRemoteChannel, SshTarget};

    fn target(identity_file: Option<&str>) -> SshTarget {
        let Ok(credentials) = RemoteCredentials::new(
            "db1.internal",
            2222,
            "backup",
            identity_file.map(str::to_owned),
        ) else {
            panic!("valid credentials");
        };
        let mut target = SshTarget::from_credentials(&credentials, Path::new("/run/prunevault"));
        target.control_path = PathBuf::from("/run/prunevault/ssh.sock");
        target
    }

    #[test]
    fn master_arguments_start_a_background_control_master() {
        let arguments = target(Some("/etc/prunevault/id_ed25519"))
            .master_arguments(15, Path::new("/run/prunevault/ssh.log"));

        assert_eq!(
            arguments,
            [
                "-M",
                "-N",
                "-f",
                "-E",
                "/run/prunevault/ssh.log",
                "-o",
                "ConnectTimeout=15",
                "-o",
                "BatchMode=yes",
                "-o",
                "ControlPath=/run/prunevault/ssh.sock",
                "-i",
                "/etc/prunevault/id_ed25519",
                "-p",
                "2222",
                "backup@db1.internal",
            ]
        );
    }

    #[test]
    fn commands_reuse_the_control_socket() {
        let arguments = target(None).command_arguments("sh 'backup_script_20261019031500.sh'");

        assert_eq!(
            arguments,
            [
                "-o",
                "BatchMode=yes",
                "-o",
                "ControlPath=/run/prunevault/ssh.sock",
                "-p",
                "2222",
                "backup@db1.internal",
                "sh 'backup_script_20261019031500.sh'",
            ]
        );
    }

    #[test]
    fn copies_use_scp_port_flag() {
        let target = target(None);
        let arguments = target.copy_arguments(
            target.remote_spec("/var/backups/backup_20261019031500.zip"),
            "/srv/archive/backup_20261019031500.zip".to_owned(),
        );

        assert_eq!(arguments.first().map(String::as_str), Some("-q"));
        assert!(arguments.windows(2).any(|pair| pair == ["-P", "2222"]));
        assert_eq!(
            arguments.get(arguments.len() - 2).map(String::as_str),
            Some("backup@db1.internal:/var/backups/backup_20261019031500.zip")
        );
    }

    #[test]
    fn exit_arguments_stop_the_master() {
        assert_eq!(
            target(None).exit_arguments(),
            [
                "-o",
                "ControlPath=/run/prunevault/ssh.sock",
                "-O",
                "exit",
                "backup@db1.internal",
            ]
        );
    }

    #[tokio::test]
    async fn missing_ssh_program_is_a_connection_error() {
        let Ok(credentials) = RemoteCredentials::new("db1.internal", 22, "backup", None) else {
            panic!("valid credentials");
        };
        let channel = OpenSshRemoteChannel::new(std::env::temp_dir().join(format!(
            "prunevault-ssh-{}",
            std::process::id()
        )))
        .with_programs("/nonexistent/prunevault-ssh", "/nonexistent/prunevault-scp");

        let result = channel.connect(&credentials).await;

        assert!(matches!(result, Err(AppError::RemoteConnection(_))));
    }
}
