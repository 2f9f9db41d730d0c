//! prunevault backup runner.

#![forbid(unsafe_code)]

mod runner_config;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use prunevault_application::{
    ArchiveCodec, ArtifactProducer, ArtifactStatus, BackupOrchestrator, BackupSettings,
    BatchPurger, CleanupStatus, DumpTool, LocalArtifactProducer, PurgeStatus,
    RemoteArtifactProducer, RemoteSettings, RunOutcome, RunReport,
};
use prunevault_core::{AppError, AppResult, RunId};
use prunevault_domain::SqlIdentifier;
use prunevault_infrastructure::{
    MySqlBatchDeleter, MysqldumpTool, OpenSshRemoteChannel, ZipArchiveCodec,
};
use tracing::{Instrument, error, info, info_span, warn};

use crate::runner_config::{BackupMode, RunnerConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(outcome) => exit_code(outcome),
        Err(error) => {
            error!(error = %error, "backup run did not start");
            ExitCode::from(1)
        }
    }
}

fn exit_code(outcome: RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Succeeded => ExitCode::SUCCESS,
        RunOutcome::Degraded => ExitCode::from(2),
        RunOutcome::Aborted => ExitCode::from(1),
    }
}

async fn run() -> AppResult<RunOutcome> {
    let config = RunnerConfig::load()?;
    ensure_dir(&config.staging_dir).await?;
    ensure_dir(&config.archive_dir).await?;

    let deleter = MySqlBatchDeleter::connect(&config.database).await?;
    let purger = BatchPurger::new(
        Arc::new(deleter.clone()),
        config.batch_size,
        config.batch_pause,
    )?;

    let dump_tool: Arc<dyn DumpTool> = Arc::new(MysqldumpTool::new(
        config.mysqldump_path.clone(),
        config.database.clone(),
    ));
    let archive_codec: Arc<dyn ArchiveCodec> = Arc::new(ZipArchiveCodec::new());

    let producer = match &config.mode {
        BackupMode::Local => ArtifactProducer::Local(LocalArtifactProducer::new(
            dump_tool,
            archive_codec,
            config.staging_dir.clone(),
            config.archive_dir.clone(),
        )),
        BackupMode::Remote {
            credentials,
            work_root,
        } => ArtifactProducer::Remote(RemoteArtifactProducer::new(
            Arc::new(OpenSshRemoteChannel::new(config.staging_dir.clone())),
            dump_tool,
            archive_codec,
            RemoteSettings {
                credentials: credentials.clone(),
                work_root: work_root.clone(),
            },
            config.staging_dir.clone(),
            config.archive_dir.clone(),
        )),
    };

    let settings = BackupSettings {
        dataset: SqlIdentifier::new(config.database.database())?,
        partitions: config.partitions.clone(),
        retention: config.retention.clone(),
        age_column: config.age_column.clone(),
    };
    let orchestrator = BackupOrchestrator::new(settings, producer, purger);

    let run_id = RunId::new();
    info!(
        run_id = %run_id,
        mode = config.mode.as_str(),
        dataset = config.database.database(),
        partitions = config.partitions.len(),
        batch_size = config.batch_size,
        "backup run started"
    );

    let report = orchestrator
        .run(run_id, Utc::now())
        .instrument(info_span!("backup_run", run_id = %run_id))
        .await;
    deleter.close().await;

    log_report(&report);
    if let Some(path) = &config.report_path {
        if let Err(error) = write_report(path, &report).await {
            warn!(error = %error, path = %path.display(), "failed to write run report");
        }
    }

    Ok(report.outcome)
}

async fn ensure_dir(path: &Path) -> AppResult<()> {
    tokio::fs::create_dir_all(path).await.map_err(|error| {
        AppError::Configuration(format!(
            "failed to create directory '{}': {error}",
            path.display()
        ))
    })
}

fn artifact_label(status: &ArtifactStatus) -> &'static str {
    match status {
        ArtifactStatus::NotAttempted => "not_attempted",
        ArtifactStatus::Remote { .. } => "remote",
        ArtifactStatus::Produced { .. } => "produced",
        ArtifactStatus::Failed { .. } => "failed",
    }
}

fn log_report(report: &RunReport) {
    for partition in &report.partitions {
        match (&partition.artifact, &partition.purge) {
            (ArtifactStatus::Failed { message }, _) => warn!(
                partition = %partition.partition,
                error = %message,
                "partition backup failed, rows kept"
            ),
            (_, PurgeStatus::Failed { message }) => warn!(
                partition = %partition.partition,
                error = %message,
                "partition purge failed"
            ),
            (artifact, PurgeStatus::Completed { result }) => info!(
                partition = %partition.partition,
                retention_days = partition.retention_days.get(),
                cutoff = %partition.cutoff.sql_literal(),
                artifact = artifact_label(artifact),
                rows_deleted = result.rows_deleted,
                batches = result.batches,
                "partition purged"
            ),
            (artifact, PurgeStatus::NotAttempted) => info!(
                partition = %partition.partition,
                artifact = artifact_label(artifact),
                "partition not purged"
            ),
        }
    }

    if let CleanupStatus::Failed { message } = &report.cleanup {
        warn!(error = %message, "remote cleanup failed, leftovers remain");
    }
    for warning in &report.warnings {
        warn!(warning = %warning, "run warning");
    }

    match report.outcome {
        RunOutcome::Succeeded => info!(
            run_id = %report.run_id,
            stamp = %report.stamp,
            rows_deleted = report.rows_deleted(),
            "backup run succeeded"
        ),
        RunOutcome::Degraded => warn!(
            run_id = %report.run_id,
            stamp = %report.stamp,
            rows_deleted = report.rows_deleted(),
            failed_partitions = report.failed_partitions().len(),
            "backup run finished with failed partitions"
        ),
        RunOutcome::Aborted => error!(
            run_id = %report.run_id,
            stamp = %report.stamp,
            phase = report.final_phase.as_str(),
            reason = report.abort_reason.as_deref().unwrap_or("unknown"),
            "backup run aborted"
        ),
    }
}

async fn write_report(path: &Path, report: &RunReport) -> AppResult<()> {
    let body = serde_json::to_vec_pretty(report)
        .map_err(|error| AppError::Internal(format!("failed to serialize run report: {error}")))?;

    tokio::fs::write(path, body).await.map_err(|error| {
        AppError::Internal(format!(
            "failed to write run report '{}': {error}",
            path.display()
        ))
    })
}
