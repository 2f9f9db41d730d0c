use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use prunevault_core::{AppError, AppResult, DatabaseCredentials, RemoteCredentials, Secret};
use prunevault_domain::{RetentionPolicy, SqlIdentifier};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupMode {
    Local,
    Remote {
        credentials: RemoteCredentials,
        work_root: String,
    },
}

impl BackupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote { .. } => "remote",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub database: DatabaseCredentials,
    pub partitions: Vec<SqlIdentifier>,
    pub retention: RetentionPolicy,
    pub age_column: SqlIdentifier,
    pub batch_size: u64,
    pub batch_pause: Duration,
    pub staging_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub mode: BackupMode,
    pub mysqldump_path: String,
    pub report_path: Option<PathBuf>,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl RunnerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(&|name| env::var(name).ok())
    }

    fn from_lookup(lookup: Lookup<'_>) -> AppResult<Self> {
        let database = DatabaseCredentials::new(
            required(lookup, "DB_HOST")?,
            parse_or(lookup, "DB_PORT", 3306_u16)?,
            required(lookup, "DB_USER")?,
            Secret::new(required(lookup, "DB_PASSWORD")?),
            required(lookup, "DB_NAME")?,
        )?;

        let partitions = parse_partitions(&required(lookup, "BACKUP_PARTITIONS")?)?;
        let retention = parse_retention(
            parse_or(lookup, "BACKUP_DEFAULT_RETENTION_DAYS", 7_i64)?,
            optional(lookup, "BACKUP_RETENTION").as_deref(),
        )?;
        retention.validate()?;

        let age_column = SqlIdentifier::new(
            optional(lookup, "BACKUP_AGE_COLUMN").unwrap_or_else(|| "created".to_owned()),
        )?;

        let batch_size = parse_or(lookup, "BACKUP_BATCH_SIZE", 1000_u64)?;
        if batch_size == 0 {
            return Err(AppError::Configuration(
                "BACKUP_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }
        let batch_pause =
            Duration::from_millis(parse_or(lookup, "BACKUP_BATCH_PAUSE_MS", 500_u64)?);

        let home = optional(lookup, "HOME");
        let staging_dir = expand_home(
            optional(lookup, "BACKUP_STAGING_DIR").unwrap_or_else(|| "~/backup".to_owned()),
            home.as_deref(),
        )?;
        let archive_dir = expand_home(
            optional(lookup, "BACKUP_ARCHIVE_DIR").unwrap_or_else(|| "~/backup_archive".to_owned()),
            home.as_deref(),
        )?;
        if staging_dir == archive_dir {
            return Err(AppError::Configuration(
                "BACKUP_STAGING_DIR and BACKUP_ARCHIVE_DIR must differ".to_owned(),
            ));
        }

        let mode = match optional(lookup, "BACKUP_MODE")
            .unwrap_or_else(|| "local".to_owned())
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => BackupMode::Local,
            "remote" => BackupMode::Remote {
                credentials: RemoteCredentials::new(
                    required(lookup, "REMOTE_HOST")?,
                    parse_or(lookup, "REMOTE_PORT", 22_u16)?,
                    required(lookup, "REMOTE_USER")?,
                    optional(lookup, "REMOTE_IDENTITY_FILE"),
                )?,
                work_root: optional(lookup, "REMOTE_WORK_ROOT").unwrap_or_else(|| ".".to_owned()),
            },
            other => {
                return Err(AppError::Configuration(format!(
                    "BACKUP_MODE must be 'local' or 'remote', got '{other}'"
                )));
            }
        };

        Ok(Self {
            database,
            partitions,
            retention,
            age_column,
            batch_size,
            batch_pause,
            staging_dir,
            archive_dir,
            mode,
            mysqldump_path: optional(lookup, "MYSQLDUMP_PATH")
                .unwrap_or_else(|| "mysqldump".to_owned()),
            report_path: optional(lookup, "BACKUP_REPORT_PATH").map(PathBuf::from),
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn optional(lookup: Lookup<'_>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required(lookup: Lookup<'_>, name: &str) -> AppResult<String> {
    optional(lookup, name).ok_or_else(|| AppError::Configuration(format!("{name} is required")))
}

fn parse_or<T>(lookup: Lookup<'_>, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, name) {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Configuration(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn parse_partitions(value: &str) -> AppResult<Vec<SqlIdentifier>> {
    let partitions = value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(SqlIdentifier::new)
        .collect::<AppResult<Vec<_>>>()?;

    if partitions.is_empty() {
        return Err(AppError::Configuration(
            "BACKUP_PARTITIONS must name at least one table".to_owned(),
        ));
    }

    Ok(partitions)
}

/// Parses `table=days` pairs separated by commas.
fn parse_retention(default_days: i64, overrides: Option<&str>) -> AppResult<RetentionPolicy> {
    let mut policy = RetentionPolicy::new(default_days);

    for pair in overrides
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
    {
        let Some((name, days)) = pair.split_once('=') else {
            return Err(AppError::Configuration(format!(
                "invalid BACKUP_RETENTION entry '{pair}', expected table=days"
            )));
        };
        let days = days.trim().parse::<i64>().map_err(|error| {
            AppError::Configuration(format!(
                "invalid BACKUP_RETENTION days for '{}': {error}",
                name.trim()
            ))
        })?;
        policy = policy.with_override(name.trim(), days);
    }

    Ok(policy)
}

fn expand_home(value: String, home: Option<&str>) -> AppResult<PathBuf> {
    let Some(rest) = value.strip_prefix("~/") else {
        return Ok(PathBuf::from(value));
    };

    let home = home.ok_or_else(|| {
        AppError::Configuration(format!("HOME is required to expand '{value}'"))
    })?;
    Ok(PathBuf::from(home).join(rest))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use prunevault_core::AppError;

    use super::{BackupMode, RunnerConfig};

    fn load(pairs: &[(&str, &str)]) -> Result<RunnerConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        RunnerConfig::from_lookup(&|name| values.get(name).cloned())
    }

    const BASE: [(&str, &str); 6] = [
        ("DB_HOST", "db.internal"),
        ("DB_USER", "backup"),
        ("DB_PASSWORD", "secret"),
        ("DB_NAME", "shop"),
        ("BACKUP_PARTITIONS", "callbacklog, ordersnapshot,sessionlog"),
        ("HOME", "/home/backup"),
    ];

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let Ok(config) = load(&BASE) else {
            panic!("valid config");
        };

        assert_eq!(config.database.port(), 3306);
        assert_eq!(config.partitions.len(), 3);
        assert_eq!(config.age_column.as_str(), "created");
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.batch_pause, Duration::from_millis(500));
        assert_eq!(config.staging_dir, PathBuf::from("/home/backup/backup"));
        assert_eq!(
            config.archive_dir,
            PathBuf::from("/home/backup/backup_archive")
        );
        assert_eq!(config.mode, BackupMode::Local);
        assert_eq!(config.mysqldump_path, "mysqldump");
        assert!(config.report_path.is_none());
        assert!(matches!(config.retention.resolve("sessionlog"), Ok(days) if days.get() == 7));
    }

    #[test]
    fn retention_overrides_are_parsed() {
        let mut pairs = BASE.to_vec();
        pairs.push(("BACKUP_RETENTION", "callbacklog=1, ordersnapshot=60"));

        let Ok(config) = load(&pairs) else {
            panic!("valid config");
        };

        assert!(matches!(config.retention.resolve("callbacklog"), Ok(days) if days.get() == 1));
        assert!(matches!(
            config.retention.resolve("ordersnapshot"),
            Ok(days) if days.get() == 60
        ));
    }

    #[test]
    fn non_positive_retention_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("BACKUP_RETENTION", "callbacklog=0"));

        assert!(matches!(load(&pairs), Err(AppError::Configuration(_))));
    }

    #[test]
    fn malformed_retention_entry_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("BACKUP_RETENTION", "callbacklog"));

        assert!(matches!(
            load(&pairs),
            Err(AppError::Configuration(message)) if message.contains("table=days")
        ));
    }

    #[test]
    fn missing_password_is_rejected() {
        let pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(name, _)| *name != "DB_PASSWORD")
            .collect();

        assert!(matches!(
            load(&pairs),
            Err(AppError::Configuration(message)) if message == "DB_PASSWORD is required"
        ));
    }

    #[test]
    fn remote_mode_requires_a_target() {
        let mut pairs = BASE.to_vec();
        pairs.push(("BACKUP_MODE", "remote"));
        assert!(matches!(load(&pairs), Err(AppError::Configuration(_))));

        pairs.push(("REMOTE_HOST", "db1.internal"));
        pairs.push(("REMOTE_USER", "backup"));
        pairs.push(("REMOTE_WORK_ROOT", "/var/backups"));
        let Ok(config) = load(&pairs) else {
            panic!("valid config");
        };
        let BackupMode::Remote {
            credentials,
            work_root,
        } = config.mode
        else {
            panic!("expected remote mode");
        };
        assert_eq!(credentials.destination(), "backup@db1.internal");
        assert_eq!(credentials.port(), 22);
        assert_eq!(work_root, "/var/backups");
    }

    #[test]
    fn unknown_mode_and_zero_batch_size_are_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("BACKUP_MODE", "cloud"));
        assert!(matches!(load(&pairs), Err(AppError::Configuration(_))));

        let mut pairs = BASE.to_vec();
        pairs.push(("BACKUP_BATCH_SIZE", "0"));
        assert!(matches!(load(&pairs), Err(AppError::Configuration(_))));
    }

    #[test]
    fn invalid_partition_name_is_rejected() {
        let mut pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(name, _)| *name != "BACKUP_PARTITIONS")
            .collect();
        pairs.push(("BACKUP_PARTITIONS", "callbacklog; DROP TABLE users"));

        assert!(matches!(load(&pairs), Err(AppError::Configuration(_))));
    }
}
