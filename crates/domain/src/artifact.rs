use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::partition::SqlIdentifier;

/// Run timestamp used in every artifact and remote path, `YYYYMMDDHHMMSS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunStamp(String);

impl RunStamp {
    /// Formats the run start instant.
    #[must_use]
    pub fn from_datetime(started_at: DateTime<Utc>) -> Self {
        Self(started_at.format("%Y%m%d%H%M%S").to_string())
    }

    /// Returns the formatted stamp.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RunStamp {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// What an artifact contains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "partition")]
pub enum ArtifactScope {
    /// The whole dataset, unfiltered.
    Full,
    /// The purge-eligible rows of one partition.
    Partition(SqlIdentifier),
}

impl ArtifactScope {
    /// Returns the file stem shared by the dump and its archive.
    ///
    /// `{dataset}_full_{stamp}` for the full scope, `{partition}_{stamp}`
    /// otherwise.
    #[must_use]
    pub fn file_stem(&self, dataset: &SqlIdentifier, stamp: &RunStamp) -> String {
        match self {
            Self::Full => format!("{dataset}_full_{stamp}"),
            Self::Partition(partition) => format!("{partition}_{stamp}"),
        }
    }

    /// Returns the dump file name.
    #[must_use]
    pub fn dump_file_name(&self, dataset: &SqlIdentifier, stamp: &RunStamp) -> String {
        format!("{}.sql", self.file_stem(dataset, stamp))
    }

    /// Returns the archive file name.
    #[must_use]
    pub fn archive_file_name(&self, dataset: &SqlIdentifier, stamp: &RunStamp) -> String {
        format!("{}.zip", self.file_stem(dataset, stamp))
    }

    /// Returns a short label for reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Full => "full".to_owned(),
            Self::Partition(partition) => partition.to_string(),
        }
    }
}

/// A file on local disk that holds a copy of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactHandle {
    /// Where the artifact lives on this host.
    pub local_path: PathBuf,
    /// File size at the time the handle was produced.
    pub size_bytes: u64,
    /// What the artifact contains.
    pub scope: ArtifactScope,
    /// Hex SHA-256 of the file, set once the artifact is sealed.
    pub sha256: Option<String>,
}

/// Remote working paths for one run.
///
/// Everything lives under `root`: the `backup_{stamp}/` working directory,
/// its `backup_{stamp}.zip` archive, the generated `backup_script_{stamp}.sh`
/// and the transient `backup_{stamp}.cnf` client option file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    root: String,
    stamp: RunStamp,
}

impl RemoteLayout {
    /// Creates the layout for one run.
    #[must_use]
    pub fn new(root: impl Into<String>, stamp: RunStamp) -> Self {
        let root = root.into();
        let root = root.trim_end_matches('/');
        Self {
            root: if root.is_empty() {
                ".".to_owned()
            } else {
                root.to_owned()
            },
            stamp,
        }
    }

    /// Returns the run stamp.
    #[must_use]
    pub fn stamp(&self) -> &RunStamp {
        &self.stamp
    }

    /// Returns the remote root directory.
    #[must_use]
    pub fn root(&self) -> &str {
        self.root.as_str()
    }

    /// Working directory name, relative to the root.
    #[must_use]
    pub fn work_dir_name(&self) -> String {
        format!("backup_{}", self.stamp)
    }

    /// Archive file name, relative to the root.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("backup_{}.zip", self.stamp)
    }

    /// Remote path of the working directory.
    #[must_use]
    pub fn work_dir(&self) -> String {
        format!("{}/{}", self.root, self.work_dir_name())
    }

    /// Remote path of the compressed working directory.
    #[must_use]
    pub fn archive_path(&self) -> String {
        format!("{}/{}", self.root, self.archive_name())
    }

    /// Generated script file name, relative to the root.
    #[must_use]
    pub fn script_name(&self) -> String {
        format!("backup_script_{}.sh", self.stamp)
    }

    /// Client option file name, relative to the root.
    #[must_use]
    pub fn option_file_name(&self) -> String {
        format!("backup_{}.cnf", self.stamp)
    }

    /// Remote path of the generated script.
    #[must_use]
    pub fn script_path(&self) -> String {
        format!("{}/{}", self.root, self.script_name())
    }

    /// Remote path of the client option file holding credentials.
    #[must_use]
    pub fn option_file_path(&self) -> String {
        format!("{}/{}", self.root, self.option_file_name())
    }

    /// Remote path of one dump inside the working directory.
    #[must_use]
    pub fn dump_path(&self, dump_file_name: &str) -> String {
        format!("{}/{dump_file_name}", self.work_dir())
    }

    /// Entry name of one dump inside the remote archive.
    #[must_use]
    pub fn archive_entry(&self, dump_file_name: &str) -> String {
        format!("{}/{dump_file_name}", self.work_dir_name())
    }
}
