//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod mysql_batch_deleter;
mod mysqldump_tool;
mod open_ssh_remote_channel;
mod zip_archive_codec;

pub use mysql_batch_deleter::MySqlBatchDeleter;
pub use mysqldump_tool::MysqldumpTool;
pub use open_ssh_remote_channel::{OpenSshRemoteChannel, OpenSshSession};
pub use zip_archive_codec::ZipArchiveCodec;
