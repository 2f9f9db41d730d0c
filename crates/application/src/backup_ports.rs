mod archive;
mod dump;
mod purge;
mod remote;

pub use archive::{ArchiveCodec, ArchiveEntry, ArchiveManifest};
pub use dump::{DumpRequest, DumpTool};
pub use purge::BatchDeleter;
pub use remote::{CommandOutput, RemoteChannel, RemoteSession};
