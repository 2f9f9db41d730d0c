//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod artifact;
mod partition;
mod retention;
mod run;

pub use artifact::{ArtifactHandle, ArtifactScope, RemoteLayout, RunStamp};
pub use partition::{PartitionSpec, SqlIdentifier};
pub use retention::{AgeCutoff, AgePredicate, RetentionDays, RetentionPolicy};
pub use run::{PurgeResult, RunPhase};
