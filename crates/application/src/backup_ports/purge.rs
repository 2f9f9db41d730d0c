use async_trait::async_trait;
use prunevault_core::AppResult;
use prunevault_domain::{AgePredicate, SqlIdentifier};

/// Port for deleting rows from the live dataset.
#[async_trait]
pub trait BatchDeleter: Send + Sync {
    /// Deletes at most `limit` rows of `partition` matching `predicate` and
    /// commits them. Returns the number of rows deleted.
    async fn delete_batch(
        &self,
        partition: &SqlIdentifier,
        predicate: &AgePredicate,
        limit: u64,
    ) -> AppResult<u64>;
}
