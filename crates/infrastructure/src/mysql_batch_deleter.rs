use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{Executor, MySqlPool};
use tracing::debug;

use prunevault_application::BatchDeleter;
use prunevault_core::{AppError, AppResult, DatabaseCredentials};
use prunevault_domain::{AgePredicate, SqlIdentifier};

/// MySQL-backed batch deleter.
///
/// Sessions run in UTC so the cutoff literal compares the same way here as in
/// the dump's `--where` filter.
#[derive(Clone)]
pub struct MySqlBatchDeleter {
    pool: MySqlPool,
}

impl MySqlBatchDeleter {
    /// Creates a deleter with the provided connection pool.
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Opens a single-connection pool for the dataset.
    pub async fn connect(credentials: &DatabaseCredentials) -> AppResult<Self> {
        let options = MySqlConnectOptions::new()
            .host(credentials.host())
            .port(credentials.port())
            .username(credentials.user())
            .password(credentials.password().expose())
            .database(credentials.database());

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .after_connect(|connection, _meta| {
                Box::pin(async move {
                    connection.execute("SET time_zone = '+00:00'").await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to connect to database '{}' at {}:{}: {error}",
                    credentials.database(),
                    credentials.host(),
                    credentials.port()
                ))
            })?;

        Ok(Self::new(pool))
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl BatchDeleter for MySqlBatchDeleter {
    async fn delete_batch(
        &self,
        partition: &SqlIdentifier,
        predicate: &AgePredicate,
        limit: u64,
    ) -> AppResult<u64> {
        let statement = format!(
            "DELETE FROM {} WHERE {} < ? LIMIT ?",
            partition.quoted(),
            predicate.column().quoted()
        );

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Purge(format!("failed to begin delete on '{partition}': {error}"))
        })?;

        let result = sqlx::query(statement.as_str())
            .bind(predicate.cutoff().sql_literal())
            .bind(limit)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Purge(format!("failed to delete batch from '{partition}': {error}"))
            })?;

        transaction.commit().await.map_err(|error| {
            AppError::Purge(format!("failed to commit delete on '{partition}': {error}"))
        })?;

        debug!(
            partition = %partition,
            rows = result.rows_affected(),
            "committed delete batch"
        );

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests;
