use chrono::{TimeZone, Utc};
use prunevault_application::BatchDeleter;
use prunevault_domain::{AgeCutoff, AgePredicate, RetentionDays, SqlIdentifier};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

use super::MySqlBatchDeleter;

async fn test_pool() -> Option<MySqlPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    match MySqlPoolOptions::new()
        .max_connections(1)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => Some(pool),
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    }
}

fn identifier(value: &str) -> SqlIdentifier {
    let Ok(identifier) = SqlIdentifier::new(value) else {
        panic!("valid identifier '{value}'");
    };
    identifier
}

#[tokio::test]
async fn delete_batch_removes_only_rows_older_than_cutoff() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let table = identifier(&format!("prunevault_purge_{}", std::process::id()));
    let setup = [
        "SET time_zone = '+00:00'".to_owned(),
        format!("DROP TABLE IF EXISTS {}", table.quoted()),
        format!(
            "CREATE TABLE {} (id INT AUTO_INCREMENT PRIMARY KEY, created DATETIME NOT NULL)",
            table.quoted()
        ),
        format!(
            "INSERT INTO {} (created) VALUES \
             ('2026-09-01 00:00:00'), ('2026-09-02 00:00:00'), ('2026-09-03 00:00:00'), \
             ('2026-10-18 00:00:00'), ('2026-10-19 00:00:00')",
            table.quoted()
        ),
    ];
    for statement in &setup {
        let executed = sqlx::query(statement.as_str()).execute(&pool).await;
        assert!(executed.is_ok(), "setup failed: {statement}");
    }

    let Some(started_at) = Utc.with_ymd_and_hms(2026, 10, 19, 3, 15, 0).single() else {
        panic!("valid timestamp");
    };
    let Ok(retention) = RetentionDays::new(7) else {
        panic!("valid retention");
    };
    let predicate = AgePredicate::new(
        identifier("created"),
        AgeCutoff::from_run_start(started_at, retention),
    );
    let deleter = MySqlBatchDeleter::new(pool.clone());

    let first = deleter.delete_batch(&table, &predicate, 2).await;
    let second = deleter.delete_batch(&table, &predicate, 2).await;
    let third = deleter.delete_batch(&table, &predicate, 2).await;

    assert!(matches!(first, Ok(2)));
    assert!(matches!(second, Ok(1)));
    assert!(matches!(third, Ok(0)));

    let remaining: Result<(i64,), _> =
        sqlx::query_as(format!("SELECT COUNT(*) FROM {}", table.quoted()).as_str())
            .fetch_one(&pool)
            .await;
    assert!(matches!(remaining, Ok((2,))));

    let dropped = sqlx::query(format!("DROP TABLE {}", table.quoted()).as_str())
        .execute(&pool)
        .await;
    assert!(dropped.is_ok());
}
