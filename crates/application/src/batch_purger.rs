use std::sync::Arc;
use std::time::Duration;

use prunevault_core::{AppError, AppResult};
use prunevault_domain::{AgePredicate, PurgeResult, SqlIdentifier};

use crate::backup_ports::BatchDeleter;

/// Deletes eligible rows in bounded, individually committed batches.
///
/// Eligibility is the age predicate alone, never a position cursor, so a
/// purge interrupted half-way can be re-run with the same cutoff and removes
/// exactly what is left.
#[derive(Clone)]
pub struct BatchPurger {
    deleter: Arc<dyn BatchDeleter>,
    batch_size: u64,
    batch_pause: Duration,
}

impl BatchPurger {
    /// Creates a purger. `batch_size` must be positive.
    pub fn new(
        deleter: Arc<dyn BatchDeleter>,
        batch_size: u64,
        batch_pause: Duration,
    ) -> AppResult<Self> {
        if batch_size == 0 {
            return Err(AppError::Configuration(
                "purge batch size must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            deleter,
            batch_size,
            batch_pause,
        })
    }

    /// Returns the configured batch size.
    #[must_use]
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Purges `partition` until a batch deletes nothing.
    ///
    /// Batches committed before a failure stay deleted; the error message
    /// reports how far the purge got.
    pub async fn purge(
        &self,
        partition: &SqlIdentifier,
        predicate: &AgePredicate,
    ) -> AppResult<PurgeResult> {
        let mut result = PurgeResult::empty(partition.clone());

        loop {
            let deleted = self
                .deleter
                .delete_batch(partition, predicate, self.batch_size)
                .await
                .map_err(|error| {
                    AppError::Purge(format!(
                        "partition '{partition}' stopped after {} rows in {} batches: {error}",
                        result.rows_deleted, result.batches
                    ))
                })?;

            if deleted == 0 {
                return Ok(result);
            }

            result.rows_deleted += deleted;
            result.batches += 1;

            if !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use prunevault_core::{AppError, AppResult};
    use prunevault_domain::{AgeCutoff, AgePredicate, RetentionDays, SqlIdentifier};
    use tokio::sync::Mutex;

    use super::BatchPurger;
    use crate::backup_ports::BatchDeleter;

    /// Rows are stored as ages in days; a row is eligible when its age is
    /// at least `eligible_age`.
    struct FakeTable {
        ages: Mutex<Vec<u32>>,
        eligible_age: u32,
        fail_on_call: Mutex<Option<usize>>,
        calls: Mutex<Vec<u64>>,
    }

    impl FakeTable {
        fn new(ages: Vec<u32>, eligible_age: u32) -> Self {
            Self {
                ages: Mutex::new(ages),
                eligible_age,
                fail_on_call: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BatchDeleter for FakeTable {
        async fn delete_batch(
            &self,
            _partition: &SqlIdentifier,
            _predicate: &AgePredicate,
            limit: u64,
        ) -> AppResult<u64> {
            let mut calls = self.calls.lock().await;
            let mut fail_on_call = self.fail_on_call.lock().await;
            if *fail_on_call == Some(calls.len()) {
                *fail_on_call = None;
                calls.push(0);
                return Err(AppError::Internal("lock wait timeout exceeded".to_owned()));
            }

            let mut ages = self.ages.lock().await;
            let mut deleted = 0_u64;
            ages.retain(|age| {
                if deleted < limit && *age >= self.eligible_age {
                    deleted += 1;
                    false
                } else {
                    true
                }
            });
            calls.push(deleted);
            Ok(deleted)
        }
    }

    fn predicate() -> AgePredicate {
        let Some(started_at) = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).single() else {
            panic!("valid timestamp");
        };
        let Ok(retention) = RetentionDays::new(7) else {
            panic!("valid retention");
        };
        let Ok(column) = SqlIdentifier::new("created") else {
            panic!("valid column");
        };
        AgePredicate::new(column, AgeCutoff::from_run_start(started_at, retention))
    }

    fn partition() -> SqlIdentifier {
        let Ok(partition) = SqlIdentifier::new("callbacklog") else {
            panic!("valid partition");
        };
        partition
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let table = Arc::new(FakeTable::new(Vec::new(), 7));
        assert!(matches!(
            BatchPurger::new(table, 0, Duration::ZERO),
            Err(AppError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn purge_deletes_in_batches_until_empty() {
        let table = Arc::new(FakeTable::new(vec![10; 25], 7));
        let Ok(purger) = BatchPurger::new(table.clone(), 10, Duration::ZERO) else {
            panic!("valid purger");
        };

        let result = purger.purge(&partition(), &predicate()).await;

        assert!(matches!(
            result,
            Ok(ref result) if result.rows_deleted == 25 && result.batches == 3
        ));
        assert_eq!(*table.calls.lock().await, vec![10, 10, 5, 0]);
    }

    #[tokio::test]
    async fn purge_keeps_rows_younger_than_cutoff() {
        let table = Arc::new(FakeTable::new(vec![1, 2, 8, 9, 30, 3], 7));
        let Ok(purger) = BatchPurger::new(table.clone(), 2, Duration::ZERO) else {
            panic!("valid purger");
        };

        let result = purger.purge(&partition(), &predicate()).await;

        assert!(matches!(result, Ok(ref result) if result.rows_deleted == 3));
        assert_eq!(*table.ages.lock().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failed_batch_reports_progress_and_rerun_finishes() {
        let table = Arc::new(FakeTable::new(vec![10; 7], 7));
        *table.fail_on_call.lock().await = Some(2);
        let Ok(purger) = BatchPurger::new(table.clone(), 2, Duration::ZERO) else {
            panic!("valid purger");
        };

        let first = purger.purge(&partition(), &predicate()).await;
        let Err(AppError::Purge(message)) = first else {
            panic!("expected purge error");
        };
        assert!(message.contains("after 4 rows in 2 batches"));
        assert_eq!(table.ages.lock().await.len(), 3);

        let second = purger.purge(&partition(), &predicate()).await;
        assert!(matches!(second, Ok(ref result) if result.rows_deleted == 3));
        assert!(table.ages.lock().await.is_empty());
    }

    proptest! {
        #[test]
        fn batches_sum_to_eligible_rows(
            ages in proptest::collection::vec(0_u32..20, 0..200),
            batch_size in 1_u64..50,
            interrupt_after in proptest::option::of(0_usize..10),
        ) {
            let eligible = ages.iter().filter(|age| **age >= 7).count() as u64;
            let table = Arc::new(FakeTable::new(ages, 7));

            let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build();
            let Ok(runtime) = runtime else {
                panic!("failed to build test runtime");
            };
            let Ok(purger) = BatchPurger::new(table.clone(), batch_size, Duration::ZERO) else {
                panic!("valid purger");
            };

            *runtime.block_on(table.fail_on_call.lock()) = interrupt_after;
            let first = runtime.block_on(purger.purge(&partition(), &predicate()));
            let first_rows = match first {
                Ok(result) => result.rows_deleted,
                Err(_) => {
                    let calls = runtime.block_on(table.calls.lock()).clone();
                    calls.iter().sum::<u64>()
                }
            };

            *runtime.block_on(table.fail_on_call.lock()) = None;
            let second = runtime.block_on(purger.purge(&partition(), &predicate()));
            let second_rows = second.map(|result| result.rows_deleted).unwrap_or(u64::MAX);

            prop_assert_eq!(first_rows + second_rows, eligible);
            let remaining = runtime.block_on(table.ages.lock()).clone();
            prop_assert!(remaining.iter().all(|age| *age < 7));
        }
    }
}
