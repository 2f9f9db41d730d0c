use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use prunevault_core::{AppError, AppResult};
use serde::Serialize;

use crate::partition::SqlIdentifier;

/// A positive number of days of history to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RetentionDays(u32);

impl RetentionDays {
    /// Validates a configured retention value.
    pub fn new(days: i64) -> AppResult<Self> {
        if days <= 0 {
            return Err(AppError::Configuration(format!(
                "retention must be a positive number of days, got {days}"
            )));
        }

        u32::try_from(days).map(Self).map_err(|error| {
            AppError::Configuration(format!("retention of {days} days is out of range: {error}"))
        })
    }

    /// Returns the number of days.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Display for RetentionDays {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Per-partition retention overrides with a process-wide default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    default_days: i64,
    overrides: BTreeMap<String, i64>,
}

impl RetentionPolicy {
    /// Creates a policy with only a default.
    #[must_use]
    pub fn new(default_days: i64) -> Self {
        Self {
            default_days,
            overrides: BTreeMap::new(),
        }
    }

    /// Adds or replaces one partition override.
    #[must_use]
    pub fn with_override(mut self, partition: impl Into<String>, days: i64) -> Self {
        self.overrides.insert(partition.into(), days);
        self
    }

    /// Resolves the retention for a partition, falling back to the default.
    pub fn resolve(&self, partition: &str) -> AppResult<RetentionDays> {
        let days = self
            .overrides
            .get(partition)
            .copied()
            .unwrap_or(self.default_days);

        RetentionDays::new(days).map_err(|error| match error {
            AppError::Configuration(message) => {
                AppError::Configuration(format!("partition '{partition}': {message}"))
            }
            other => other,
        })
    }

    /// Checks the default and every override without resolving a partition.
    pub fn validate(&self) -> AppResult<()> {
        RetentionDays::new(self.default_days).map_err(|error| {
            AppError::Configuration(format!("default retention: {error}"))
        })?;

        for partition in self.overrides.keys() {
            self.resolve(partition)?;
        }

        Ok(())
    }
}

/// Rows strictly older than this instant are purge-eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AgeCutoff(DateTime<Utc>);

impl AgeCutoff {
    /// Computes `run_started_at - retention`.
    #[must_use]
    pub fn from_run_start(run_started_at: DateTime<Utc>, retention: RetentionDays) -> Self {
        Self(run_started_at - Duration::days(i64::from(retention.get())))
    }

    /// Returns the cutoff instant.
    #[must_use]
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Renders the cutoff as a MySQL `DATETIME` literal body in UTC.
    #[must_use]
    pub fn sql_literal(&self) -> String {
        self.0.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// The `column < cutoff` filter shared by partition dumps and purges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgePredicate {
    column: SqlIdentifier,
    cutoff: AgeCutoff,
}

impl AgePredicate {
    /// Creates a predicate over the given age column.
    #[must_use]
    pub fn new(column: SqlIdentifier, cutoff: AgeCutoff) -> Self {
        Self { column, cutoff }
    }

    /// Returns the age column.
    #[must_use]
    pub fn column(&self) -> &SqlIdentifier {
        &self.column
    }

    /// Returns the cutoff.
    #[must_use]
    pub fn cutoff(&self) -> AgeCutoff {
        self.cutoff
    }

    /// Renders the predicate as a SQL condition with an inline literal.
    #[must_use]
    pub fn where_clause(&self) -> String {
        format!("{} < '{}'", self.column.quoted(), self.cutoff.sql_literal())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::{AgeCutoff, AgePredicate, RetentionDays, RetentionPolicy};
    use crate::SqlIdentifier;

    fn policy() -> RetentionPolicy {
        RetentionPolicy::new(7)
            .with_override("transaction_details_log", 1)
            .with_override("user_details", 60)
    }

    #[test]
    fn unlisted_partition_uses_default() {
        let resolved = policy().resolve("callbacklog");
        assert!(matches!(resolved.map(RetentionDays::get), Ok(7)));
    }

    #[test]
    fn listed_partition_uses_override() {
        let resolved = policy().resolve("user_details");
        assert!(matches!(resolved.map(RetentionDays::get), Ok(60)));
    }

    #[test]
    fn non_positive_override_is_a_configuration_error() {
        let zero = policy().with_override("callbacklog", 0);
        assert!(matches!(
            zero.resolve("callbacklog"),
            Err(prunevault_core::AppError::Configuration(_))
        ));
        assert!(zero.validate().is_err());

        let negative = RetentionPolicy::new(-3);
        assert!(negative.resolve("anything").is_err());
        assert!(negative.validate().is_err());
    }

    #[test]
    fn cutoff_subtracts_whole_days() {
        let Some(started_at) = Utc.with_ymd_and_hms(2026, 10, 19, 3, 15, 0).single() else {
            panic!("valid timestamp");
        };
        let Ok(retention) = RetentionDays::new(7) else {
            panic!("valid retention");
        };

        let cutoff = AgeCutoff::from_run_start(started_at, retention);
        assert_eq!(cutoff.sql_literal(), "2026-10-12 03:15:00");

        let Ok(column) = SqlIdentifier::new("created") else {
            panic!("valid column");
        };
        let predicate = AgePredicate::new(column, cutoff);
        assert_eq!(predicate.where_clause(), "`created` < '2026-10-12 03:15:00'");
    }

    proptest! {
        #[test]
        fn resolve_returns_override_or_default(
            default_days in 1_i64..3650,
            override_days in 1_i64..3650,
            listed in "[a-z_]{1,16}",
            unlisted in "[A-Z]{1,16}",
        ) {
            let policy =
                RetentionPolicy::new(default_days).with_override(listed.clone(), override_days);

            let listed_days = policy.resolve(&listed).map(|days| i64::from(days.get()));
            let unlisted_days = policy.resolve(&unlisted).map(|days| i64::from(days.get()));

            prop_assert!(matches!(listed_days, Ok(days) if days == override_days));
            prop_assert!(matches!(unlisted_days, Ok(days) if days == default_days));
        }

        #[test]
        fn non_positive_values_never_resolve(days in i64::MIN..=0) {
            prop_assert!(RetentionPolicy::new(days).resolve("any").is_err());
        }
    }
}
