use std::fmt::{Display, Formatter};
use std::str::FromStr;

use prunevault_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::retention::RetentionDays;

const IDENTIFIER_MAX_LENGTH: usize = 64;

/// A database, table or column name that is safe to splice into SQL and
/// shell text.
///
/// Identifiers cannot be bound as query parameters, so they are restricted
/// to `[A-Za-z0-9_$]` and at most 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SqlIdentifier(String);

impl SqlIdentifier {
    /// Creates a validated identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Configuration(
                "identifier must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > IDENTIFIER_MAX_LENGTH {
            return Err(AppError::Configuration(format!(
                "identifier '{trimmed}' exceeds {IDENTIFIER_MAX_LENGTH} characters"
            )));
        }

        if let Some(invalid) = trimmed
            .chars()
            .find(|character| !(character.is_ascii_alphanumeric() || "_$".contains(*character)))
        {
            return Err(AppError::Configuration(format!(
                "identifier '{trimmed}' contains unsupported character '{invalid}'"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the identifier quoted for MySQL statements.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("`{}`", self.0)
    }
}

impl Display for SqlIdentifier {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl FromStr for SqlIdentifier {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for SqlIdentifier {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SqlIdentifier> for String {
    fn from(value: SqlIdentifier) -> Self {
        value.0
    }
}

/// One table subject to its own retention window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSpec {
    name: SqlIdentifier,
    retention_days: RetentionDays,
}

impl PartitionSpec {
    /// Creates a partition spec from a resolved retention value.
    #[must_use]
    pub fn new(name: SqlIdentifier, retention_days: RetentionDays) -> Self {
        Self {
            name,
            retention_days,
        }
    }

    /// Returns the partition (table) name.
    #[must_use]
    pub fn name(&self) -> &SqlIdentifier {
        &self.name
    }

    /// Returns the resolved retention.
    #[must_use]
    pub fn retention_days(&self) -> RetentionDays {
        self.retention_days
    }
}

#[cfg(test)]
mod tests {
    use super::SqlIdentifier;

    #[test]
    fn identifier_accepts_table_names() {
        let identifier = SqlIdentifier::new("transaction_details_log");
        assert!(matches!(
            identifier.as_ref().map(SqlIdentifier::quoted),
            Ok(ref quoted) if quoted == "`transaction_details_log`"
        ));
    }

    #[test]
    fn identifier_rejects_injection_attempts() {
        assert!(SqlIdentifier::new("users; DROP TABLE users").is_err());
        assert!(SqlIdentifier::new("a`b").is_err());
        assert!(SqlIdentifier::new("../etc").is_err());
        assert!(SqlIdentifier::new("").is_err());
    }

    #[test]
    fn identifier_rejects_names_that_read_as_command_options() {
        assert!(SqlIdentifier::new("-rx").is_err());
        assert!(SqlIdentifier::new("--result-file=x").is_err());
        assert!(SqlIdentifier::new("order-log").is_err());
        assert!(SqlIdentifier::new("$order_log2").is_ok());
    }

    #[test]
    fn identifier_rejects_overlong_names() {
        assert!(SqlIdentifier::new("t".repeat(65)).is_err());
        assert!(SqlIdentifier::new("t".repeat(64)).is_ok());
    }
}
