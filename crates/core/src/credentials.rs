use std::fmt::{Debug, Formatter};

use crate::{AppError, AppResult, NonEmptyString};

/// A secret string whose value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value. Callers must not log it.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for Secret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("Secret(***)")
    }
}

/// Connection details for the source database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    host: NonEmptyString,
    port: u16,
    user: NonEmptyString,
    password: Secret,
    database: NonEmptyString,
}

impl DatabaseCredentials {
    /// Creates validated database credentials.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: Secret,
        database: impl Into<String>,
    ) -> AppResult<Self> {
        if port == 0 {
            return Err(AppError::Configuration(
                "database port must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            host: NonEmptyString::new(host)?,
            port,
            user: NonEmptyString::new(user)?,
            password,
            database: NonEmptyString::new(database)?,
        })
    }

    /// Returns the database host.
    #[must_use]
    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    /// Returns the database port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the database user.
    #[must_use]
    pub fn user(&self) -> &str {
        self.user.as_str()
    }

    /// Returns the database password.
    #[must_use]
    pub fn password(&self) -> &Secret {
        &self.password
    }

    /// Returns the dataset (database) name.
    #[must_use]
    pub fn database(&self) -> &str {
        self.database.as_str()
    }
}

/// Connection details for the remote dump host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    host: NonEmptyString,
    port: u16,
    user: NonEmptyString,
    identity_file: Option<String>,
}

impl RemoteCredentials {
    /// Creates validated remote host credentials.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        identity_file: Option<String>,
    ) -> AppResult<Self> {
        if port == 0 {
            return Err(AppError::Configuration(
                "remote port must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            host: NonEmptyString::new(host)?,
            port,
            user: NonEmptyString::new(user)?,
            identity_file: identity_file.filter(|value| !value.trim().is_empty()),
        })
    }

    /// Returns the remote host.
    #[must_use]
    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    /// Returns the SSH port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the SSH user.
    #[must_use]
    pub fn user(&self) -> &str {
        self.user.as_str()
    }

    /// Returns the optional private key path.
    #[must_use]
    pub fn identity_file(&self) -> Option<&str> {
        self.identity_file.as_deref()
    }

    /// Returns the `user@host` destination string.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user.as_str(), self.host.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{DatabaseCredentials, RemoteCredentials, Secret};

    #[test]
    fn secret_is_redacted_in_debug_output() {
        let credentials =
            DatabaseCredentials::new("db.internal", 3306, "backup", Secret::new("hunter2"), "pgdb");
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("Secret(***)"));
    }

    #[test]
    fn blank_identity_file_is_ignored() {
        let credentials = RemoteCredentials::new("dump-host", 22, "ops", Some("  ".to_owned()));
        assert!(matches!(
            credentials.as_ref().map(RemoteCredentials::identity_file),
            Ok(None)
        ));
    }

    #[test]
    fn zero_port_is_rejected() {
        let credentials = RemoteCredentials::new("dump-host", 0, "ops", None);
        assert!(credentials.is_err());
    }
}
