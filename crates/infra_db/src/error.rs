//! Database error types
//!
//! SQLx errors are classified by PostgreSQL SQLSTATE so that adapters can
//! hand the domain a meaningful [`PortError`].

use std::time::Duration;

use core_kernel::PortError;
use thiserror::Error;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// A balance check constraint rejected a negative value
    #[error("Negative balance rejected: {0}")]
    NegativeBalance(String),

    /// Other check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A value does not fit its numeric column
    #[error("Numeric value out of range: {0}")]
    NumericOverflow(String),

    /// The server cancelled a statement at `lock_timeout` or `statement_timeout`
    #[error("Statement timed out: {0}")]
    StatementTimeout(String),

    /// Begin, commit or rollback failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be converted to a domain type
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("account", 42);
    /// assert!(error.to_string().contains("account"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} {}", entity, id))
    }

    pub fn transaction(action: &str, error: sqlx::Error) -> Self {
        DatabaseError::TransactionFailed(format!("{}: {}", action, error))
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::NegativeBalance(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }
}

/// Maps SQLx errors to DatabaseError variants by PostgreSQL error code
///
/// <https://www.postgresql.org/docs/current/errcodes-appendix.html>
impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("record".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(e) => DatabaseError::ConnectionFailed(e.to_string()),
            sqlx::Error::Database(db_err) => DatabaseError::from_sqlstate(
                db_err.code().as_deref(),
                db_err.constraint(),
                db_err.message().to_string(),
            ),
            other => DatabaseError::QueryFailed(other.to_string()),
        }
    }
}

impl DatabaseError {
    fn from_sqlstate(code: Option<&str>, constraint: Option<&str>, message: String) -> Self {
        match code {
            Some("23505") => DatabaseError::DuplicateEntry(message),
            Some("23503") => DatabaseError::ForeignKeyViolation(message),
            Some("23514") => match constraint {
                Some(name) if name.ends_with("_non_negative") => DatabaseError::NegativeBalance(message),
                _ => DatabaseError::ConstraintViolation(message),
            },
            Some("22003") => DatabaseError::NumericOverflow(message),
            // lock_not_available, query_canceled
            Some("55P03") | Some("57014") => DatabaseError::StatementTimeout(message),
            _ => DatabaseError::QueryFailed(message),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(what) => PortError::NotFound {
                entity_type: "row".to_string(),
                id: what,
            },
            DatabaseError::DuplicateEntry(message) => PortError::conflict(message),
            DatabaseError::NegativeBalance(message) => PortError::insufficient_funds(message),
            DatabaseError::ForeignKeyViolation(message)
            | DatabaseError::ConstraintViolation(message)
            | DatabaseError::NumericOverflow(message) => PortError::validation(message),
            DatabaseError::StatementTimeout(message) => PortError::timeout(message, Duration::ZERO),
            DatabaseError::ConnectionFailed(message) => PortError::connection(message),
            DatabaseError::PoolExhausted => PortError::connection("connection pool exhausted"),
            other => {
                let message = other.to_string();
                PortError::internal_with_source(message, other)
            }
        }
    }
}
