//! # Receiving Store Errors
//!
//! Callers of the repository see three outcomes: success, [`DbError::NotFound`],
//! or a hard error. Key conflicts on insert never surface as errors because
//! both insert paths use `ON CONFLICT ... DO NOTHING`.
//!
//! ```text
//! sqlx::Error ──► DbError
//!   RowNotFound                      → NotFound
//!   Database(kind = Unique)          → UniqueViolation
//!   Database(kind = ForeignKey)      → ForeignKeyViolation
//!   Database(kind = Check | NotNull) → ConstraintViolation
//!   PoolTimedOut                     → PoolExhausted
//!   PoolClosed / Io / Tls            → ConnectionFailed
//!   Decode / ColumnDecode            → InvalidData
//!
//! ValidationError                    → Invalid (checked before the query)
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    // =========================================================================
    // Lookup
    // =========================================================================
    /// No row for the requested key.
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    // =========================================================================
    // Constraints (transaction rolled back)
    // =========================================================================
    #[error("Duplicate key: {detail}")]
    UniqueViolation { detail: String },

    #[error("Foreign key violation: {detail}")]
    ForeignKeyViolation { detail: String },

    /// CHECK or NOT NULL failure: zero line number, oversized product text,
    /// fiscal field over 30 characters, and so on.
    #[error("Constraint violation: {detail}")]
    ConstraintViolation { detail: String },

    /// Rejected before reaching SQL.
    #[error("Invalid input: {0}")]
    Invalid(#[from] facturapid_core::ValidationError),

    // =========================================================================
    // Infrastructure
    // =========================================================================
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Begin, commit or rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored value no longer maps onto the domain type.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }

    /// Rejected by the schema rather than by the environment.
    pub fn is_constraint(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::ConstraintViolation { .. }
                | DbError::Invalid(_)
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),

            sqlx::Error::Database(db_err) => {
                let detail = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation { detail },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { detail },
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::ConstraintViolation { detail }
                    }
                    _ => DbError::QueryFailed(detail),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DbError::ConnectionFailed(err.to_string())
            }

            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::InvalidData(err.to_string())
            }

            sqlx::Error::Migrate(e) => DbError::MigrationFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = DbError::not_found("Invoice", "42");
        assert!(err.is_not_found());
        assert!(!err.is_constraint());
        assert_eq!(err.to_string(), "Invoice not found: 42");
    }

    #[test]
    fn test_pool_errors() {
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::PoolExhausted
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::ConnectionFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_sqlite_constraint_kinds() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY, n INTEGER NOT NULL CHECK (n > 0))")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t (id, n) VALUES (1, 1)")
            .execute(&pool)
            .await
            .unwrap();

        let dup = sqlx::query("INSERT INTO t (id, n) VALUES (1, 1)")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(matches!(DbError::from(dup), DbError::UniqueViolation { .. }));

        let check = sqlx::query("INSERT INTO t (id, n) VALUES (2, 0)")
            .execute(&pool)
            .await
            .unwrap_err();
        let check = DbError::from(check);
        assert!(matches!(check, DbError::ConstraintViolation { .. }));
        assert!(check.is_constraint());
    }
}
