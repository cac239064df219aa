//! # Receiving Store Connection
//!
//! Opens the SQLite file that holds forwarded invoices.
//!
//! ```text
//! DbConfig ──► Database::new ──► SqlitePool ──► migrations ──► db.invoices()
//!   file or :memory:        WAL, FK on,          001_invoices
//!                           busy timeout
//! ```
//!
//! Two writers delivering the same invoice at once both run
//! `INSERT ... ON CONFLICT DO NOTHING`; SQLite serializes them and the busy
//! timeout makes the second one wait for the lock instead of failing with
//! `SQLITE_BUSY`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations::{self, MigrationStatus};
use crate::repository::invoice::InvoiceRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the receiving store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// SQLite file, created on first open.
    File(PathBuf),
    /// Private in-memory database. Gone when the pool closes.
    Memory,
}

/// Receiving store settings.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/facturapid/invoices.db").max_connections(4);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: StoreLocation,
    pub max_connections: u32,
    /// How long to wait for a free pooled connection.
    pub acquire_timeout: Duration,
    /// How long a writer waits for the SQLite write lock.
    pub busy_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: StoreLocation::File(path.into()),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// In-memory store for tests.
    ///
    /// Pinned to one connection: each `:memory:` connection would otherwise
    /// see its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            location: StoreLocation::Memory,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(":memory:")
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.location {
            StoreLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            StoreLocation::Memory => SqliteConnectOptions::new().in_memory(true),
        };

        // Off by default in SQLite; invoice_lines → invoices cascade depends on it
        options.foreign_keys(true).busy_timeout(self.busy_timeout)
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout);

        match self.location {
            StoreLocation::File(_) => options,
            // Reaping the only connection would drop the whole database
            StoreLocation::Memory => options.idle_timeout(None).max_lifetime(None),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle on the receiving store. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the store and brings its schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        match &config.location {
            StoreLocation::File(path) => info!(path = %path.display(), "Opening receiving store"),
            StoreLocation::Memory => debug!("Opening in-memory receiving store"),
        }

        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };

        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }

        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Embedded vs applied migrations.
    pub async fn migration_status(&self) -> DbResult<MigrationStatus> {
        migrations::migration_status(&self.pool).await
    }

    /// Round-trips a trivial query.
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        info!("Closing receiving store");
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.ping().await.unwrap();
        let status = db.migration_status().await.unwrap();
        assert!(status.is_current());
        assert!(status.embedded >= 1);
    }

    #[tokio::test]
    async fn test_file_store_enforces_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("invoices.db")))
            .await
            .unwrap();

        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(fk, 1);

        let orphan = sqlx::query(
            "INSERT INTO invoice_lines (invoice_code, product, line_number) VALUES (99, 'x', 1)",
        )
        .execute(db.pool())
        .await
        .unwrap_err();
        assert!(matches!(
            DbError::from(orphan),
            DbError::ForeignKeyViolation { .. } | DbError::ConstraintViolation { .. }
        ));

        db.close().await;
        assert!(db.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_reopen_keeps_data_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        sqlx::query("INSERT INTO invoices (code, price_list, series) VALUES (7, '1', 'A')")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(db.migration_status().await.unwrap().is_current());
        assert_eq!(db.invoices().count().await.unwrap(), 1);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(0)
            .busy_timeout(Duration::from_millis(250))
            .run_migrations(false);

        assert_eq!(config.location, StoreLocation::File(PathBuf::from("/tmp/test.db")));
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.run_migrations);

        let memory = DbConfig::in_memory();
        assert_eq!(memory.location, StoreLocation::Memory);
        assert_eq!(memory.max_connections, 1);
    }

    #[test]
    fn test_memory_pool_never_reaps_its_connection() {
        let memory = DbConfig::in_memory().pool_options();
        assert_eq!(memory.get_idle_timeout(), None);
        assert_eq!(memory.get_max_lifetime(), None);
        assert_eq!(memory.get_max_connections(), 1);

        let file = DbConfig::new("/tmp/test.db").pool_options();
        assert!(file.get_idle_timeout().is_some());
        assert!(file.get_max_lifetime().is_some());
    }

    #[tokio::test]
    async fn test_memory_store_keeps_rows_across_acquires() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query("INSERT INTO invoices (code, price_list, series) VALUES (3, '1', 'A')")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(db.invoices().count().await.unwrap(), 1);
        db.ping().await.unwrap();
        assert_eq!(db.invoices().count().await.unwrap(), 1);
    }
}
