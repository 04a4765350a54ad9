//! SQLite telemetry backend.

use super::TelemetrySink;
use crate::error::TelemetryError;
use async_trait::async_trait;
use drop_types::SessionToken;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// SQLite-backed audit trail.
///
/// One row per announced file in `encrypted_files` and one row per
/// completed transfer in `transferred_files`.
#[derive(Clone)]
pub struct SqliteTelemetry {
    pool: SqlitePool,
}

impl SqliteTelemetry {
    /// Open (or create) the database at `path`.
    pub async fn new(path: &Path) -> Result<Self, TelemetryError> {
        let filename = path.to_str().ok_or_else(|| TelemetryError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::new()
            .filename(filename)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let telemetry = Self { pool };
        telemetry.run_migrations().await?;
        Ok(telemetry)
    }

    /// Create an in-memory database (for testing).
    pub async fn in_memory() -> Result<Self, TelemetryError> {
        let options = SqliteConnectOptions::from_str(":memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let telemetry = Self { pool };
        telemetry.run_migrations().await?;
        Ok(telemetry)
    }

    async fn run_migrations(&self) -> Result<(), TelemetryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS encrypted_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                source_addr TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transferred_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL,
                name TEXT,
                size INTEGER,
                dest_addr TEXT,
                recorded_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_encrypted_files_uuid ON encrypted_files(uuid)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transferred_files_uuid ON transferred_files(uuid)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of `encrypted_files` rows for `token`.
    pub async fn file_info_count(&self, token: &SessionToken) -> Result<u64, TelemetryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM encrypted_files WHERE uuid = ?1")
                .bind(token.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    /// Number of `transferred_files` rows for `token`.
    pub async fn transfer_count(&self, token: &SessionToken) -> Result<u64, TelemetryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transferred_files WHERE uuid = ?1")
                .bind(token.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for SqliteTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTelemetry")
            .field("connections", &self.pool.size())
            .finish()
    }
}

#[async_trait]
impl TelemetrySink for SqliteTelemetry {
    async fn record_file_info(
        &self,
        token: &SessionToken,
        name: &str,
        size: u64,
        source: SocketAddr,
    ) -> Result<(), TelemetryError> {
        sqlx::query(
            r#"
            INSERT INTO encrypted_files (uuid, name, size, source_addr, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(token.as_str())
        .bind(name)
        .bind(size as i64)
        .bind(source.to_string())
        .bind(Self::current_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_transfer_complete(
        &self,
        token: &SessionToken,
        name: Option<&str>,
        size: Option<u64>,
        dest: Option<SocketAddr>,
    ) -> Result<(), TelemetryError> {
        sqlx::query(
            r#"
            INSERT INTO transferred_files (uuid, name, size, dest_addr, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(token.as_str())
        .bind(name)
        .bind(size.map(|s| s as i64))
        .bind(dest.map(|a| a.to_string()))
        .bind(Self::current_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
