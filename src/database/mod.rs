//! Database infrastructure using SeaORM.
//!
//! [`Backend`] is the polymorphism seam described in `spec.md` §9: the core
//! only ever talks to this capability set, never to a concrete SQLite type
//! directly, so a future client/server store is a second implementor away.

use crate::config::SqliteConfig;
use crate::error::{CoreError, CoreResult};
use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, Statement};
use sea_orm::ConnectionTrait;
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Postgresql,
}

/// Capability set the core talks to; the concrete variant is chosen by config.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn open(&mut self) -> CoreResult<()>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn db(&self) -> CoreResult<&DatabaseConnection>;
    async fn init_schema(&self) -> CoreResult<()>;
    fn kind(&self) -> BackendKind;
    fn connection_info(&self) -> String;
}

/// The reference store: an embedded single-writer SQLite database.
pub struct SqliteBackend {
    path: std::path::PathBuf,
    config: SqliteConfig,
    conn: Option<DatabaseConnection>,
}

impl SqliteBackend {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            path: std::path::PathBuf::from(&config.path),
            config,
            conn: None,
        }
    }

    async fn apply_pragmas(conn: &DatabaseConnection, config: &SqliteConfig) -> CoreResult<()> {
        if config.wal_mode {
            conn.execute(Statement::from_string(
                sea_orm::DatabaseBackend::Sqlite,
                "PRAGMA journal_mode=WAL",
            ))
            .await?;
        }
        conn.execute(Statement::from_string(
            sea_orm::DatabaseBackend::Sqlite,
            format!("PRAGMA busy_timeout={}", config.busy_timeout_ms),
        ))
        .await?;
        conn.execute(Statement::from_string(
            sea_orm::DatabaseBackend::Sqlite,
            "PRAGMA synchronous=NORMAL",
        ))
        .await?;
        conn.execute(Statement::from_string(
            sea_orm::DatabaseBackend::Sqlite,
            "PRAGMA foreign_keys=ON",
        ))
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Backend for SqliteBackend {
    async fn open(&mut self) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CoreError::fatal(format!("failed to create directory: {e}")))?;
            }
        }

        let db_url = format!("sqlite://{}?mode=rwc", self.path.display());
        let mut opt = ConnectOptions::new(db_url);
        opt.max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_millis(self.config.busy_timeout_ms))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt)
            .await
            .map_err(|e| CoreError::fatal(format!("failed to open database: {e}")))?;
        Self::apply_pragmas(&conn, &self.config).await?;

        info!(path = %self.path.display(), "opened catalog database");
        self.conn = Some(conn);
        self.init_schema().await
    }

    fn close(&mut self) {
        self.conn = None;
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn db(&self) -> CoreResult<&DatabaseConnection> {
        self.conn
            .as_ref()
            .ok_or_else(|| CoreError::fatal("database is not open"))
    }

    async fn init_schema(&self) -> CoreResult<()> {
        let conn = self.db()?;
        migration::Migrator::up(conn, None).await?;
        info!("catalog schema migrations applied");
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn connection_info(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

/// The postgresql variant is an acknowledged future direction; constructing
/// one today is a recognized but unimplemented configuration, per spec.md §6.
pub fn unimplemented_postgres_backend() -> CoreError {
    CoreError::invalid_input("postgresql backend not yet implemented")
}
