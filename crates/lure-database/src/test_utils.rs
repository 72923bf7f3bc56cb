//! Test utilities for database-backed tests
//!
//! Every `TestDatabase` is a private in-memory SQLite database with the full
//! schema applied, so tests never share state.

use std::sync::Arc;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, QueryResult, Statement};
use sea_orm_migration::MigratorTrait;

use crate::DbConnection;
use lure_migrations::Migrator;

pub struct TestDatabase {
    pub db: Arc<DbConnection>,
}

impl TestDatabase {
    /// Fresh in-memory database with migrations applied.
    pub async fn with_migrations() -> anyhow::Result<Self> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        // A second pooled connection would open a different, empty database.
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let db = Database::connect(opt).await?;
        Migrator::up(&db, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn connection(&self) -> Arc<DbConnection> {
        self.db.clone()
    }

    pub async fn query_sql(&self, sql: &str) -> anyhow::Result<Vec<QueryResult>> {
        let backend = self.db.get_database_backend();
        Ok(self
            .db
            .query_all(Statement::from_string(backend, sql.to_owned()))
            .await?)
    }
}
