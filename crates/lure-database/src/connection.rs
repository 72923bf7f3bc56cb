//! Database connection management

use std::sync::Arc;
use std::time::Duration;

use lure_core::{ServiceError, ServiceResult};
use lure_migrations::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::{debug, info};

pub type DbConnection = DatabaseConnection;

/// Connect to `database_url` (Postgres or SQLite) and apply pending migrations.
pub async fn establish_connection(database_url: &str) -> ServiceResult<Arc<DbConnection>> {
    let mut opt = ConnectOptions::new(database_url);
    if database_url.starts_with("sqlite:") {
        // SQLite serializes writers; one connection avoids busy errors.
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(50).min_connections(2);
    }
    opt.connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    debug!("Connecting to database");
    let db = Database::connect(opt)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;

    Migrator::up(&db, None)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;
    info!("Database ready, migrations applied");

    Ok(Arc::new(db))
}
