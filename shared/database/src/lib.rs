pub mod sqlite;
pub mod migrations;
pub mod repositories;
pub mod backup;
pub mod catalog;

pub use sqlite::{create_memory_pool, create_sqlite_pool, database_file, health_check, SqlitePool};
pub use backup::{BackupHandle, FileSnapshotHook, NoopSnapshotHook, SnapshotContext, SnapshotHook};
pub use catalog::CatalogStore;
pub use repositories::*;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use bomwright_utils::{BackupConfig, DatabaseConfig};

/// Opens the catalog database, migrates it and builds the store with the
/// configured snapshot hook.
pub async fn initialize_catalog(database: &DatabaseConfig, backup: &BackupConfig) -> Result<(SqlitePool, CatalogStore)> {
    let pool = create_sqlite_pool(
        &database.sqlite_url,
        database.max_connections,
        Duration::from_secs(database.connection_timeout_seconds),
    )
    .await?;

    migrations::run_sqlite_migrations(&pool).await?;

    let hook: Arc<dyn SnapshotHook> = match (backup.enabled, database_file(&database.sqlite_url)) {
        (true, Some(file)) => {
            tracing::info!(directory = %backup.directory, "Catalog snapshots enabled");
            Arc::new(FileSnapshotHook::new(file, &backup.directory))
        }
        _ => Arc::new(NoopSnapshotHook),
    };

    let store = CatalogStore::new(pool.clone(), hook);
    Ok((pool, store))
}
