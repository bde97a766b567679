use std::sync::Arc;

use corner_core::config::{AppConfig, ConfigError, LoadOptions};
use corner_db::{migrations, SharedPool, SqlRequestRepository};
use thiserror::Error;
use tracing::info;

use crate::service::RequestService;

pub struct Application {
    pub config: AppConfig,
    /// Process-wide pool, shared by the API wiring and the health listener.
    pub db: Arc<SharedPool>,
    pub service: Arc<RequestService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Opens the process-wide pool once, applies migrations and wires the service.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        database_url = %config.database.redacted_url(),
        "starting application bootstrap"
    );

    let db = Arc::new(SharedPool::new(
        config.database.url.clone(),
        config.database.max_connections,
        config.database.timeout_secs,
    ));
    let db_pool = db.get().await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let service =
        Arc::new(RequestService::new(Arc::new(SqlRequestRepository::new(db_pool.clone()))));

    Ok(Application { config, db, service })
}
