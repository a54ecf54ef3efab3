use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use scholar_core::config::{AppConfig, ConfigError, LoadOptions};
use scholar_db::repositories::{
    SqlAssignmentRepository, SqlOutboxRepository, SqlProfileRepository, SqlRequestRepository,
    SqlServiceRepository,
};
use scholar_db::{connect, migrations, DbPool};
use scholar_mail::gateway::{DispatchError, DispatchGateway};

use crate::api::ApiState;
use crate::lifecycle::LifecycleController;
use crate::outbox::OutboxWorker;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api_state: ApiState,
    pub outbox_worker: OutboxWorker,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("mail gateway initialization failed: {0}")]
    Mail(#[from] DispatchError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let outbox = Arc::new(SqlOutboxRepository::new(db_pool.clone()));
    let lifecycle = LifecycleController::new(
        Arc::new(SqlRequestRepository::new(db_pool.clone())),
        Arc::new(SqlAssignmentRepository::new(db_pool.clone())),
        Arc::new(SqlProfileRepository::new(db_pool.clone())),
        Arc::new(SqlServiceRepository::new(db_pool.clone())),
        outbox.clone(),
        config.mail.clone(),
        &config.outbox,
    );

    let gateway = Arc::new(DispatchGateway::from_config(&config.mail)?);
    info!(
        event_name = "system.bootstrap.mail_gateway_ready",
        correlation_id = "bootstrap",
        backend = ?config.mail.backend,
        "mail gateway initialized"
    );

    let outbox_worker = OutboxWorker::new(outbox, gateway.clone(), config.outbox.clone());
    let api_state = ApiState { lifecycle: Arc::new(lifecycle), gateway };

    Ok(Application { config, db_pool, api_state, outbox_worker })
}
