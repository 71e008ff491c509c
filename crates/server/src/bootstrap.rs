use std::sync::Arc;

use lucia_agent::{
    catalog_registry, AssistantError, ConversationRuntime, LeadNotifier, OpenAiAssistantClient,
    RunSettings, TokioClock, WebhookLeadNotifier,
};
use lucia_core::config::{AppConfig, ConfigError, LoadOptions};
use lucia_db::{connect_with_config, migrations, DbPool, SqlCatalogRepository};
use lucia_sync::{CatalogSyncJob, SpotCatalogClient, SyncError};
use thiserror::Error;
use tracing::{info, warn};

/// Long-lived clients shared by every request.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub conversation: Arc<ConversationRuntime>,
    pub sync_job: Arc<CatalogSyncJob>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("assistant client setup failed: {0}")]
    Assistant(#[source] AssistantError),
    #[error("vendor client setup failed: {0}")]
    VendorClient(#[source] SyncError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");
    config.validate()?;

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let catalog = Arc::new(SqlCatalogRepository::new(db_pool.clone()));

    let notifier = match &config.leads.webhook_url {
        Some(url) => Some(Arc::new(WebhookLeadNotifier::new(url.clone())) as Arc<dyn LeadNotifier>),
        None => {
            warn!(
                event_name = "system.bootstrap.leads_webhook_missing",
                "no lead webhook configured; qualification notifications will be skipped"
            );
            None
        }
    };
    let tools = catalog_registry(catalog.clone(), notifier);

    let assistant =
        OpenAiAssistantClient::new(&config.assistant).map_err(BootstrapError::Assistant)?;
    let conversation = ConversationRuntime::new(
        Arc::new(assistant),
        Arc::new(tools),
        Arc::new(TokioClock),
        RunSettings::from_config(&config.assistant),
    );

    let vendor = SpotCatalogClient::new(&config.catalog).map_err(BootstrapError::VendorClient)?;
    let sync_job = CatalogSyncJob::new(Arc::new(vendor), catalog);

    info!(
        event_name = "system.bootstrap.ready",
        tools = conversation.tools().len(),
        "application context ready"
    );

    Ok(Application {
        config,
        db_pool,
        conversation: Arc::new(conversation),
        sync_job: Arc::new(sync_job),
    })
}
