use std::sync::Arc;

use lucia_core::config::{AppConfig, ConfigScope, LoadOptions};
use lucia_db::{connect_with_config, migrations, SqlCatalogRepository};
use lucia_sync::{CatalogSyncJob, SpotCatalogClient, SyncError};
use tracing_subscriber::EnvFilter;

use crate::commands::{current_thread_runtime, exit_code, CommandResult};

pub fn run() -> CommandResult {
    let options = LoadOptions { scope: ConfigScope::Sync, ..LoadOptions::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "sync",
                "config_validation",
                format!("configuration issue: {error}"),
                exit_code::CONFIG,
            );
        }
    };
    init_logging(&config);

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "sync",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                exit_code::RUNTIME,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), exit_code::DB_CONNECTIVITY))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), exit_code::MIGRATION))?;

        let vendor = SpotCatalogClient::new(&config.catalog)
            .map_err(|error| (error_class(&error), error.to_string(), exit_code::SYNC))?;
        let job =
            CatalogSyncJob::new(Arc::new(vendor), Arc::new(SqlCatalogRepository::new(pool.clone())));
        let report = job
            .run()
            .await
            .map_err(|error| (error_class(&error), error.to_string(), exit_code::SYNC));

        pool.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::success(
            "sync",
            format!(
                "Sync completed in {}s: {} colors, {} products, {} price tiers",
                report.duration_label(),
                report.colors,
                report.products,
                report.prices
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sync", error_class, message, exit_code)
        }
    }
}

fn error_class(error: &SyncError) -> &'static str {
    match error {
        SyncError::Authentication(_) => "vendor_auth",
        SyncError::Fetch { .. } => "vendor_fetch",
        SyncError::Store { .. } => "store_write",
    }
}

/// Progress goes to stderr so stdout stays a single JSON result.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_ascii_lowercase()));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .compact()
        .try_init();
}
