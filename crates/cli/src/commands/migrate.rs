use crate::commands::{current_thread_runtime, exit_code, CommandResult};
use lucia_core::config::{AppConfig, ConfigScope, LoadOptions};
use lucia_db::{connect_with_config, migrations};

pub fn run() -> CommandResult {
    let options = LoadOptions { scope: ConfigScope::Store, ..LoadOptions::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                exit_code::CONFIG,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
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
        let version = migrations::applied_version(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), exit_code::MIGRATION))?;
        pool.close().await;
        Ok::<Option<i64>, (&'static str, String, u8)>(version)
    });

    match result {
        Ok(version) => CommandResult::success(
            "migrate",
            format!("applied pending migrations; schema at version {}", version.unwrap_or_default()),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
