use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ASSISTANT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CATALOG_API_URL: &str = "https://ws.spotgifts.com.br/api/v1SSL/";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub assistant: AssistantConfig,
    pub catalog: CatalogConfig,
    pub leads: LeadsConfig,
    pub sync: SyncConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub api_key: SecretString,
    pub assistant_id: String,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub run_deadline_secs: u64,
    pub request_timeout_secs: u64,
}

impl AssistantConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub api_url: String,
    pub access_key: SecretString,
    pub lang: String,
    pub auth_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct LeadsConfig {
    pub webhook_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub cron_secret: SecretString,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub assistant_api_key: Option<String>,
    pub assistant_id: Option<String>,
    pub assistant_base_url: Option<String>,
    pub catalog_api_url: Option<String>,
    pub catalog_access_key: Option<String>,
    pub leads_webhook_url: Option<String>,
    pub sync_cron_secret: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
    pub scope: ConfigScope,
}

/// Which sections must be complete for the caller to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfigScope {
    /// HTTP server: every section.
    #[default]
    Server,
    /// Vendor import: store and catalog credentials.
    Sync,
    /// Store maintenance and diagnostics: the database only.
    Store,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("{key} is required (set {env_hint})")]
    Missing { key: &'static str, env_hint: &'static str },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://lucia.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            assistant: AssistantConfig {
                api_key: String::new().into(),
                assistant_id: String::new(),
                base_url: DEFAULT_ASSISTANT_BASE_URL.to_string(),
                poll_interval_ms: 1_000,
                run_deadline_secs: 300,
                request_timeout_secs: 60,
            },
            catalog: CatalogConfig {
                api_url: DEFAULT_CATALOG_API_URL.to_string(),
                access_key: String::new().into(),
                lang: "PT".to_string(),
                auth_timeout_secs: 30,
                fetch_timeout_secs: 120,
            },
            leads: LeadsConfig::default(),
            sync: SyncConfig { cron_secret: String::new().into() },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("lucia.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate_for(options.scope)?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(assistant) = patch.assistant {
            if let Some(api_key) = assistant.api_key {
                self.assistant.api_key = secret_value(api_key);
            }
            if let Some(assistant_id) = assistant.assistant_id {
                self.assistant.assistant_id = assistant_id;
            }
            if let Some(base_url) = assistant.base_url {
                self.assistant.base_url = base_url;
            }
            if let Some(poll_interval_ms) = assistant.poll_interval_ms {
                self.assistant.poll_interval_ms = poll_interval_ms;
            }
            if let Some(run_deadline_secs) = assistant.run_deadline_secs {
                self.assistant.run_deadline_secs = run_deadline_secs;
            }
            if let Some(request_timeout_secs) = assistant.request_timeout_secs {
                self.assistant.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(api_url) = catalog.api_url {
                self.catalog.api_url = api_url;
            }
            if let Some(access_key) = catalog.access_key {
                self.catalog.access_key = secret_value(access_key);
            }
            if let Some(lang) = catalog.lang {
                self.catalog.lang = lang;
            }
            if let Some(auth_timeout_secs) = catalog.auth_timeout_secs {
                self.catalog.auth_timeout_secs = auth_timeout_secs;
            }
            if let Some(fetch_timeout_secs) = catalog.fetch_timeout_secs {
                self.catalog.fetch_timeout_secs = fetch_timeout_secs;
            }
        }

        if let Some(leads) = patch.leads {
            if let Some(webhook_url) = leads.webhook_url {
                self.leads.webhook_url = Some(webhook_url);
            }
        }

        if let Some(sync) = patch.sync {
            if let Some(cron_secret) = sync.cron_secret {
                self.sync.cron_secret = secret_value(cron_secret);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LUCIA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LUCIA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("LUCIA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LUCIA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LUCIA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let api_key = read_env("LUCIA_ASSISTANT_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.assistant.api_key = secret_value(value);
        }
        if let Some(value) = read_env("LUCIA_ASSISTANT_ID") {
            self.assistant.assistant_id = value;
        }
        if let Some(value) = read_env("LUCIA_ASSISTANT_BASE_URL") {
            self.assistant.base_url = value;
        }
        if let Some(value) = read_env("LUCIA_ASSISTANT_POLL_INTERVAL_MS") {
            self.assistant.poll_interval_ms =
                parse_u64("LUCIA_ASSISTANT_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("LUCIA_ASSISTANT_RUN_DEADLINE_SECS") {
            self.assistant.run_deadline_secs =
                parse_u64("LUCIA_ASSISTANT_RUN_DEADLINE_SECS", &value)?;
        }
        if let Some(value) = read_env("LUCIA_ASSISTANT_REQUEST_TIMEOUT_SECS") {
            self.assistant.request_timeout_secs =
                parse_u64("LUCIA_ASSISTANT_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LUCIA_CATALOG_API_URL") {
            self.catalog.api_url = value;
        }
        if let Some(value) = read_env("LUCIA_CATALOG_ACCESS_KEY") {
            self.catalog.access_key = secret_value(value);
        }
        if let Some(value) = read_env("LUCIA_CATALOG_LANG") {
            self.catalog.lang = value;
        }

        let webhook_url =
            read_env("LUCIA_LEADS_WEBHOOK_URL").or_else(|| read_env("N8N_WEBHOOK_URL"));
        if let Some(value) = webhook_url {
            self.leads.webhook_url = Some(value);
        }

        let cron_secret = read_env("LUCIA_SYNC_CRON_SECRET").or_else(|| read_env("CRON_SECRET"));
        if let Some(value) = cron_secret {
            self.sync.cron_secret = secret_value(value);
        }

        if let Some(value) = read_env("LUCIA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("LUCIA_SERVER_PORT").map(|value| ("LUCIA_SERVER_PORT", value));
        let port = port.or_else(|| read_env("PORT").map(|value| ("PORT", value)));
        if let Some((key, value)) = port {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("LUCIA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LUCIA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("LUCIA_LOGGING_LEVEL").or_else(|| read_env("LUCIA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("LUCIA_LOGGING_FORMAT").or_else(|| read_env("LUCIA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.assistant_api_key {
            self.assistant.api_key = secret_value(api_key);
        }
        if let Some(assistant_id) = overrides.assistant_id {
            self.assistant.assistant_id = assistant_id;
        }
        if let Some(base_url) = overrides.assistant_base_url {
            self.assistant.base_url = base_url;
        }
        if let Some(api_url) = overrides.catalog_api_url {
            self.catalog.api_url = api_url;
        }
        if let Some(access_key) = overrides.catalog_access_key {
            self.catalog.access_key = secret_value(access_key);
        }
        if let Some(webhook_url) = overrides.leads_webhook_url {
            self.leads.webhook_url = Some(webhook_url);
        }
        if let Some(cron_secret) = overrides.sync_cron_secret {
            self.sync.cron_secret = secret_value(cron_secret);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_for(ConfigScope::Server)
    }

    pub fn validate_for(&self, scope: ConfigScope) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_logging(&self.logging)?;
        if scope == ConfigScope::Store {
            return Ok(());
        }

        validate_catalog(&self.catalog)?;
        if scope == ConfigScope::Sync {
            return Ok(());
        }

        validate_assistant(&self.assistant)?;
        validate_leads(&self.leads)?;
        validate_sync(&self.sync)?;
        validate_server(&self.server)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("lucia.toml"), PathBuf::from("config/lucia.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_assistant(assistant: &AssistantConfig) -> Result<(), ConfigError> {
    if assistant.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Missing {
            key: "assistant.api_key",
            env_hint: "LUCIA_ASSISTANT_API_KEY or OPENAI_API_KEY",
        });
    }

    if assistant.assistant_id.trim().is_empty() {
        return Err(ConfigError::Missing {
            key: "assistant.assistant_id",
            env_hint: "LUCIA_ASSISTANT_ID",
        });
    }

    require_http_url("assistant.base_url", &assistant.base_url)?;

    if assistant.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "assistant.poll_interval_ms must be greater than zero".to_string(),
        ));
    }

    if assistant.run_deadline_secs == 0 {
        return Err(ConfigError::Validation(
            "assistant.run_deadline_secs must be greater than zero".to_string(),
        ));
    }

    if assistant.run_deadline_secs.saturating_mul(1_000) < assistant.poll_interval_ms {
        return Err(ConfigError::Validation(
            "assistant.run_deadline_secs must cover at least one poll interval".to_string(),
        ));
    }

    if assistant.request_timeout_secs == 0 || assistant.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "assistant.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.access_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Missing {
            key: "catalog.access_key",
            env_hint: "LUCIA_CATALOG_ACCESS_KEY",
        });
    }

    require_http_url("catalog.api_url", &catalog.api_url)?;

    if catalog.lang.trim().is_empty() {
        return Err(ConfigError::Validation("catalog.lang must not be empty".to_string()));
    }

    if catalog.auth_timeout_secs == 0 || catalog.fetch_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "catalog.auth_timeout_secs and catalog.fetch_timeout_secs must be greater than zero"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_leads(leads: &LeadsConfig) -> Result<(), ConfigError> {
    if let Some(webhook_url) = &leads.webhook_url {
        require_http_url("leads.webhook_url", webhook_url)?;
    }
    Ok(())
}

fn validate_sync(sync: &SyncConfig) -> Result<(), ConfigError> {
    if sync.cron_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Missing {
            key: "sync.cron_secret",
            env_hint: "LUCIA_SYNC_CRON_SECRET or CRON_SECRET",
        });
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    assistant: Option<AssistantPatch>,
    catalog: Option<CatalogPatch>,
    leads: Option<LeadsPatch>,
    sync: Option<SyncPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPatch {
    api_key: Option<String>,
    assistant_id: Option<String>,
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    run_deadline_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    api_url: Option<String>,
    access_key: Option<String>,
    lang: Option<String>,
    auth_timeout_secs: Option<u64>,
    fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LeadsPatch {
    webhook_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncPatch {
    cron_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, ConfigScope, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED_VARS: &[(&str, &str)] = &[
        ("LUCIA_ASSISTANT_API_KEY", "sk-test-key"),
        ("LUCIA_ASSISTANT_ID", "asst_test"),
        ("LUCIA_CATALOG_ACCESS_KEY", "vendor-key"),
        ("LUCIA_SYNC_CRON_SECRET", "cron-secret"),
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_vars(vars: &[(&str, &str)]) {
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn clear_required() {
        let keys = REQUIRED_VARS.iter().map(|(key, _)| *key).collect::<Vec<_>>();
        clear_vars(&keys);
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LUCIA_ASSISTANT_KEY", "sk-from-env");
        env::set_var("TEST_LUCIA_VENDOR_KEY", "vendor-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("lucia.toml");
            fs::write(
                &path,
                r#"
[assistant]
api_key = "${TEST_LUCIA_ASSISTANT_KEY}"
assistant_id = "asst_from_file"

[catalog]
access_key = "${TEST_LUCIA_VENDOR_KEY}"

[sync]
cron_secret = "file-secret"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.assistant.api_key.expose_secret() == "sk-from-env",
                "assistant key should be interpolated from environment",
            )?;
            ensure(
                config.catalog.access_key.expose_secret() == "vendor-from-env",
                "vendor key should be interpolated from environment",
            )?;
            ensure(config.assistant.assistant_id == "asst_from_file", "assistant id from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_LUCIA_ASSISTANT_KEY", "TEST_LUCIA_VENDOR_KEY"]);
        result
    }

    #[test]
    fn deployment_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(&[
            ("OPENAI_API_KEY", "sk-alias"),
            ("LUCIA_ASSISTANT_ID", "asst_alias"),
            ("LUCIA_CATALOG_ACCESS_KEY", "vendor-key"),
            ("CRON_SECRET", "cron-alias"),
            ("N8N_WEBHOOK_URL", "https://hooks.example.com/lead"),
            ("LUCIA_LOG_LEVEL", "warn"),
            ("LUCIA_LOG_FORMAT", "pretty"),
        ]);

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.assistant.api_key.expose_secret() == "sk-alias", "OPENAI_API_KEY alias")?;
            ensure(config.sync.cron_secret.expose_secret() == "cron-alias", "CRON_SECRET alias")?;
            ensure(
                config.leads.webhook_url.as_deref() == Some("https://hooks.example.com/lead"),
                "N8N_WEBHOOK_URL alias",
            )?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "OPENAI_API_KEY",
            "LUCIA_ASSISTANT_ID",
            "LUCIA_CATALOG_ACCESS_KEY",
            "CRON_SECRET",
            "N8N_WEBHOOK_URL",
            "LUCIA_LOG_LEVEL",
            "LUCIA_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);
        env::set_var("LUCIA_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("lucia.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[assistant]
assistant_id = "asst_from_file"
poll_interval_ms = 250

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.assistant.assistant_id == "asst_test",
                "env assistant id should win over file",
            )?;
            ensure(config.assistant.poll_interval_ms == 250, "file poll interval should apply")?;
            ensure(config.leads.webhook_url.is_none(), "webhook stays optional")?;
            Ok(())
        })();

        clear_required();
        clear_vars(&["LUCIA_DATABASE_URL"]);
        result
    }

    #[test]
    fn missing_assistant_id_fails_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);
        env::remove_var("LUCIA_ASSISTANT_ID");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected missing assistant id but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Missing { key: "assistant.assistant_id", .. }),
                "missing assistant id should be reported as a missing key",
            )?;
            ensure(error.to_string().contains("LUCIA_ASSISTANT_ID"), "error names the env var")
        })();

        clear_required();
        result
    }

    #[test]
    fn narrower_scopes_skip_assistant_and_cron_sections() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        clear_required();
        clear_vars(&["OPENAI_API_KEY", "CRON_SECRET"]);
        set_vars(&[("LUCIA_CATALOG_ACCESS_KEY", "vendor-key")]);

        let result = (|| -> Result<(), String> {
            let scoped = |scope| AppConfig::load(LoadOptions { scope, ..LoadOptions::default() });

            ensure(scoped(ConfigScope::Sync).is_ok(), "sync scope needs no assistant credentials")?;
            ensure(scoped(ConfigScope::Store).is_ok(), "store scope needs no credentials")?;
            ensure(
                matches!(
                    scoped(ConfigScope::Server),
                    Err(ConfigError::Missing { key: "assistant.api_key", .. })
                ),
                "server scope still requires the assistant key",
            )?;

            env::remove_var("LUCIA_CATALOG_ACCESS_KEY");
            ensure(
                matches!(
                    scoped(ConfigScope::Sync),
                    Err(ConfigError::Missing { key: "catalog.access_key", .. })
                ),
                "sync scope requires the vendor key",
            )?;
            ensure(scoped(ConfigScope::Store).is_ok(), "store scope ignores the vendor key")
        })();

        clear_required();
        result
    }

    #[test]
    fn missing_vendor_key_fails_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);
        env::remove_var("LUCIA_CATALOG_ACCESS_KEY");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected missing vendor key".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::Missing { key: "catalog.access_key", .. }),
                "missing vendor key should be reported",
            ),
        };

        clear_required();
        result
    }

    #[test]
    fn webhook_url_must_be_http() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);

        let result = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                leads_webhook_url: Some("ftp://hooks.example.com".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => Err("expected webhook validation failure".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("leads.webhook_url")),
                "validation failure should mention leads.webhook_url",
            ),
        };

        clear_required();
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-test-key"), "debug output should not contain api key")?;
            ensure(!debug.contains("vendor-key"), "debug output should not contain vendor key")?;
            ensure(!debug.contains("cron-secret"), "debug output should not contain cron secret")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            ensure(config.assistant.poll_interval_ms == 1_000, "default poll interval is 1s")?;
            Ok(())
        })();

        clear_required();
        result
    }
}
