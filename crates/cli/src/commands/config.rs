use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use lucia_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// One reported setting: dotted key, display value, env vars that can set it.
struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    render(&config, detect_config_path().as_deref())
}

fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(config) {
        let source = field_source(&entry, config_file_doc.as_ref(), config_file_path);
        lines.push(format!("- {} = {} (source: {source})", entry.key, entry.value));
    }
    lines.join("\n")
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value, env_keys }
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    vec![
        entry("database.url", config.database.url.clone(), &["LUCIA_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["LUCIA_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["LUCIA_DATABASE_TIMEOUT_SECS"],
        ),
        entry(
            "assistant.api_key",
            redact_secret(config.assistant.api_key.expose_secret()),
            &["LUCIA_ASSISTANT_API_KEY", "OPENAI_API_KEY"],
        ),
        entry(
            "assistant.assistant_id",
            config.assistant.assistant_id.clone(),
            &["LUCIA_ASSISTANT_ID"],
        ),
        entry(
            "assistant.base_url",
            config.assistant.base_url.clone(),
            &["LUCIA_ASSISTANT_BASE_URL"],
        ),
        entry(
            "assistant.poll_interval_ms",
            config.assistant.poll_interval_ms.to_string(),
            &["LUCIA_ASSISTANT_POLL_INTERVAL_MS"],
        ),
        entry(
            "assistant.run_deadline_secs",
            config.assistant.run_deadline_secs.to_string(),
            &["LUCIA_ASSISTANT_RUN_DEADLINE_SECS"],
        ),
        entry(
            "assistant.request_timeout_secs",
            config.assistant.request_timeout_secs.to_string(),
            &["LUCIA_ASSISTANT_REQUEST_TIMEOUT_SECS"],
        ),
        entry("catalog.api_url", config.catalog.api_url.clone(), &["LUCIA_CATALOG_API_URL"]),
        entry(
            "catalog.access_key",
            redact_secret(config.catalog.access_key.expose_secret()),
            &["LUCIA_CATALOG_ACCESS_KEY"],
        ),
        entry("catalog.lang", config.catalog.lang.clone(), &["LUCIA_CATALOG_LANG"]),
        entry(
            "leads.webhook_url",
            config.leads.webhook_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["LUCIA_LEADS_WEBHOOK_URL", "N8N_WEBHOOK_URL"],
        ),
        entry(
            "sync.cron_secret",
            redact_secret(config.sync.cron_secret.expose_secret()),
            &["LUCIA_SYNC_CRON_SECRET", "CRON_SECRET"],
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["LUCIA_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["LUCIA_SERVER_PORT", "PORT"]),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["LUCIA_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["LUCIA_LOGGING_LEVEL", "LUCIA_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["LUCIA_LOGGING_FORMAT", "LUCIA_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("lucia.toml"), PathBuf::from("config/lucia.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    entry: &Entry,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = entry.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, entry.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps a short recognisable prefix (`sk-***`) and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
