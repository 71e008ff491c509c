use lucia_core::config::{AppConfig, ConfigScope, LoadOptions};
use lucia_db::{connect_with_config, migrations, ping};
use serde::Serialize;

use crate::commands::{current_thread_runtime, exit_code, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let code = if report.overall_status == CheckStatus::Pass { 0 } else { exit_code::DOCTOR };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code: code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    // Store checks only need the database section; full validation is its own check.
    match AppConfig::load(LoadOptions { scope: ConfigScope::Store, ..LoadOptions::default() }) {
        Ok(config) => {
            checks.push(match config.validate() {
                Ok(()) => DoctorCheck::new(
                    "config_validation",
                    CheckStatus::Pass,
                    "configuration loaded and validated for serving",
                ),
                Err(error) => DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()),
            });
            checks.extend(check_store(&config));
            checks.push(check_lead_webhook(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()));
            for name in ["database_connectivity", "schema_version", "lead_webhook"] {
                checks.push(DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Connectivity and schema checks; the schema check is skipped when the store is unreachable.
fn check_store(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::new(
                    "database_connectivity",
                    CheckStatus::Fail,
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::new("schema_version", CheckStatus::Skipped, "skipped without runtime"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::new(
                        "database_connectivity",
                        CheckStatus::Fail,
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::new(
                        "schema_version",
                        CheckStatus::Skipped,
                        "skipped because the store is unreachable",
                    ),
                ];
            }
        };

        let connectivity = match ping(&pool).await {
            Ok(()) => DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Pass,
                format!("connected using `{}`", config.database.url),
            ),
            Err(error) => DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Fail,
                format!("store probe failed: {error}"),
            ),
        };

        let latest = migrations::MIGRATOR.iter().map(|migration| migration.version).max();
        let describe = |version: Option<i64>| {
            version.map(|version| version.to_string()).unwrap_or_else(|| "none".to_string())
        };
        let schema = match migrations::applied_version(&pool).await {
            Ok(applied) if applied == latest => DoctorCheck::new(
                "schema_version",
                CheckStatus::Pass,
                format!("schema at version {}", describe(applied)),
            ),
            Ok(applied) => DoctorCheck::new(
                "schema_version",
                CheckStatus::Fail,
                format!(
                    "schema at version {} but {} is available; run `lucia migrate`",
                    describe(applied),
                    describe(latest)
                ),
            ),
            Err(error) => DoctorCheck::new(
                "schema_version",
                CheckStatus::Fail,
                format!("failed to read migration history: {error}"),
            ),
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

fn check_lead_webhook(config: &AppConfig) -> DoctorCheck {
    match &config.leads.webhook_url {
        Some(url) => {
            DoctorCheck::new("lead_webhook", CheckStatus::Pass, format!("posting to `{url}`"))
        }
        None => DoctorCheck::new(
            "lead_webhook",
            CheckStatus::Skipped,
            "not configured; qualified leads will not be forwarded",
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
