use std::time::Instant;

use crate::commands::CommandResult;
use parchi_chat::ChatEngine;
use parchi_core::config::{AppConfig, LoadOptions};
use parchi_core::domain::draft::DraftStatus;
use parchi_db::repositories::{
    BusinessRepository, DraftActionRepository, SqlBusinessRepository, SqlDraftActionRepository,
};
use parchi_db::{connect_with_settings, migrations, ActionExecutor, SeedCatalog};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("db_connectivity"));
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("order_pipeline"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("order_pipeline"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let db_started = Instant::now();
    let db_result = runtime.block_on(async {
        connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
    });

    match db_result {
        Ok(pool) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Pass,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: format!("connected using `{}`", config.database.url),
            });

            let migration_started = Instant::now();
            let migration_result = runtime.block_on(async { migrations::run_pending(&pool).await });
            runtime.block_on(async {
                pool.close().await;
            });

            match migration_result {
                Ok(()) => checks.push(SmokeCheck {
                    name: "migration_visibility",
                    status: SmokeStatus::Pass,
                    elapsed_ms: migration_started.elapsed().as_millis() as u64,
                    message: "migrations are visible and executable".to_string(),
                }),
                Err(error) => checks.push(SmokeCheck {
                    name: "migration_visibility",
                    status: SmokeStatus::Fail,
                    elapsed_ms: migration_started.elapsed().as_millis() as u64,
                    message: format!("migration execution failed: {error}"),
                }),
            }
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: format!("failed to connect: {error}"),
            });
            checks.push(skipped("migration_visibility"));
        }
    }

    // The pipeline check runs on its own in-memory store, so it still
    // has diagnostic value when the configured database is unreachable.
    let pipeline_started = Instant::now();
    let pipeline_result = runtime.block_on(run_order_pipeline(&config));
    match pipeline_result {
        Ok(message) => checks.push(SmokeCheck {
            name: "order_pipeline",
            status: SmokeStatus::Pass,
            elapsed_ms: pipeline_started.elapsed().as_millis() as u64,
            message,
        }),
        Err(message) => checks.push(SmokeCheck {
            name: "order_pipeline",
            status: SmokeStatus::Fail,
            elapsed_ms: pipeline_started.elapsed().as_millis() as u64,
            message,
        }),
    }

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

/// Drives one canned order through the whole stack: seed the catalog,
/// take "Rahul ko 10 Dolo 650" to the confirmation card, confirm it
/// into a draft, approve the draft, and expect an executed invoice.
/// A private in-memory database keeps the live store untouched.
async fn run_order_pipeline(config: &AppConfig) -> Result<String, String> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("failed to open the pipeline database: {error}"))?;

    migrations::run_pending(&pool)
        .await
        .map_err(|error| format!("pipeline migrations failed: {error}"))?;
    SeedCatalog::load(&pool).await.map_err(|error| format!("pipeline seed failed: {error}"))?;

    let business = SqlBusinessRepository::new(pool.clone())
        .get_or_create(&config.business.name, &config.business.owner_name)
        .await
        .map_err(|error| format!("business bootstrap failed: {error}"))?;
    let engine = ChatEngine::new(pool.clone(), business);

    let card = engine
        .on_message("smoke-1", "Rahul ko 10 Dolo 650")
        .await
        .map_err(|error| format!("order turn failed: {error}"))?;
    if !card.contains("Dolo 650") {
        return Err(format!("order turn did not reach the confirmation card: {card}"));
    }

    let confirmed = engine
        .on_message("smoke-1", "confirm")
        .await
        .map_err(|error| format!("confirm turn failed: {error}"))?;
    if !confirmed.contains("draft #") {
        return Err(format!("confirmation did not produce a draft: {confirmed}"));
    }

    let drafts = SqlDraftActionRepository::new(pool.clone())
        .list_pending(1)
        .await
        .map_err(|error| format!("draft lookup failed: {error}"))?;
    let Some(draft) = drafts.into_iter().next() else {
        return Err("no pending draft was recorded".to_string());
    };

    let approved = ActionExecutor::new(pool.clone())
        .approve_and_execute(&draft.id)
        .await
        .map_err(|error| format!("approval failed: {error}"))?;
    if approved.status != DraftStatus::Executed {
        return Err(format!("approved draft ended in status {}", approved.status.as_str()));
    }

    pool.close().await;
    Ok(format!("order for 10 x Dolo 650 drafted and approved (action #{})", approved.id.0))
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((started.elapsed().as_millis() as u64, value)),
        Err(error) => Err((started.elapsed().as_millis() as u64, error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due to a previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
