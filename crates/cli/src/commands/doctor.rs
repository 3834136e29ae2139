use parchi_core::config::{AppConfig, LlmProvider, LoadOptions};
use parchi_db::connect_with_settings;
use parchi_db::repositories::{InventoryRepository, SqlInventoryRepository};
use secrecy::ExposeSecret;
use serde::Serialize;

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

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_fallback(&config));
            checks.push(check_database_connectivity(&config));
            checks.push(check_catalog_presence(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_fallback_readiness", "database_connectivity", "catalog_presence"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_ok = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_ok { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_ok {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Fallback classification is optional, so a disabled adapter passes.
/// When it is enabled the provider prerequisites must actually be there.
fn check_llm_fallback(config: &AppConfig) -> DoctorCheck {
    let name = "llm_fallback_readiness";

    if !config.llm.enabled {
        return DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: "fallback disabled; the deterministic ladder answers every turn".to_string(),
        };
    }

    match config.llm.provider {
        LlmProvider::OpenAi => {
            let key_present = config
                .llm
                .api_key
                .as_ref()
                .map(|key| !key.expose_secret().trim().is_empty())
                .unwrap_or(false);
            if key_present {
                DoctorCheck {
                    name,
                    status: CheckStatus::Pass,
                    details: format!("openai ready (model {})", config.llm.model),
                }
            } else {
                DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: "llm.api_key is missing for the openai provider".to_string(),
                }
            }
        }
        LlmProvider::Ollama => match config.llm.base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => DoctorCheck {
                name,
                status: CheckStatus::Pass,
                details: format!("ollama at {} (model {})", url, config.llm.model),
            },
            _ => DoctorCheck {
                name,
                status: CheckStatus::Fail,
                details: "llm.base_url is missing for the ollama provider".to_string(),
            },
        },
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

/// An empty shelf is a readiness problem for an order-taking engine,
/// not just a data detail: the resolver would turn every order away.
fn check_catalog_presence(config: &AppConfig) -> DoctorCheck {
    let name = "catalog_presence";

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name,
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let items = SqlInventoryRepository::new(pool.clone())
            .list_all()
            .await
            .map_err(|error| format!("catalog query failed: {error}"))?;

        pool.close().await;
        Ok::<usize, String>(items.len())
    });

    match result {
        Ok(0) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: "catalog is empty; run `parchi seed` or add inventory items".to_string(),
        },
        Ok(count) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("{count} items on the shelf"),
        },
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error },
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

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn disabled_fallback_counts_as_ready() {
        let config = AppConfig::default();

        let check = check_llm_fallback(&config);
        assert_eq!(check.status, CheckStatus::Pass);
        assert!(check.details.contains("fallback disabled"));
    }

    #[test]
    fn enabled_openai_without_a_key_fails_readiness() {
        let mut config = AppConfig::default();
        config.llm.enabled = true;
        config.llm.provider = LlmProvider::OpenAi;
        config.llm.api_key = None;

        let check = check_llm_fallback(&config);
        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.details.contains("llm.api_key"));
    }

    #[test]
    fn enabled_openai_with_a_key_passes_and_names_the_model() {
        let mut config = AppConfig::default();
        config.llm.enabled = true;
        config.llm.provider = LlmProvider::OpenAi;
        config.llm.api_key = Some(SecretString::from("sk-test"));
        config.llm.model = "gpt-4o-mini".to_string();

        let check = check_llm_fallback(&config);
        assert_eq!(check.status, CheckStatus::Pass);
        assert!(check.details.contains("gpt-4o-mini"));
        assert!(!check.details.contains("sk-test"), "details must never carry the key");
    }

    #[test]
    fn human_rendering_marks_each_status() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck {
                    name: "config_validation",
                    status: CheckStatus::Pass,
                    details: "configuration loaded and validated".to_string(),
                },
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: "failed to connect to database: boom".to_string(),
                },
                DoctorCheck {
                    name: "catalog_presence",
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                },
            ],
        };

        let rendered = render_human(&report);
        assert!(rendered.contains("- [ok] config_validation:"));
        assert!(rendered.contains("- [fail] database_connectivity:"));
        assert!(rendered.contains("- [skip] catalog_presence:"));
    }
}
