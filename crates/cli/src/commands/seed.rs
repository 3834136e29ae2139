use crate::commands::CommandResult;
use parchi_core::config::{AppConfig, LoadOptions};
use parchi_db::{connect_with_settings, migrations, SeedCatalog, SeedResult};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = SeedCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        // Every load is re-verified against the fixture contract, so a
        // drifted fixture file fails here rather than in a demo.
        let verification = SeedCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedResult, (&'static str, String, u8)> =
            if !verification.all_present {
                Err(("seed_verification", verification_failure_message(&verification.checks), 6u8))
            } else {
                Ok(seeded)
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", seed_summary(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_summary(seeded: &SeedResult) -> String {
    let controlled = SeedCatalog::ITEMS.iter().filter(|item| item.requires_prescription).count();
    format!(
        "demo pharmacy dataset loaded and verified:\n  - catalog: {} items ({} prescription-only)\n  - customers: {} ledger accounts (Rahul overdue, Priya settled)",
        seeded.items_seeded, controlled, seeded.customers_seeded
    )
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "some seeded rows failed verification".to_string()
    } else {
        format!("seed verification failed for: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_error_message_names_the_failed_checks() {
        let checks = [
            ("catalog-count", true),
            ("customer-rahul", false),
            ("ledger-rahul-overdue", false),
        ];

        assert_eq!(
            verification_failure_message(&checks),
            "seed verification failed for: customer-rahul, ledger-rahul-overdue"
        );
    }

    #[test]
    fn verification_error_message_falls_back_when_no_check_is_labelled() {
        let checks = [("catalog-count", true), ("prescription-flags", true)];

        assert_eq!(verification_failure_message(&checks), "some seeded rows failed verification");
    }

    #[test]
    fn summary_reports_catalog_and_ledger_counts() {
        let summary = seed_summary(&SeedResult { items_seeded: 34, customers_seeded: 2 });

        assert!(summary.contains("  - catalog: 34 items (3 prescription-only)"));
        assert!(summary.contains("  - customers: 2 ledger accounts (Rahul overdue, Priya settled)"));
    }
}
