use std::sync::Arc;
use std::time::Duration;

use parchi_agent::llm::LlmConfig as CompletionConfig;
use parchi_agent::{FallbackAdapter, HttpLlmClient};
use parchi_chat::ChatEngine;
use parchi_core::config::{AppConfig, ConfigError, LlmConfig as LlmSettings, LlmProvider};
use parchi_db::repositories::{
    BusinessRepository, InventoryRepository, RepositoryError, SqlBusinessRepository,
    SqlInventoryRepository,
};
use parchi_db::{connect_with_settings, migrations, ActionExecutor, DbPool, ReminderScanner};
use secrecy::SecretString;
use thiserror::Error;
use tracing::info;

use crate::routes::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("repository error during bootstrap: {0}")]
    Repository(#[from] RepositoryError),
    #[error("llm client construction failed: {0}")]
    Llm(#[source] anyhow::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "bootstrap_started", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "migrations_applied", "database migrations applied");

    let businesses = SqlBusinessRepository::new(db_pool.clone());
    let business =
        businesses.get_or_create(&config.business.name, &config.business.owner_name).await?;

    let mut engine = ChatEngine::new(db_pool.clone(), business.clone());
    if config.llm.enabled {
        let adapter = build_fallback(&config.llm, &db_pool).await?;
        engine = engine.with_fallback(Arc::new(adapter));
        info!(
            event_name = "llm_fallback_enabled",
            provider = ?config.llm.provider,
            model = %config.llm.model,
            "fallback classifier attached"
        );
    }

    let state = ApiState {
        pool: db_pool.clone(),
        engine: Arc::new(engine),
        drafts: Arc::new(parchi_db::repositories::SqlDraftActionRepository::new(db_pool.clone())),
        executor: Arc::new(ActionExecutor::new(db_pool.clone())),
        scanner: Arc::new(ReminderScanner::new(
            db_pool.clone(),
            business.id,
            config.scanner.overdue_days,
        )),
    };

    info!(
        event_name = "bootstrap_complete",
        business = %business.name,
        owner = %business.owner_name,
        "application ready"
    );
    Ok(Application { config, db_pool, state })
}

/// Builds the completion client for whichever OpenAI-compatible endpoint
/// is configured. Ollama exposes the same protocol and ignores the
/// bearer token, so a placeholder key keeps the client uniform.
async fn build_fallback(
    llm: &LlmSettings,
    pool: &DbPool,
) -> Result<FallbackAdapter, BootstrapError> {
    let api_key =
        llm.api_key.clone().unwrap_or_else(|| SecretString::from("ollama"));
    let client = HttpLlmClient::new(
        CompletionConfig {
            api_url: completion_url(llm),
            model: llm.model.clone(),
            timeout: Duration::from_secs(llm.timeout_secs),
            max_retries: llm.max_retries,
        },
        api_key,
    )
    .map_err(BootstrapError::Llm)?;

    let inventory = SqlInventoryRepository::new(pool.clone());
    let catalog_names =
        inventory.list_all().await?.into_iter().map(|item| item.name).collect();

    Ok(FallbackAdapter::new(Arc::new(client), catalog_names))
}

fn completion_url(llm: &LlmSettings) -> String {
    let root = match (&llm.base_url, llm.provider) {
        (Some(url), _) => url.trim_end_matches('/').to_string(),
        (None, LlmProvider::OpenAi) => "https://api.openai.com".to_string(),
        (None, LlmProvider::Ollama) => "http://localhost:11434".to_string(),
    };
    format!("{root}/v1/chat/completions")
}

#[cfg(test)]
mod tests {
    use parchi_core::config::{AppConfig, LlmProvider};
    use parchi_db::repositories::{BusinessRepository, SqlBusinessRepository};
    use secrecy::SecretString;

    use super::{bootstrap_with_config, completion_url};

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:?cache=shared".to_string();
        config.database.max_connections = 1;
        config
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_registers_the_business() {
        let app = bootstrap_with_config(memory_config()).await.expect("bootstrap");

        let (name, owner): (String, String) =
            sqlx::query_as("SELECT name, owner_name FROM businesses WHERE id = 1")
                .fetch_one(&app.db_pool)
                .await
                .expect("business row");
        assert_eq!(name, "Sharma Medical Store");
        assert_eq!(owner, "Sharma");

        let reply = app.state.engine.on_message("boot-check", "/help").await.expect("turn");
        assert!(reply.contains("Order"), "{reply}");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn second_bootstrap_reuses_the_business_row() {
        let app = bootstrap_with_config(memory_config()).await.expect("first bootstrap");

        let businesses = SqlBusinessRepository::new(app.db_pool.clone());
        let again = businesses
            .get_or_create("Sharma Medical Store", "Sharma")
            .await
            .expect("resolve business");
        assert_eq!(again.id.0, 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM businesses")
            .fetch_one(&app.db_pool)
            .await
            .expect("count");
        assert_eq!(count, 1);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn enabled_llm_fallback_bootstraps_with_an_api_key() {
        let mut config = memory_config();
        config.llm.enabled = true;
        config.llm.provider = LlmProvider::OpenAi;
        config.llm.base_url = None;
        config.llm.api_key = Some(SecretString::from("sk-test"));

        let app = bootstrap_with_config(config).await.expect("bootstrap with fallback");
        app.db_pool.close().await;
    }

    #[test]
    fn completion_urls_cover_both_providers() {
        let mut llm = AppConfig::default().llm;
        assert_eq!(completion_url(&llm), "http://localhost:11434/v1/chat/completions");

        llm.provider = LlmProvider::OpenAi;
        llm.base_url = None;
        assert_eq!(completion_url(&llm), "https://api.openai.com/v1/chat/completions");

        llm.base_url = Some("https://llm.internal:8443/".to_string());
        assert_eq!(completion_url(&llm), "https://llm.internal:8443/v1/chat/completions");
    }
}
