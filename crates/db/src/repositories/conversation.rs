use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use parchi_core::flows::{ConversationContext, OrderState};

use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

/// One row per conversation id. Reloaded at the start of every turn so a
/// process restart never loses a half-collected order.
pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn load(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationContext>, RepositoryError> {
        let row = sqlx::query(
            "SELECT conversation_id, state, slots_json
             FROM conversation_contexts
             WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(context_from_row).transpose()
    }

    async fn save(&self, context: &ConversationContext) -> Result<(), RepositoryError> {
        let slots_json = serde_json::to_string(&context.slots)
            .map_err(|error| RepositoryError::Decode(format!("unserializable slots: {error}")))?;

        sqlx::query(
            "INSERT INTO conversation_contexts (conversation_id, state, slots_json, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(conversation_id) DO UPDATE SET
                state = excluded.state,
                slots_json = excluded.slots_json,
                updated_at = excluded.updated_at",
        )
        .bind(&context.conversation_id)
        .bind(context.state.as_str())
        .bind(slots_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn context_from_row(row: SqliteRow) -> Result<ConversationContext, RepositoryError> {
    let state_raw = row.try_get::<String, _>("state")?;
    let state = OrderState::parse(&state_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown conversation state `{state_raw}`"))
    })?;

    let slots_json = row.try_get::<String, _>("slots_json")?;
    let slots = serde_json::from_str(&slots_json)
        .map_err(|error| RepositoryError::Decode(format!("invalid slots_json: {error}")))?;

    Ok(ConversationContext { conversation_id: row.try_get("conversation_id")?, state, slots })
}

#[cfg(test)]
mod tests {
    use parchi_core::domain::inventory::ProductId;
    use parchi_core::flows::{
        ConversationContext, CustomerSlot, OrderState, ProductSlot, QuantitySlot,
    };

    use super::SqlConversationRepository;
    use crate::repositories::ConversationRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn half_collected_context() -> ConversationContext {
        let mut context = ConversationContext::new("wa-919876543210");
        context.state = OrderState::NeedCustomer;
        context.slots.product = Some(ProductSlot {
            product_id: ProductId(3),
            canonical_name: "Dolo 650".to_string(),
            confidence: 0.92,
        });
        context.slots.quantity = Some(QuantitySlot { value: 10, confidence: 0.95 });
        context.slots.raw_inputs.product = Some("dolo chahiye".to_string());
        context.slots.raw_inputs.quantity = Some("10".to_string());
        context
    }

    #[tokio::test]
    async fn context_round_trips_with_filled_slots() {
        let pool = setup_pool().await;
        let repo = SqlConversationRepository::new(pool.clone());

        let context = half_collected_context();
        repo.save(&context).await.expect("save context");

        let loaded = repo.load("wa-919876543210").await.expect("load context");
        assert_eq!(loaded, Some(context));

        assert_eq!(repo.load("wa-unknown").await.expect("load missing"), None);

        pool.close().await;
    }

    #[tokio::test]
    async fn save_overwrites_the_existing_row() {
        let pool = setup_pool().await;
        let repo = SqlConversationRepository::new(pool.clone());

        let mut context = half_collected_context();
        repo.save(&context).await.expect("save first turn");

        context.state = OrderState::ReadyToConfirm;
        context.slots.customer = Some(CustomerSlot { name: "Rahul".to_string(), confidence: 0.95 });
        repo.save(&context).await.expect("save second turn");

        let loaded = repo.load("wa-919876543210").await.expect("load");
        assert_eq!(loaded, Some(context));

        let row_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM conversation_contexts")
                .fetch_one(&pool)
                .await
                .expect("count rows");
        assert_eq!(row_count, 1);

        pool.close().await;
    }
}
