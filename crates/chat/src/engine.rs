//! The conversation engine. One entry point, [`ChatEngine::on_message`],
//! takes a raw customer message and returns the reply text.
//!
//! Every turn follows the same shape: classify intent, extract whatever
//! entities the current state allows, resolve products against live
//! inventory, push an event through the order flow, persist the context,
//! reply. The engine holds no per-conversation state of its own; the
//! `conversation_contexts` table is the single source of truth, so any
//! process on the same database can pick a conversation up mid-order.

use std::sync::Arc;

use parchi_agent::{Classification, FallbackAdapter};
use parchi_core::domain::business::Business;
use parchi_core::domain::draft::DraftStatus;
use parchi_core::extract::{self, EntitySource, ExtractedEntities, ExtractedValue, ExtractionContext};
use parchi_core::flows::{
    ConversationContext, CustomerSlot, FlowAction, FlowEngine, OrderEvent, OrderFlow, OrderState,
    ProductSlot, QuantitySlot, MIN_ORDER_CONFIDENCE,
};
use parchi_core::resolve::{self, ProductMatch, MIN_QUERY_CONFIDENCE, SUGGESTION_CONFIDENCE};
use parchi_core::{build_invoice_draft, intent, symptoms, Intent};
use parchi_db::repositories::{
    ConversationRepository, DraftActionRepository, InventoryRepository, RepositoryError,
    SqlConversationRepository, SqlDraftActionRepository, SqlInventoryRepository,
};
use parchi_db::DbPool;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::{self, ChatCommand};
use crate::replies;

/// Confidence assigned to entity hints vetted by the fallback guardrails.
/// Above the order floor so a hint can fill a slot, below anything the
/// customer typed explicitly so a literal answer always wins a merge.
const MODEL_HINT_CONFIDENCE: f64 = 0.75;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Conversational front door for one pharmacy.
pub struct ChatEngine {
    business: Business,
    flow: FlowEngine<OrderFlow>,
    conversations: SqlConversationRepository,
    inventory: SqlInventoryRepository,
    drafts: SqlDraftActionRepository,
    fallback: Option<Arc<FallbackAdapter>>,
}

impl ChatEngine {
    pub fn new(pool: DbPool, business: Business) -> Self {
        Self {
            business,
            flow: FlowEngine::default(),
            conversations: SqlConversationRepository::new(pool.clone()),
            inventory: SqlInventoryRepository::new(pool.clone()),
            drafts: SqlDraftActionRepository::new(pool),
            fallback: None,
        }
    }

    /// Attaches the LLM fallback. Without it unknown messages get the
    /// generic reply and nothing else.
    pub fn with_fallback(mut self, adapter: Arc<FallbackAdapter>) -> Self {
        self.fallback = Some(adapter);
        self
    }

    /// Handles one inbound message and returns the reply text.
    ///
    /// Replies never surface internal errors; anything unrecoverable
    /// bubbles up as [`ChatError`] for the transport to translate.
    pub async fn on_message(&self, conversation_id: &str, text: &str) -> Result<String, ChatError> {
        if text.trim().is_empty() {
            return Ok(replies::unknown());
        }
        if let Some(command) = commands::parse(text) {
            return self.handle_command(conversation_id, command).await;
        }

        let mut context = match self.conversations.load(conversation_id).await? {
            Some(context) => context,
            None => ConversationContext::new(conversation_id),
        };

        let intent = intent::classify(text, context.state);
        debug!(
            conversation_id,
            state = context.state.as_str(),
            intent = ?intent,
            "message routed"
        );

        match intent {
            Intent::Cancel => {
                self.reset_via(&mut context, OrderEvent::CancelRequested, replies::cancelled())
                    .await
            }
            Intent::Help => Ok(replies::help()),
            Intent::QueryStock => self.handle_stock_query(text).await,
            Intent::QueryPrice => self.handle_price_query(text).await,
            Intent::QuerySymptom => self.handle_symptom_query(text).await,
            Intent::Order | Intent::ContinueOrder => {
                let entities = self.extract_for_state(&context, text);
                self.advance_order(&mut context, text, entities).await
            }
            Intent::Confirm => self.handle_confirm(&mut context).await,
            Intent::Unknown => self.handle_unknown(&mut context, text).await,
        }
    }

    async fn handle_command(
        &self,
        conversation_id: &str,
        command: ChatCommand,
    ) -> Result<String, ChatError> {
        match command {
            ChatCommand::Start => {
                // A fresh /start wipes any half-collected order.
                let context = ConversationContext::new(conversation_id);
                self.conversations.save(&context).await?;
                Ok(replies::welcome(&self.business))
            }
            ChatCommand::Help => Ok(replies::help()),
            ChatCommand::Unknown { verb } => Ok(replies::unknown_command(&verb)),
        }
    }

    /// Applies a reset-style event through the flow so every state change,
    /// including aborts, stays inside the state machine.
    async fn reset_via(
        &self,
        context: &mut ConversationContext,
        event: OrderEvent,
        reply: String,
    ) -> Result<String, ChatError> {
        match self.flow.apply(&context.state, &event, &context.slots) {
            Ok(outcome) if outcome.actions.contains(&FlowAction::ClearContext) => context.reset(),
            Ok(outcome) => context.state = outcome.to,
            Err(error) => {
                warn!(
                    conversation_id = %context.conversation_id,
                    event = ?event,
                    error = %error,
                    "reset event rejected by flow, clearing anyway"
                );
                context.reset();
            }
        }
        self.conversations.save(context).await?;
        Ok(reply)
    }

    async fn handle_stock_query(&self, text: &str) -> Result<String, ChatError> {
        let items = self.inventory.list_all().await?;
        let phrase = query_phrase(text);
        match resolve::resolve(&phrase, &items, MIN_QUERY_CONFIDENCE) {
            Some(found) => Ok(replies::stock_reply(&found)),
            None => {
                let suggestions = resolve::resolve_multiple(&phrase, &items, SUGGESTION_CONFIDENCE);
                Ok(replies::did_you_mean(&phrase, &suggestions))
            }
        }
    }

    async fn handle_price_query(&self, text: &str) -> Result<String, ChatError> {
        let items = self.inventory.list_all().await?;
        let phrase = query_phrase(text);
        match resolve::resolve(&phrase, &items, MIN_QUERY_CONFIDENCE) {
            Some(found) => Ok(replies::price_reply(&found)),
            None => {
                let suggestions = resolve::resolve_multiple(&phrase, &items, SUGGESTION_CONFIDENCE);
                Ok(replies::did_you_mean(&phrase, &suggestions))
            }
        }
    }

    async fn handle_symptom_query(&self, text: &str) -> Result<String, ChatError> {
        let items = self.inventory.list_all().await?;
        let matches = symptoms::map_symptoms(text, &items);
        Ok(replies::symptom_reply(&matches))
    }

    /// Extraction is scoped by state: while one slot is being asked the
    /// whole message answers that slot, and the other ladders stay quiet
    /// so a bare "10" never reads as a product name.
    fn extract_for_state(&self, context: &ConversationContext, text: &str) -> ExtractedEntities {
        let extraction = ExtractionContext {
            last_product: context.slots.raw_inputs.product.as_deref(),
            last_quantity: context.slots.quantity.as_ref().map(|slot| slot.value),
            last_customer: context.slots.customer.as_ref().map(|slot| slot.name.as_str()),
        };
        let owner = self.business.owner_name.as_str();

        match context.state {
            OrderState::NeedProduct => ExtractedEntities {
                product: extract::extract_product(text, &extraction),
                quantity: None,
                customer: None,
            },
            OrderState::NeedQuantity => ExtractedEntities {
                product: None,
                quantity: extract::extract_quantity(text, &extraction),
                customer: None,
            },
            OrderState::NeedCustomer => ExtractedEntities {
                product: None,
                quantity: None,
                customer: customer_answer(text, &extraction, owner),
            },
            // Corrections at the confirmation card cover quantity and
            // customer. Changing the product means cancel and reorder.
            OrderState::ReadyToConfirm => ExtractedEntities {
                product: None,
                quantity: extract::extract_quantity(text, &extraction),
                customer: extract::extract_customer(text, &extraction, owner),
            },
            _ => extract::extract_all(text, &extraction, owner),
        }
    }

    /// Merges extracted entities into the slots and pushes the flow one
    /// step. Product phrases are resolved against live inventory before
    /// they are allowed into a slot.
    async fn advance_order(
        &self,
        context: &mut ConversationContext,
        text: &str,
        entities: ExtractedEntities,
    ) -> Result<String, ChatError> {
        let correcting = context.state == OrderState::ReadyToConfirm;

        if let Some(quantity) = explicit(entities.quantity) {
            context.slots.quantity = Some(QuantitySlot {
                value: quantity.value,
                confidence: quantity.confidence,
            });
            context.slots.raw_inputs.quantity = Some(text.trim().to_string());
        }
        if let Some(customer) = explicit(entities.customer) {
            context.slots.customer = Some(CustomerSlot {
                name: customer.value,
                confidence: customer.confidence,
            });
            context.slots.raw_inputs.customer = Some(text.trim().to_string());
        }
        if let Some(product) = explicit(entities.product) {
            match self.resolve_for_order(&product.value).await? {
                Some(found) => {
                    context.slots.product = Some(ProductSlot {
                        product_id: found.product_id,
                        canonical_name: found.canonical_name,
                        confidence: found.confidence,
                    });
                    context.slots.raw_inputs.product = Some(text.trim().to_string());
                }
                // A phrase that does not resolve mid-correction is noise,
                // not a reason to drop a complete order.
                None if correcting => {}
                None => return self.handle_resolution_failure(context, &product.value).await,
            }
        }

        self.transition_and_reply(context).await
    }

    async fn resolve_for_order(&self, phrase: &str) -> Result<Option<ProductMatch>, ChatError> {
        let items = self.inventory.list_all().await?;
        Ok(resolve::resolve(phrase, &items, MIN_ORDER_CONFIDENCE))
    }

    async fn handle_resolution_failure(
        &self,
        context: &mut ConversationContext,
        phrase: &str,
    ) -> Result<String, ChatError> {
        let items = self.inventory.list_all().await?;
        let suggestions = resolve::resolve_multiple(phrase, &items, SUGGESTION_CONFIDENCE);
        info!(
            conversation_id = %context.conversation_id,
            phrase,
            suggestions = suggestions.len(),
            "product resolution failed"
        );
        self.reset_via(
            context,
            OrderEvent::ResolutionFailed,
            replies::did_you_mean(phrase, &suggestions),
        )
        .await
    }

    async fn transition_and_reply(
        &self,
        context: &mut ConversationContext,
    ) -> Result<String, ChatError> {
        let outcome = match self
            .flow
            .apply(&context.state, &OrderEvent::SlotsUpdated, &context.slots)
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    conversation_id = %context.conversation_id,
                    error = %error,
                    "slot update rejected, resetting conversation"
                );
                context.reset();
                self.conversations.save(context).await?;
                return Ok(replies::unknown());
            }
        };
        context.state = outcome.to;

        let reply = match context.state {
            OrderState::NeedProduct => replies::ask_product(),
            OrderState::NeedQuantity => match &context.slots.product {
                Some(slot) => replies::ask_quantity(&slot.canonical_name),
                None => replies::ask_product(),
            },
            OrderState::NeedCustomer => replies::ask_customer(),
            OrderState::ReadyToConfirm => return self.show_confirmation(context).await,
            _ => replies::unknown(),
        };
        self.conversations.save(context).await?;
        Ok(reply)
    }

    /// Renders the confirmation card from a fresh inventory read so the
    /// price shown is the price that will be billed.
    async fn show_confirmation(
        &self,
        context: &mut ConversationContext,
    ) -> Result<String, ChatError> {
        let (product, quantity, buyer) = match (
            context.slots.product.clone(),
            context.slots.quantity.as_ref().map(|slot| slot.value),
            context.slots.customer.as_ref().map(|slot| slot.name.clone()),
        ) {
            (Some(product), Some(quantity), Some(buyer)) => (product, quantity, buyer),
            _ => {
                context.reset();
                self.conversations.save(context).await?;
                return Ok(replies::unknown());
            }
        };

        match self.inventory.find_by_id(&product.product_id).await? {
            Some(item) => {
                self.conversations.save(context).await?;
                Ok(replies::confirmation(&self.business.name, &buyer, &item, quantity))
            }
            None => {
                warn!(
                    conversation_id = %context.conversation_id,
                    product_id = product.product_id.0,
                    "resolved product vanished before confirmation"
                );
                self.reset_via(context, OrderEvent::ProductVanished, replies::product_vanished())
                    .await
            }
        }
    }

    /// Turns a confirmed order into a DRAFT action. The inventory row is
    /// fetched again here; the draft is priced from what the shelf says
    /// now, not from what it said when the card was shown.
    async fn handle_confirm(&self, context: &mut ConversationContext) -> Result<String, ChatError> {
        let product = match context.slots.product.clone() {
            Some(product) => product,
            None => {
                context.reset();
                self.conversations.save(context).await?;
                return Ok(replies::unknown());
            }
        };

        let item = match self.inventory.find_by_id(&product.product_id).await? {
            Some(item) => item,
            None => {
                warn!(
                    conversation_id = %context.conversation_id,
                    product_id = product.product_id.0,
                    "confirmed product vanished before draft creation"
                );
                return self
                    .reset_via(context, OrderEvent::ProductVanished, replies::product_vanished())
                    .await;
            }
        };

        if let Err(error) = self
            .flow
            .apply(&context.state, &OrderEvent::ConfirmReceived, &context.slots)
        {
            warn!(
                conversation_id = %context.conversation_id,
                error = %error,
                "confirm rejected by flow"
            );
            return self.transition_and_reply(context).await;
        }

        match build_invoice_draft(&self.business, &item, &context.slots) {
            Ok(new_draft) => {
                let action = self.drafts.insert(new_draft).await?;
                info!(
                    event_name = "draft_created",
                    action_id = action.id.0,
                    conversation_id = %context.conversation_id,
                    status = action.status.as_str(),
                    "invoice draft awaiting owner approval"
                );
                debug_assert_eq!(action.status, DraftStatus::Draft);
                context.reset();
                self.conversations.save(context).await?;
                Ok(replies::draft_created(&action))
            }
            Err(rejection) => {
                warn!(
                    conversation_id = %context.conversation_id,
                    rejection = %rejection,
                    "confirmed order rejected by decision gate"
                );
                context.reset();
                self.conversations.save(context).await?;
                Ok(replies::draft_failed())
            }
        }
    }

    /// Last resort for messages no deterministic path claimed. The
    /// fallback only runs on idle conversations; mid-order the slot
    /// prompts already tell the customer what is expected.
    async fn handle_unknown(
        &self,
        context: &mut ConversationContext,
        text: &str,
    ) -> Result<String, ChatError> {
        if context.state == OrderState::Idle {
            if let Some(adapter) = &self.fallback {
                if let Some(classification) = adapter.try_classify(text, context).await {
                    debug!(
                        conversation_id = %context.conversation_id,
                        intent = ?classification.intent,
                        "fallback classification accepted"
                    );
                    return self.apply_classification(context, text, classification).await;
                }
            }
        }
        Ok(replies::unknown())
    }

    /// Feeds a vetted classification back into the deterministic paths.
    /// The model picks the lane; everything after that is the same code
    /// a keyword match would have run.
    async fn apply_classification(
        &self,
        context: &mut ConversationContext,
        text: &str,
        classification: Classification,
    ) -> Result<String, ChatError> {
        match classification.intent {
            Intent::QueryStock => {
                let phrase = classification.product.unwrap_or_else(|| text.to_string());
                self.handle_stock_query(&phrase).await
            }
            Intent::Order => {
                let entities = ExtractedEntities {
                    product: classification.product.map(model_hint),
                    quantity: classification.quantity.map(model_hint),
                    customer: classification.customer.map(model_hint),
                };
                self.advance_order(context, text, entities).await
            }
            _ => Ok(replies::unknown()),
        }
    }
}

/// The product phrase for a stock or price query, falling back to the
/// trimmed message when the extractor finds nothing.
fn query_phrase(text: &str) -> String {
    extract::extract_product(text, &ExtractionContext::default())
        .map(|product| product.value)
        .unwrap_or_else(|| text.trim().to_string())
}

/// Context-carried values never fill a slot on their own; only what this
/// message actually said counts.
fn explicit<T>(value: Option<ExtractedValue<T>>) -> Option<ExtractedValue<T>> {
    value.filter(|v| v.source != EntitySource::Context)
}

/// When the customer slot was asked for directly, a plain reply like
/// "Priya didi" is the name even if no ladder pattern fires.
fn customer_answer(
    text: &str,
    context: &ExtractionContext,
    owner: &str,
) -> Option<ExtractedValue<String>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match extract::extract_customer(text, context, owner) {
        Some(value)
            if value.source == EntitySource::SelfReference
                || value.source == EntitySource::Pattern =>
        {
            Some(value)
        }
        _ => Some(ExtractedValue {
            value: trimmed.to_string(),
            confidence: 0.95,
            source: EntitySource::SlotFill,
        }),
    }
}

fn model_hint<T>(value: T) -> ExtractedValue<T> {
    ExtractedValue {
        value,
        confidence: MODEL_HINT_CONFIDENCE,
        source: EntitySource::Model,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use parchi_agent::{FallbackAdapter, LlmClient};
    use parchi_core::domain::business::{Business, BusinessId};
    use parchi_db::{connect_with_settings, migrations, DbPool};
    use sqlx::Row;

    use super::ChatEngine;
    use crate::replies;

    struct CannedClient(&'static str);

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        seed(&pool).await;
        pool
    }

    async fn seed(pool: &DbPool) {
        sqlx::query(
            "INSERT INTO businesses (id, name, owner_name, created_at)
             VALUES (1, 'Sharma Medical Store', 'Sharma', '2026-03-01T10:00:00Z')",
        )
        .execute(pool)
        .await
        .expect("seed business");

        for (id, name, price, stock, rx, used_for) in [
            (1, "Paracetamol 500mg", "2.50", 100, 0, "Fever, Headache, Body Pain"),
            (2, "Dolo 650", "3.00", 150, 0, "High Fever, Headache"),
            (3, "Crocin Advance", "4.50", 80, 0, "Fever, Cold"),
            (4, "Azithromycin 500mg", "25.50", 40, 1, "Bacterial Infection"),
        ] {
            sqlx::query(
                "INSERT INTO inventory_items
                     (id, name, unit_price, stock_quantity, requires_prescription, used_for, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, '2026-03-01T10:00:00Z', '2026-03-01T10:00:00Z')",
            )
            .bind(id)
            .bind(name)
            .bind(price)
            .bind(stock)
            .bind(rx)
            .bind(used_for)
            .execute(pool)
            .await
            .expect("seed inventory");
        }
    }

    fn shop() -> Business {
        Business {
            id: BusinessId(1),
            name: "Sharma Medical Store".to_string(),
            owner_name: "Sharma".to_string(),
        }
    }

    fn engine(pool: &DbPool) -> ChatEngine {
        ChatEngine::new(pool.clone(), shop())
    }

    async fn state_of(pool: &DbPool, conversation_id: &str) -> String {
        sqlx::query_scalar("SELECT state FROM conversation_contexts WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(pool)
            .await
            .expect("conversation state")
    }

    #[tokio::test]
    async fn single_message_order_reaches_the_confirmation_card() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        let reply = engine
            .on_message("wa-1", "Rahul ko 10 Dolo 650")
            .await
            .expect("turn");
        assert!(reply.contains("Seller: Sharma Medical Store"), "{reply}");
        assert!(reply.contains("Buyer: Rahul"), "{reply}");
        assert!(reply.contains("Product: Dolo 650"), "{reply}");
        assert!(reply.contains("\u{20b9}3.00 x 10 = \u{20b9}30.00"), "{reply}");
        assert_eq!(state_of(&pool, "wa-1").await, "ready_to_confirm");
        pool.close().await;
    }

    #[tokio::test]
    async fn missing_slots_are_asked_in_order_and_survive_restart() {
        let pool = setup_pool().await;

        let reply = engine(&pool)
            .on_message("wa-2", "dolo chahiye")
            .await
            .expect("turn");
        assert_eq!(reply, replies::ask_quantity("Dolo 650"));
        assert_eq!(state_of(&pool, "wa-2").await, "need_quantity");

        // A fresh engine on the same pool picks the order up mid-flight.
        let reply = engine(&pool).on_message("wa-2", "10").await.expect("turn");
        assert_eq!(reply, replies::ask_customer());

        let reply = engine(&pool).on_message("wa-2", "Priya").await.expect("turn");
        assert!(reply.contains("Buyer: Priya"), "{reply}");
        assert!(reply.contains("\u{20b9}3.00 x 10 = \u{20b9}30.00"), "{reply}");
        pool.close().await;
    }

    #[tokio::test]
    async fn self_reference_books_the_order_to_the_owner() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        let reply = engine
            .on_message("wa-3", "mere liye 2 crocin")
            .await
            .expect("turn");
        assert_eq!(reply, replies::ask_product());

        let reply = engine.on_message("wa-3", "crocin").await.expect("turn");
        assert!(reply.contains("Buyer: Sharma"), "{reply}");
        assert!(reply.contains("Product: Crocin Advance"), "{reply}");
        assert!(reply.contains("Quantity: 2"), "{reply}");
        pool.close().await;
    }

    #[tokio::test]
    async fn confirm_creates_a_draft_and_resets() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        engine
            .on_message("wa-4", "Rahul ko 10 Dolo 650")
            .await
            .expect("turn");
        let reply = engine.on_message("wa-4", "confirm").await.expect("turn");
        assert!(reply.contains("draft #1"), "{reply}");
        assert_eq!(state_of(&pool, "wa-4").await, "idle");

        let row = sqlx::query("SELECT intent, status, explanation FROM agent_actions")
            .fetch_one(&pool)
            .await
            .expect("draft row");
        assert_eq!(row.get::<String, _>("status"), "DRAFT");
        assert_eq!(row.get::<String, _>("intent"), "create_invoice");
        assert!(row
            .get::<String, _>("explanation")
            .contains("Invoice for Rahul: 10 x Dolo 650"));
        pool.close().await;
    }

    #[tokio::test]
    async fn cancel_clears_a_half_collected_order() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        engine.on_message("wa-5", "dolo chahiye").await.expect("turn");
        let reply = engine.on_message("wa-5", "cancel").await.expect("turn");
        assert_eq!(reply, replies::cancelled());
        assert_eq!(state_of(&pool, "wa-5").await, "idle");
        pool.close().await;
    }

    #[tokio::test]
    async fn stock_and_price_queries_leave_no_conversation_behind() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        let reply = engine.on_message("wa-6", "Dolo 650 hai kya").await.expect("turn");
        assert!(reply.contains("available hai"), "{reply}");
        assert!(reply.contains("\u{20b9}3.00"), "{reply}");

        let reply = engine
            .on_message("wa-6", "Azithromycin hai kya")
            .await
            .expect("turn");
        assert!(reply.contains("prescription"), "{reply}");

        let reply = engine.on_message("wa-6", "Dolo 650 kitne ka").await.expect("turn");
        assert!(reply.contains("\u{20b9}3.00"), "{reply}");

        let rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM conversation_contexts WHERE conversation_id = 'wa-6'",
        )
        .fetch_one(&pool)
        .await
        .expect("count");
        assert_eq!(rows, 0);
        pool.close().await;
    }

    #[tokio::test]
    async fn symptom_query_lists_matching_medicines() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        let reply = engine.on_message("wa-7", "bukhar ki dawai hai").await.expect("turn");
        assert!(reply.contains("Paracetamol 500mg"), "{reply}");
        assert!(reply.contains("Dolo 650"), "{reply}");
        assert!(reply.contains("Crocin Advance"), "{reply}");
        assert!(!reply.contains("Azithromycin"), "{reply}");
        pool.close().await;
    }

    #[tokio::test]
    async fn ambiguous_product_resets_with_suggestions() {
        let pool = setup_pool().await;
        sqlx::query(
            "INSERT INTO inventory_items
                 (id, name, unit_price, stock_quantity, requires_prescription, used_for, created_at, updated_at)
             VALUES (5, 'Dolo 500', '2.80', 60, 0, 'Fever', '2026-03-01T10:00:00Z', '2026-03-01T10:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed twin");
        let engine = engine(&pool);

        let reply = engine.on_message("wa-8", "dolo chahiye").await.expect("turn");
        assert!(reply.contains("exact nahi mila"), "{reply}");
        assert!(reply.contains("Dolo 650"), "{reply}");
        assert!(reply.contains("Dolo 500"), "{reply}");
        assert_eq!(state_of(&pool, "wa-8").await, "idle");
        pool.close().await;
    }

    #[tokio::test]
    async fn corrections_at_the_card_update_quantity_and_customer() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        engine
            .on_message("wa-9", "Rahul ko 10 Dolo 650")
            .await
            .expect("turn");

        let reply = engine.on_message("wa-9", "5").await.expect("turn");
        assert!(reply.contains("Quantity: 5"), "{reply}");
        assert!(reply.contains("= \u{20b9}15.00"), "{reply}");

        let reply = engine.on_message("wa-9", "Priya ko").await.expect("turn");
        assert!(reply.contains("Buyer: Priya"), "{reply}");
        assert!(reply.contains("Quantity: 5"), "{reply}");
        assert_eq!(state_of(&pool, "wa-9").await, "ready_to_confirm");
        pool.close().await;
    }

    #[tokio::test]
    async fn confirm_after_the_product_vanished_resets_without_a_draft() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        engine
            .on_message("wa-10", "Rahul ko 10 Dolo 650")
            .await
            .expect("turn");
        sqlx::query("DELETE FROM inventory_items WHERE id = 2")
            .execute(&pool)
            .await
            .expect("drop product");

        let reply = engine.on_message("wa-10", "confirm").await.expect("turn");
        assert_eq!(reply, replies::product_vanished());
        assert_eq!(state_of(&pool, "wa-10").await, "idle");

        let drafts: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM agent_actions")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(drafts, 0);
        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_text_without_fallback_gets_the_generic_reply() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        let reply = engine.on_message("wa-11", "namaste ji").await.expect("turn");
        assert_eq!(reply, replies::unknown());
        pool.close().await;
    }

    #[tokio::test]
    async fn fallback_classification_feeds_the_order_flow() {
        let pool = setup_pool().await;
        let adapter = FallbackAdapter::new(
            Arc::new(CannedClient(
                r#"{"intent": "create_invoice", "product": "Dolo 650", "quantity": 2, "customer": "Rahul", "confidence": "high"}"#,
            )),
            vec!["Dolo 650".to_string()],
        );
        let engine = ChatEngine::new(pool.clone(), shop()).with_fallback(Arc::new(adapter));

        let reply = engine
            .on_message("wa-12", "wahi purani wali bhej dijiye")
            .await
            .expect("turn");
        assert!(reply.contains("Product: Dolo 650"), "{reply}");
        assert!(reply.contains("Quantity: 2"), "{reply}");
        assert!(reply.contains("Buyer: Rahul"), "{reply}");
        assert_eq!(state_of(&pool, "wa-12").await, "ready_to_confirm");
        pool.close().await;
    }

    #[tokio::test]
    async fn slash_commands_reset_help_and_report_unknown_verbs() {
        let pool = setup_pool().await;
        let engine = engine(&pool);

        engine.on_message("wa-13", "dolo chahiye").await.expect("turn");
        let reply = engine.on_message("wa-13", "/start").await.expect("turn");
        assert!(reply.contains("Sharma Medical Store"), "{reply}");
        assert_eq!(state_of(&pool, "wa-13").await, "idle");

        let reply = engine.on_message("wa-13", "/help").await.expect("turn");
        assert_eq!(reply, replies::help());

        let reply = engine.on_message("wa-13", "/gibberish").await.expect("turn");
        assert!(reply.contains("/gibberish"), "{reply}");
        pool.close().await;
    }
}
