//! HTTP surface for the owner: chat in, drafts out, decisions back.
//!
//! Messages go through the same [`ChatEngine`] a messaging transport
//! would use, so the API is also the test harness for the whole
//! conversational path. Approval endpoints are thin wrappers over the
//! executor; every status transition they report has already been
//! committed when the response leaves.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use parchi_chat::{ChatEngine, ChatError};
use parchi_core::domain::draft::{DraftAction, DraftActionId};
use parchi_db::repositories::{DraftActionRepository, RepositoryError, SqlDraftActionRepository};
use parchi_db::{ActionExecutor, DbPool, ExecuteError, ReminderScanner, ScanError};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::error;

#[derive(Clone)]
pub struct ApiState {
    pub pool: DbPool,
    pub engine: Arc<ChatEngine>,
    pub drafts: Arc<SqlDraftActionRepository>,
    pub executor: Arc<ActionExecutor>,
    pub scanner: Arc<ReminderScanner>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/messages", post(post_message))
        .route("/api/v1/actions", get(list_actions))
        .route("/api/v1/actions/{id}", get(get_action))
        .route("/api/v1/actions/{id}/approve", post(approve_action))
        .route("/api/v1/actions/{id}/reject", post(reject_action))
        .route("/api/v1/reminders/scan", post(scan_reminders))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    conversation_id: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    reply: String,
}

#[derive(Debug, Deserialize)]
struct ActionsQuery {
    status: Option<String>,
    limit: Option<i64>,
}

/// Wire shape for a draft action. The payload rides along verbatim so
/// the owner sees exactly what approval will execute.
#[derive(Debug, Serialize)]
struct ActionView {
    id: i64,
    intent: String,
    status: String,
    explanation: String,
    payload: serde_json::Value,
    created_at: String,
}

impl From<DraftAction> for ActionView {
    fn from(action: DraftAction) -> Self {
        Self {
            id: action.id.0,
            intent: action.payload.intent().to_string(),
            status: action.status.as_str().to_string(),
            explanation: action.explanation,
            payload: serde_json::to_value(&action.payload).unwrap_or(serde_json::Value::Null),
            created_at: action.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ActionsResponse {
    actions: Vec<ActionView>,
}

#[derive(Debug, Serialize)]
struct DecisionResponse {
    id: i64,
    status: String,
}

#[derive(Debug, Serialize)]
struct ScanResponse {
    created: u32,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    checked_at: String,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready",
                database: "ready",
                checked_at: Utc::now().to_rfc3339(),
            }),
        ),
        Err(error) => {
            error!(error = %error, "health check database probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "degraded",
                    checked_at: Utc::now().to_rfc3339(),
                }),
            )
        }
    }
}

async fn post_message(
    State(state): State<ApiState>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ApiError>)> {
    let conversation_id = body.conversation_id.trim();
    if conversation_id.is_empty() {
        return Err(bad_request("conversation_id is required"));
    }

    let reply =
        state.engine.on_message(conversation_id, &body.text).await.map_err(chat_error)?;
    Ok(Json(MessageResponse { reply }))
}

async fn list_actions(
    State(state): State<ApiState>,
    Query(query): Query<ActionsQuery>,
) -> Result<Json<ActionsResponse>, (StatusCode, Json<ApiError>)> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let actions = match query.status.as_deref().unwrap_or("pending") {
        "pending" => state.drafts.list_pending(limit).await,
        "all" => state.drafts.list_recent(limit).await,
        other => {
            return Err(bad_request(&format!(
                "unsupported status filter `{other}` (expected pending|all)"
            )))
        }
    }
    .map_err(repository_error)?;

    Ok(Json(ActionsResponse { actions: actions.into_iter().map(ActionView::from).collect() }))
}

async fn get_action(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<ActionView>, (StatusCode, Json<ApiError>)> {
    let action = state
        .drafts
        .find_by_id(&DraftActionId(id))
        .await
        .map_err(repository_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ApiError { error: format!("draft action {id} not found") }),
            )
        })?;
    Ok(Json(ActionView::from(action)))
}

async fn approve_action(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<DecisionResponse>, (StatusCode, Json<ApiError>)> {
    let action =
        state.executor.approve_and_execute(&DraftActionId(id)).await.map_err(execute_error)?;
    Ok(Json(DecisionResponse { id: action.id.0, status: action.status.as_str().to_string() }))
}

async fn reject_action(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<DecisionResponse>, (StatusCode, Json<ApiError>)> {
    let action = state.executor.reject(&DraftActionId(id)).await.map_err(execute_error)?;
    Ok(Json(DecisionResponse { id: action.id.0, status: action.status.as_str().to_string() }))
}

async fn scan_reminders(
    State(state): State<ApiState>,
) -> Result<Json<ScanResponse>, (StatusCode, Json<ApiError>)> {
    let created = state.scanner.scan_once().await.map_err(scan_error)?;
    Ok(Json(ScanResponse { created }))
}

fn bad_request(message: &str) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { error: message.to_string() }))
}

fn chat_error(error: ChatError) -> (StatusCode, Json<ApiError>) {
    error!(error = %error, "chat engine failed to handle message");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError { error: "an internal error occurred".to_string() }),
    )
}

fn repository_error(error: RepositoryError) -> (StatusCode, Json<ApiError>) {
    error!(error = %error, "draft repository error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError { error: "an internal repository error occurred".to_string() }),
    )
}

fn scan_error(error: ScanError) -> (StatusCode, Json<ApiError>) {
    error!(error = %error, "reminder scan failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError { error: "reminder scan failed".to_string() }),
    )
}

fn execute_error(error: ExecuteError) -> (StatusCode, Json<ApiError>) {
    match error {
        ExecuteError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ApiError { error: format!("draft action {id} not found") }),
        ),
        ExecuteError::NotActionable { status } => (
            StatusCode::CONFLICT,
            Json(ApiError { error: format!("action already {}", status.as_str()) }),
        ),
        ExecuteError::InvalidPayload(error) => {
            error!(error = %error, "draft payload failed validation at execution");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError { error: format!("draft payload failed validation: {error}") }),
            )
        }
        ExecuteError::Repository(error) => repository_error(error),
        ExecuteError::Database(error) => {
            error!(error = %error, "draft execution database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError { error: "an internal database error occurred".to_string() }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::Json;
    use parchi_chat::ChatEngine;
    use parchi_core::domain::business::{Business, BusinessId};
    use parchi_core::domain::draft::{DraftPayload, NewDraftAction};
    use parchi_core::domain::inventory::ProductId;
    use parchi_db::repositories::{DraftActionRepository, SqlDraftActionRepository};
    use parchi_db::{connect_with_settings, migrations, ActionExecutor, DbPool, ReminderScanner};
    use rust_decimal::Decimal;

    use super::{
        approve_action, get_action, health, list_actions, post_message, reject_action,
        scan_reminders, ActionsQuery, ApiState, MessageRequest,
    };

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        sqlx::query(
            "INSERT INTO businesses (id, name, owner_name, created_at)
             VALUES (1, 'Sharma Medical Store', 'Sharma', '2026-03-01T10:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed business");

        sqlx::query(
            "INSERT INTO inventory_items
                 (id, name, unit_price, stock_quantity, requires_prescription, used_for, created_at, updated_at)
             VALUES (2, 'Dolo 650', '3.00', 150, 0, 'High Fever, Headache', '2026-03-01T10:00:00Z', '2026-03-01T10:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed inventory");

        pool
    }

    fn state(pool: &DbPool) -> State<ApiState> {
        let business = Business {
            id: BusinessId(1),
            name: "Sharma Medical Store".to_string(),
            owner_name: "Sharma".to_string(),
        };
        State(ApiState {
            pool: pool.clone(),
            engine: Arc::new(ChatEngine::new(pool.clone(), business)),
            drafts: Arc::new(SqlDraftActionRepository::new(pool.clone())),
            executor: Arc::new(ActionExecutor::new(pool.clone())),
            scanner: Arc::new(ReminderScanner::new(pool.clone(), BusinessId(1), 30)),
        })
    }

    fn invoice_draft() -> NewDraftAction {
        let unit_price = Decimal::new(300, 2);
        NewDraftAction {
            business_id: BusinessId(1),
            payload: DraftPayload::CreateInvoice {
                customer_name: "Rahul".to_string(),
                product: "Dolo 650".to_string(),
                product_id: ProductId(2),
                quantity: 10,
                unit_price,
                amount: unit_price * Decimal::from(10),
                requires_prescription: false,
                seller: "Sharma Medical Store".to_string(),
                buyer: "Rahul".to_string(),
            },
            explanation: "Invoice for Rahul: 10 x Dolo 650".to_string(),
        }
    }

    fn message(conversation_id: &str, text: &str) -> Json<MessageRequest> {
        Json(MessageRequest {
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn message_endpoint_round_trips_an_order_to_a_pending_draft() {
        let pool = setup_pool().await;

        let reply = post_message(state(&pool), message("wa-1", "Rahul ko 10 Dolo 650"))
            .await
            .expect("card turn");
        assert!(reply.0.reply.contains("Dolo 650"), "{}", reply.0.reply);

        let reply = post_message(state(&pool), message("wa-1", "confirm"))
            .await
            .expect("confirm turn");
        assert!(reply.0.reply.contains("draft #1"), "{}", reply.0.reply);

        let listed = list_actions(
            state(&pool),
            Query(ActionsQuery { status: None, limit: None }),
        )
        .await
        .expect("list pending");
        assert_eq!(listed.0.actions.len(), 1);

        let action = &listed.0.actions[0];
        assert_eq!(action.intent, "create_invoice");
        assert_eq!(action.status, "DRAFT");
        assert_eq!(action.payload["kind"], "create_invoice");
        assert_eq!(action.payload["product"], "Dolo 650");

        pool.close().await;
    }

    #[tokio::test]
    async fn message_endpoint_requires_a_conversation_id() {
        let pool = setup_pool().await;

        let error = post_message(state(&pool), message("   ", "dolo chahiye"))
            .await
            .expect_err("blank id");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);

        pool.close().await;
    }

    #[tokio::test]
    async fn approval_executes_once_and_conflicts_after() {
        let pool = setup_pool().await;
        let repo = SqlDraftActionRepository::new(pool.clone());
        let draft = repo.insert(invoice_draft()).await.expect("insert draft");

        let decision = approve_action(state(&pool), Path(draft.id.0)).await.expect("approve");
        assert_eq!(decision.0.status, "EXECUTED");

        let error =
            approve_action(state(&pool), Path(draft.id.0)).await.expect_err("second approve");
        assert_eq!(error.0, StatusCode::CONFLICT);

        let invoices: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM invoices")
            .fetch_one(&pool)
            .await
            .expect("count invoices");
        assert_eq!(invoices, 1, "no double billing");

        let view = get_action(state(&pool), Path(draft.id.0)).await.expect("fetch");
        assert_eq!(view.0.status, "EXECUTED");

        pool.close().await;
    }

    #[tokio::test]
    async fn rejection_is_terminal() {
        let pool = setup_pool().await;
        let repo = SqlDraftActionRepository::new(pool.clone());
        let draft = repo.insert(invoice_draft()).await.expect("insert draft");

        let decision = reject_action(state(&pool), Path(draft.id.0)).await.expect("reject");
        assert_eq!(decision.0.status, "REJECTED");

        let error =
            approve_action(state(&pool), Path(draft.id.0)).await.expect_err("approve rejected");
        assert_eq!(error.0, StatusCode::CONFLICT);

        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_action_ids_are_not_found() {
        let pool = setup_pool().await;

        let error = approve_action(state(&pool), Path(999)).await.expect_err("approve unknown");
        assert_eq!(error.0, StatusCode::NOT_FOUND);

        let error = get_action(state(&pool), Path(999)).await.expect_err("fetch unknown");
        assert_eq!(error.0, StatusCode::NOT_FOUND);

        pool.close().await;
    }

    #[tokio::test]
    async fn actions_filter_rejects_unknown_status_values() {
        let pool = setup_pool().await;

        let error = list_actions(
            state(&pool),
            Query(ActionsQuery { status: Some("bogus".to_string()), limit: None }),
        )
        .await
        .expect_err("bogus filter");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);

        pool.close().await;
    }

    #[tokio::test]
    async fn all_filter_includes_finalized_actions() {
        let pool = setup_pool().await;
        let repo = SqlDraftActionRepository::new(pool.clone());
        let draft = repo.insert(invoice_draft()).await.expect("insert draft");
        reject_action(state(&pool), Path(draft.id.0)).await.expect("reject");

        let pending = list_actions(
            state(&pool),
            Query(ActionsQuery { status: Some("pending".to_string()), limit: None }),
        )
        .await
        .expect("list pending");
        assert!(pending.0.actions.is_empty());

        let all = list_actions(
            state(&pool),
            Query(ActionsQuery { status: Some("all".to_string()), limit: None }),
        )
        .await
        .expect("list all");
        assert_eq!(all.0.actions.len(), 1);
        assert_eq!(all.0.actions[0].status, "REJECTED");

        pool.close().await;
    }

    #[tokio::test]
    async fn scan_endpoint_reports_created_reminders() {
        let pool = setup_pool().await;
        sqlx::query(
            "INSERT INTO customers (id, name, phone, created_at)
             VALUES (1, 'Rahul', NULL, '2026-01-05T09:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed customer");
        sqlx::query(
            "INSERT INTO ledger_entries (customer_id, debit, credit, description, created_at)
             VALUES (1, '350.00', '0', 'Invoice #1', '2026-01-10T10:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed debt");

        let scanned = scan_reminders(state(&pool)).await.expect("scan");
        assert_eq!(scanned.0.created, 1);

        // The open reminder blocks a duplicate on the next pass.
        let scanned = scan_reminders(state(&pool)).await.expect("rescan");
        assert_eq!(scanned.0.created, 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn health_reports_ready_with_a_reachable_database() {
        let pool = setup_pool().await;

        let (status, Json(payload)) = health(state(&pool)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");

        pool.close().await;
    }
}
