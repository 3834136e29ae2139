use chrono::Utc;
use sqlx::Row;
use thiserror::Error;
use tracing::info;

use parchi_core::domain::draft::{DraftAction, DraftActionId, DraftPayload, DraftStatus};
use parchi_core::errors::DomainError;

use crate::repositories::draft_action::draft_action_from_row;
use crate::repositories::RepositoryError;
use crate::DbPool;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("draft action {0} not found")]
    NotFound(i64),
    #[error("action already {}", status.as_str())]
    NotActionable { status: DraftStatus },
    #[error("draft payload failed validation: {0}")]
    InvalidPayload(#[from] DomainError),
    #[error("{0}")]
    Repository(#[from] RepositoryError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Runs the owner's decision on a draft. Approval and the financial side
/// effect share one transaction: either the status reaches EXECUTED with
/// all rows written, or everything rolls back and the draft stays DRAFT.
pub struct ActionExecutor {
    pool: DbPool,
}

impl ActionExecutor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn approve_and_execute(
        &self,
        id: &DraftActionId,
    ) -> Result<DraftAction, ExecuteError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, business_id, intent, payload_json, status, explanation, created_at
             FROM agent_actions
             WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(ExecuteError::NotFound(id.0));
        };

        let mut action = draft_action_from_row(row)?;
        if action.status != DraftStatus::Draft {
            return Err(ExecuteError::NotActionable { status: action.status });
        }

        // The status filter makes the flip lose to any concurrent
        // finalize instead of double-executing.
        let approved =
            sqlx::query("UPDATE agent_actions SET status = 'APPROVED' WHERE id = ? AND status = 'DRAFT'")
                .bind(id.0)
                .execute(&mut *tx)
                .await?;
        if approved.rows_affected() != 1 {
            return Err(ExecuteError::NotActionable { status: action.status });
        }

        action.payload.validate()?;
        execute_payload(&mut tx, &action.payload).await?;

        sqlx::query("UPDATE agent_actions SET status = 'EXECUTED' WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        action.status = DraftStatus::Executed;
        info!(
            event_name = "action_executed",
            action_id = id.0,
            intent = action.payload.intent(),
            "draft action approved and executed"
        );
        Ok(action)
    }

    pub async fn reject(&self, id: &DraftActionId) -> Result<DraftAction, ExecuteError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, business_id, intent, payload_json, status, explanation, created_at
             FROM agent_actions
             WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(ExecuteError::NotFound(id.0));
        };

        let mut action = draft_action_from_row(row)?;
        if action.status != DraftStatus::Draft {
            return Err(ExecuteError::NotActionable { status: action.status });
        }

        let rejected =
            sqlx::query("UPDATE agent_actions SET status = 'REJECTED' WHERE id = ? AND status = 'DRAFT'")
                .bind(id.0)
                .execute(&mut *tx)
                .await?;
        if rejected.rows_affected() != 1 {
            return Err(ExecuteError::NotActionable { status: action.status });
        }

        tx.commit().await?;

        action.status = DraftStatus::Rejected;
        info!(event_name = "action_rejected", action_id = id.0, "draft action rejected");
        Ok(action)
    }
}

async fn execute_payload(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    payload: &DraftPayload,
) -> Result<(), ExecuteError> {
    match payload {
        DraftPayload::CreateInvoice { customer_name, amount, .. } => {
            let customer_id = find_or_create_customer(tx, customer_name).await?;
            let now = Utc::now().to_rfc3339();

            let invoice = sqlx::query(
                "INSERT INTO invoices (customer_id, amount, status, created_at)
                 VALUES (?, ?, 'draft', ?)",
            )
            .bind(customer_id)
            .bind(amount.to_string())
            .bind(&now)
            .execute(&mut **tx)
            .await?;
            let invoice_id = invoice.last_insert_rowid();

            sqlx::query(
                "INSERT INTO ledger_entries (customer_id, debit, credit, description, created_at)
                 VALUES (?, ?, '0', ?, ?)",
            )
            .bind(customer_id)
            .bind(amount.to_string())
            .bind(format!("Invoice #{invoice_id}"))
            .bind(&now)
            .execute(&mut **tx)
            .await?;

            Ok(())
        }
        DraftPayload::SendPaymentReminder {
            customer_name, amount_due, days_overdue, phone, ..
        } => {
            // Delivery stays a structured log line until a message
            // transport exists; the EXECUTED status is the record.
            info!(
                event_name = "payment_reminder_sent",
                customer = customer_name.as_str(),
                amount_due = %amount_due,
                days_overdue,
                has_phone = phone.is_some(),
                "payment reminder delivered"
            );
            Ok(())
        }
    }
}

async fn find_or_create_customer(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    name: &str,
) -> Result<i64, ExecuteError> {
    let existing = sqlx::query("SELECT id FROM customers WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;

    if let Some(row) = existing {
        return Ok(row.try_get("id")?);
    }

    let inserted = sqlx::query("INSERT INTO customers (name, phone, created_at) VALUES (?, NULL, ?)")
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await?;

    Ok(inserted.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use parchi_core::domain::business::BusinessId;
    use parchi_core::domain::customer::CustomerId;
    use parchi_core::domain::draft::{DraftPayload, DraftStatus, NewDraftAction};
    use parchi_core::domain::inventory::ProductId;

    use super::{ActionExecutor, ExecuteError};
    use crate::repositories::{DraftActionRepository, SqlDraftActionRepository};
    use crate::{connect_with_settings, migrations, DbPool};

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
        .expect("insert business");
        pool
    }

    fn invoice_draft(quantity: i64) -> NewDraftAction {
        let unit_price = Decimal::new(300, 2);
        NewDraftAction {
            business_id: BusinessId(1),
            payload: DraftPayload::CreateInvoice {
                customer_name: "Rahul".to_string(),
                product: "Dolo 650".to_string(),
                product_id: ProductId(2),
                quantity,
                unit_price,
                amount: unit_price * Decimal::from(quantity),
                requires_prescription: false,
                seller: "Sharma Medical Store".to_string(),
                buyer: "Rahul".to_string(),
            },
            explanation: format!("Invoice for Rahul: {quantity} x Dolo 650"),
        }
    }

    async fn stored_status(pool: &DbPool, id: i64) -> String {
        sqlx::query_scalar("SELECT status FROM agent_actions WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .expect("read status")
    }

    async fn count(pool: &DbPool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table}"))
            .fetch_one(pool)
            .await
            .expect("count rows")
    }

    #[tokio::test]
    async fn approve_writes_invoice_and_ledger_debit_atomically() {
        let pool = setup_pool().await;
        let repo = SqlDraftActionRepository::new(pool.clone());
        let executor = ActionExecutor::new(pool.clone());

        let draft = repo.insert(invoice_draft(10)).await.expect("insert draft");

        let executed = executor.approve_and_execute(&draft.id).await.expect("approve");
        assert_eq!(executed.status, DraftStatus::Executed);
        assert_eq!(stored_status(&pool, draft.id.0).await, "EXECUTED");

        let (amount, status): (String, String) =
            sqlx::query_as("SELECT amount, status FROM invoices WHERE id = 1")
                .fetch_one(&pool)
                .await
                .expect("read invoice");
        assert_eq!(amount, "30.00");
        assert_eq!(status, "draft");

        let (debit, description): (String, String) =
            sqlx::query_as("SELECT debit, description FROM ledger_entries WHERE id = 1")
                .fetch_one(&pool)
                .await
                .expect("read ledger entry");
        assert_eq!(debit, "30.00");
        assert_eq!(description, "Invoice #1");

        let customer_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM customers WHERE name = 'Rahul'")
                .fetch_one(&pool)
                .await
                .expect("count customers");
        assert_eq!(customer_count, 1, "execution should create the customer once");

        pool.close().await;
    }

    #[tokio::test]
    async fn second_approval_hits_the_status_guard() {
        let pool = setup_pool().await;
        let repo = SqlDraftActionRepository::new(pool.clone());
        let executor = ActionExecutor::new(pool.clone());

        let draft = repo.insert(invoice_draft(10)).await.expect("insert draft");
        executor.approve_and_execute(&draft.id).await.expect("first approve");

        let error = executor.approve_and_execute(&draft.id).await.expect_err("second approve");
        assert!(
            matches!(error, ExecuteError::NotActionable { status: DraftStatus::Executed }),
            "unexpected error: {error}"
        );
        assert_eq!(count(&pool, "invoices").await, 1, "no double billing");

        pool.close().await;
    }

    #[tokio::test]
    async fn reject_is_terminal_and_has_no_side_effects() {
        let pool = setup_pool().await;
        let repo = SqlDraftActionRepository::new(pool.clone());
        let executor = ActionExecutor::new(pool.clone());

        let draft = repo.insert(invoice_draft(10)).await.expect("insert draft");

        let rejected = executor.reject(&draft.id).await.expect("reject");
        assert_eq!(rejected.status, DraftStatus::Rejected);
        assert_eq!(count(&pool, "invoices").await, 0);
        assert_eq!(count(&pool, "ledger_entries").await, 0);

        let error = executor.approve_and_execute(&draft.id).await.expect_err("approve rejected");
        assert!(matches!(
            error,
            ExecuteError::NotActionable { status: DraftStatus::Rejected }
        ));

        let error = executor.reject(&draft.id).await.expect_err("reject twice");
        assert!(matches!(
            error,
            ExecuteError::NotActionable { status: DraftStatus::Rejected }
        ));

        pool.close().await;
    }

    #[tokio::test]
    async fn failed_execution_rolls_back_to_draft() {
        let pool = setup_pool().await;
        let repo = SqlDraftActionRepository::new(pool.clone());
        let executor = ActionExecutor::new(pool.clone());

        // Quantity zero slips past the repository but fails payload
        // validation inside the transaction, after the APPROVED flip.
        let draft = repo.insert(invoice_draft(0)).await.expect("insert bad draft");

        let error = executor.approve_and_execute(&draft.id).await.expect_err("approve bad draft");
        assert!(matches!(error, ExecuteError::InvalidPayload(_)));

        assert_eq!(stored_status(&pool, draft.id.0).await, "DRAFT");
        assert_eq!(count(&pool, "invoices").await, 0);
        assert_eq!(count(&pool, "ledger_entries").await, 0);
        assert_eq!(count(&pool, "customers").await, 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let pool = setup_pool().await;
        let executor = ActionExecutor::new(pool.clone());

        let error = executor
            .approve_and_execute(&parchi_core::domain::draft::DraftActionId(999))
            .await
            .expect_err("approve unknown");
        assert!(matches!(error, ExecuteError::NotFound(999)));

        pool.close().await;
    }

    #[tokio::test]
    async fn reminder_execution_writes_no_billing_rows() {
        let pool = setup_pool().await;
        let repo = SqlDraftActionRepository::new(pool.clone());
        let executor = ActionExecutor::new(pool.clone());

        let draft = repo
            .insert(NewDraftAction {
                business_id: BusinessId(1),
                payload: DraftPayload::SendPaymentReminder {
                    customer_id: CustomerId(3),
                    customer_name: "Asha".to_string(),
                    amount_due: Decimal::new(50000, 2),
                    days_overdue: 42,
                    phone: None,
                },
                explanation: "Reminder for Asha".to_string(),
            })
            .await
            .expect("insert reminder");

        let executed = executor.approve_and_execute(&draft.id).await.expect("approve reminder");
        assert_eq!(executed.status, DraftStatus::Executed);
        assert_eq!(count(&pool, "invoices").await, 0);
        assert_eq!(count(&pool, "ledger_entries").await, 0);

        pool.close().await;
    }
}
