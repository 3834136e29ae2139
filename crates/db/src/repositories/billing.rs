use sqlx::{sqlite::SqliteRow, Row};

use parchi_core::domain::billing::{Invoice, InvoiceId, InvoiceStatus, LedgerEntry};
use parchi_core::domain::customer::CustomerId;

use super::{parse_decimal, parse_timestamp, InvoiceRepository, LedgerRepository, RepositoryError};
use crate::DbPool;

/// Read side of the money book. Rows are written only by the action
/// executor; the scanner and the CLI read them here.
pub struct SqlBillingRepository {
    pool: DbPool,
}

impl SqlBillingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LedgerRepository for SqlBillingRepository {
    async fn entries_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, customer_id, debit, credit, description, created_at
             FROM ledger_entries
             WHERE customer_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ledger_entry_from_row).collect()
    }
}

#[async_trait::async_trait]
impl InvoiceRepository for SqlBillingRepository {
    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_id, amount, status, created_at FROM invoices WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(invoice_from_row).transpose()
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Invoice>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, customer_id, amount, status, created_at
             FROM invoices
             WHERE customer_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(invoice_from_row).collect()
    }
}

fn ledger_entry_from_row(row: SqliteRow) -> Result<LedgerEntry, RepositoryError> {
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        customer_id: CustomerId(row.try_get("customer_id")?),
        debit: parse_decimal("debit", row.try_get("debit")?)?,
        credit: parse_decimal("credit", row.try_get("credit")?)?,
        description: row.try_get("description")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn invoice_from_row(row: SqliteRow) -> Result<Invoice, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = InvoiceStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown invoice status `{status_raw}`")))?;

    Ok(Invoice {
        id: InvoiceId(row.try_get("id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        amount: parse_decimal("amount", row.try_get("amount")?)?,
        status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
