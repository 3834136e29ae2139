use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use parchi_core::domain::billing::{Invoice, InvoiceId, LedgerEntry};
use parchi_core::domain::business::Business;
use parchi_core::domain::customer::{Customer, CustomerId};
use parchi_core::domain::draft::{DraftAction, DraftActionId, NewDraftAction};
use parchi_core::domain::inventory::{InventoryItem, ProductId};
use parchi_core::flows::ConversationContext;

pub mod billing;
pub mod business;
pub mod conversation;
pub mod customer;
pub mod draft_action;
pub mod inventory;

pub use billing::SqlBillingRepository;
pub use business::SqlBusinessRepository;
pub use conversation::SqlConversationRepository;
pub use customer::SqlCustomerRepository;
pub use draft_action::SqlDraftActionRepository;
pub use inventory::SqlInventoryRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait BusinessRepository: Send + Sync {
    /// Resolves the configured business, creating the row on first boot.
    async fn get_or_create(&self, name: &str, owner_name: &str)
        -> Result<Business, RepositoryError>;

    async fn find_default(&self) -> Result<Option<Business>, RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Customer>, RepositoryError>;
    async fn get_or_create(&self, name: &str) -> Result<Customer, RepositoryError>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<InventoryItem>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<InventoryItem>, RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn load(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationContext>, RepositoryError>;

    async fn save(&self, context: &ConversationContext) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait DraftActionRepository: Send + Sync {
    /// Persists a new draft with status DRAFT and returns the stored row.
    async fn insert(&self, draft: NewDraftAction) -> Result<DraftAction, RepositoryError>;

    async fn find_by_id(&self, id: &DraftActionId)
        -> Result<Option<DraftAction>, RepositoryError>;

    /// Newest first, every status.
    async fn list_recent(&self, limit: i64) -> Result<Vec<DraftAction>, RepositoryError>;

    /// Newest first, DRAFT and APPROVED only.
    async fn list_pending(&self, limit: i64) -> Result<Vec<DraftAction>, RepositoryError>;

    /// True when the customer already has a DRAFT or APPROVED payment
    /// reminder. Terminal reminders do not block a fresh one.
    async fn has_open_reminder(&self, customer_id: &CustomerId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn entries_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError>;

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Invoice>, RepositoryError>;
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

/// Money columns are stored as decimal text; floats never touch them.
pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}
