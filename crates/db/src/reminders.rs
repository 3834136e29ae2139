use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use parchi_core::domain::billing::overdue_balance;
use parchi_core::domain::business::BusinessId;
use parchi_core::domain::draft::{DraftPayload, NewDraftAction};

use crate::repositories::{
    CustomerRepository, DraftActionRepository, LedgerRepository, RepositoryError,
    SqlBillingRepository, SqlCustomerRepository, SqlDraftActionRepository,
};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Walks the ledger looking for customers whose balance has gone unpaid
/// past the overdue window and drafts one payment reminder per customer.
/// Reminders are drafts like everything else: nothing reaches the
/// customer until the owner approves.
pub struct ReminderScanner {
    customers: SqlCustomerRepository,
    ledger: SqlBillingRepository,
    drafts: SqlDraftActionRepository,
    business_id: BusinessId,
    overdue_days: i64,
}

impl ReminderScanner {
    pub fn new(pool: DbPool, business_id: BusinessId, overdue_days: i64) -> Self {
        Self {
            customers: SqlCustomerRepository::new(pool.clone()),
            ledger: SqlBillingRepository::new(pool.clone()),
            drafts: SqlDraftActionRepository::new(pool),
            business_id,
            overdue_days,
        }
    }

    /// Returns how many reminder drafts this pass created.
    pub async fn scan_once(&self) -> Result<u32, ScanError> {
        self.scan_at(Utc::now()).await
    }

    pub async fn scan_at(&self, now: DateTime<Utc>) -> Result<u32, ScanError> {
        let mut created = 0u32;

        for customer in self.customers.list_all().await? {
            let entries = self.ledger.entries_for_customer(&customer.id).await?;
            let Some(overdue) = overdue_balance(&entries, now, self.overdue_days) else {
                continue;
            };

            // One open reminder per customer; a fresh one waits until
            // the previous draft is approved or rejected.
            if self.drafts.has_open_reminder(&customer.id).await? {
                continue;
            }

            let explanation = format!(
                "Reminder for {}: \u{20b9}{} outstanding for {} days",
                customer.name,
                overdue.amount_due.round_dp(2),
                overdue.days_overdue
            );
            let draft = self
                .drafts
                .insert(NewDraftAction {
                    business_id: self.business_id,
                    payload: DraftPayload::SendPaymentReminder {
                        customer_id: customer.id,
                        customer_name: customer.name.clone(),
                        amount_due: overdue.amount_due,
                        days_overdue: overdue.days_overdue,
                        phone: customer.phone.clone(),
                    },
                    explanation,
                })
                .await?;

            info!(
                event_name = "reminder_drafted",
                action_id = draft.id.0,
                customer_id = customer.id.0,
                days_overdue = overdue.days_overdue,
                "payment reminder drafted"
            );
            created += 1;
        }

        Ok(created)
    }
}
