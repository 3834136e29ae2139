use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    pub amount: Decimal,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

/// One row in the customer ledger. Sales post as debits, payments as
/// credits; the running balance is derived, never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub customer_id: CustomerId,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Net amount the customer still owes: total debits minus total credits.
pub fn outstanding_balance(entries: &[LedgerEntry]) -> Decimal {
    let debits: Decimal = entries.iter().map(|e| e.debit).sum();
    let credits: Decimal = entries.iter().map(|e| e.credit).sum();
    debits - credits
}

/// Timestamp of the oldest sale on the ledger, if any.
pub fn oldest_debit_at(entries: &[LedgerEntry]) -> Option<DateTime<Utc>> {
    entries.iter().filter(|e| e.debit > Decimal::ZERO).map(|e| e.created_at).min()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverdueBalance {
    pub amount_due: Decimal,
    pub days_overdue: i64,
}

/// Flags a customer whose positive balance has gone unpaid for longer
/// than `overdue_days`. Returns `None` when nothing is owed or the debt
/// is still fresh.
pub fn overdue_balance(
    entries: &[LedgerEntry],
    now: DateTime<Utc>,
    overdue_days: i64,
) -> Option<OverdueBalance> {
    let balance = outstanding_balance(entries);
    if balance <= Decimal::ZERO {
        return None;
    }

    let oldest = oldest_debit_at(entries)?;
    let age_days = (now - oldest).num_days();
    if age_days < overdue_days {
        return None;
    }

    Some(OverdueBalance { amount_due: balance, days_overdue: age_days })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::customer::CustomerId;

    use super::{overdue_balance, LedgerEntry, OverdueBalance};

    fn entry(debit: i64, credit: i64, age_days: i64) -> LedgerEntry {
        LedgerEntry {
            id: 1,
            customer_id: CustomerId(7),
            debit: Decimal::new(debit, 0),
            credit: Decimal::new(credit, 0),
            description: None,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn settled_ledger_is_not_overdue() {
        let entries = vec![entry(500, 0, 60), entry(0, 500, 10)];
        assert_eq!(overdue_balance(&entries, Utc::now(), 30), None);
    }

    #[test]
    fn fresh_debt_is_not_overdue() {
        let entries = vec![entry(500, 0, 5)];
        assert_eq!(overdue_balance(&entries, Utc::now(), 30), None);
    }

    #[test]
    fn old_unpaid_debt_is_flagged_with_net_amount() {
        let entries = vec![entry(500, 0, 45), entry(0, 200, 20)];
        let overdue = overdue_balance(&entries, Utc::now(), 30).expect("should be overdue");
        assert_eq!(
            overdue,
            OverdueBalance { amount_due: Decimal::new(300, 0), days_overdue: 45 }
        );
    }

    #[test]
    fn age_counts_from_oldest_debit_not_newest() {
        let entries = vec![entry(100, 0, 90), entry(100, 0, 2)];
        let overdue = overdue_balance(&entries, Utc::now(), 30).expect("should be overdue");
        assert_eq!(overdue.days_overdue, 90);
    }
}
