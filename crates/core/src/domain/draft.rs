use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::business::BusinessId;
use crate::domain::customer::CustomerId;
use crate::domain::inventory::ProductId;
use crate::errors::DomainError;

/// Upper bound on a single invoice line. Anything larger is a typo or
/// a runaway extraction, not a real counter order.
pub const MAX_ORDER_QUANTITY: i64 = 100_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftActionId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftStatus {
    Draft,
    Approved,
    Executed,
    Rejected,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Approved => "APPROVED",
            Self::Executed => "EXECUTED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "DRAFT" => Some(Self::Draft),
            "APPROVED" => Some(Self::Approved),
            "EXECUTED" => Some(Self::Executed),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Executed and rejected drafts never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Rejected)
    }
}

/// What an approved draft would actually do. Tagged so a payload can
/// never be read as the wrong kind with fields silently missing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DraftPayload {
    CreateInvoice {
        customer_name: String,
        /// Canonical inventory name, never raw user text.
        product: String,
        product_id: ProductId,
        quantity: i64,
        unit_price: Decimal,
        amount: Decimal,
        requires_prescription: bool,
        seller: String,
        buyer: String,
    },
    SendPaymentReminder {
        customer_id: CustomerId,
        customer_name: String,
        amount_due: Decimal,
        days_overdue: i64,
        phone: Option<String>,
    },
}

impl DraftPayload {
    pub fn intent(&self) -> &'static str {
        match self {
            Self::CreateInvoice { .. } => "create_invoice",
            Self::SendPaymentReminder { .. } => "send_payment_reminder",
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::CreateInvoice {
                customer_name,
                product_id,
                quantity,
                unit_price,
                amount,
                seller,
                buyer,
                ..
            } => {
                if customer_name.trim().is_empty() {
                    return Err(DomainError::InvariantViolation(
                        "invoice draft requires a customer name".to_owned(),
                    ));
                }
                if product_id.0 <= 0 {
                    return Err(DomainError::InvariantViolation(
                        "invoice draft requires a positive product id".to_owned(),
                    ));
                }
                if *quantity <= 0 || *quantity > MAX_ORDER_QUANTITY {
                    return Err(DomainError::InvariantViolation(format!(
                        "invoice quantity {quantity} outside 1..={MAX_ORDER_QUANTITY}"
                    )));
                }
                if *amount != *unit_price * Decimal::from(*quantity) {
                    return Err(DomainError::InvariantViolation(format!(
                        "invoice amount {amount} != {unit_price} x {quantity}"
                    )));
                }
                if buyer != customer_name {
                    return Err(DomainError::InvariantViolation(
                        "invoice buyer must be the resolved customer".to_owned(),
                    ));
                }
                if seller.trim().is_empty() {
                    return Err(DomainError::InvariantViolation(
                        "invoice draft requires a seller identity".to_owned(),
                    ));
                }
                Ok(())
            }
            Self::SendPaymentReminder { customer_id, amount_due, .. } => {
                if customer_id.0 <= 0 {
                    return Err(DomainError::InvariantViolation(
                        "reminder draft requires a positive customer id".to_owned(),
                    ));
                }
                if *amount_due <= Decimal::ZERO {
                    return Err(DomainError::InvariantViolation(
                        "reminder draft requires a positive amount due".to_owned(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// A proposed action awaiting the owner's decision. Created only with
/// status `Draft`; every later status change goes through
/// [`DraftAction::transition_to`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftAction {
    pub id: DraftActionId,
    pub business_id: BusinessId,
    pub payload: DraftPayload,
    pub status: DraftStatus,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a draft that does not have an id yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDraftAction {
    pub business_id: BusinessId,
    pub payload: DraftPayload,
    pub explanation: String,
}

impl DraftAction {
    pub fn can_transition_to(&self, next: DraftStatus) -> bool {
        matches!(
            (&self.status, next),
            (DraftStatus::Draft, DraftStatus::Approved)
                | (DraftStatus::Draft, DraftStatus::Rejected)
                | (DraftStatus::Approved, DraftStatus::Executed)
        )
    }

    pub fn transition_to(&mut self, next: DraftStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidDraftTransition { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::business::BusinessId;
    use crate::domain::customer::CustomerId;
    use crate::domain::inventory::ProductId;
    use crate::errors::DomainError;

    use super::{DraftAction, DraftActionId, DraftPayload, DraftStatus};

    fn invoice_payload() -> DraftPayload {
        DraftPayload::CreateInvoice {
            customer_name: "Rahul".to_string(),
            product: "Dolo 650".to_string(),
            product_id: ProductId(3),
            quantity: 10,
            unit_price: Decimal::new(2500, 2),
            amount: Decimal::new(25000, 2),
            requires_prescription: false,
            seller: "Bharat Pharmacy".to_string(),
            buyer: "Rahul".to_string(),
        }
    }

    fn draft(status: DraftStatus) -> DraftAction {
        DraftAction {
            id: DraftActionId(1),
            business_id: BusinessId(1),
            payload: invoice_payload(),
            status,
            explanation: "Invoice for Rahul: 10 x Dolo 650 = \u{20b9}250.00".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn draft_can_be_approved_then_executed() {
        let mut action = draft(DraftStatus::Draft);
        action.transition_to(DraftStatus::Approved).expect("draft->approved");
        action.transition_to(DraftStatus::Executed).expect("approved->executed");
        assert_eq!(action.status, DraftStatus::Executed);
    }

    #[test]
    fn rejection_is_terminal() {
        let mut action = draft(DraftStatus::Draft);
        action.transition_to(DraftStatus::Rejected).expect("draft->rejected");
        let error = action
            .transition_to(DraftStatus::Approved)
            .expect_err("rejected drafts may not be approved");
        assert!(matches!(error, DomainError::InvalidDraftTransition { .. }));
    }

    #[test]
    fn executed_draft_cannot_be_rejected() {
        let mut action = draft(DraftStatus::Executed);
        let error = action
            .transition_to(DraftStatus::Rejected)
            .expect_err("executed drafts are final");
        assert!(matches!(error, DomainError::InvalidDraftTransition { .. }));
    }

    #[test]
    fn payload_kind_round_trips_through_tagged_json() {
        let payload = invoice_payload();
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["kind"], "create_invoice");
        assert_eq!(json["product_id"], 3);

        let back: DraftPayload = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, payload);
    }

    #[test]
    fn invoice_amount_mismatch_fails_validation() {
        let payload = DraftPayload::CreateInvoice {
            customer_name: "Rahul".to_string(),
            product: "Dolo 650".to_string(),
            product_id: ProductId(3),
            quantity: 10,
            unit_price: Decimal::new(2500, 2),
            amount: Decimal::new(999, 2),
            requires_prescription: false,
            seller: "Bharat Pharmacy".to_string(),
            buyer: "Rahul".to_string(),
        };
        assert!(matches!(payload.validate(), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn reminder_payload_requires_positive_amount() {
        let payload = DraftPayload::SendPaymentReminder {
            customer_id: CustomerId(4),
            customer_name: "Asha".to_string(),
            amount_due: Decimal::ZERO,
            days_overdue: 42,
            phone: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn status_strings_match_storage_format() {
        assert_eq!(DraftStatus::Draft.as_str(), "DRAFT");
        assert_eq!(DraftStatus::parse("EXECUTED"), Some(DraftStatus::Executed));
        assert_eq!(DraftStatus::parse("draft"), None);
    }
}
