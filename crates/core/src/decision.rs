//! Final gate between a confirmed conversation and a persisted draft.
//!
//! The flow engine guarantees the slots were filled once; this module
//! re-checks them against a freshly fetched inventory row so the draft
//! always carries the live price, the canonical product name and a
//! seller/buyer pair that can never collapse into one party. Nothing
//! here writes anywhere; the caller persists the returned action.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::business::Business;
use crate::domain::draft::{DraftPayload, NewDraftAction, MAX_ORDER_QUANTITY};
use crate::domain::inventory::{InventoryItem, ProductId};
use crate::flows::states::{OrderSlots, SlotKind, MIN_ORDER_CONFIDENCE};

/// Why a confirmed order still did not become a draft.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DraftRejection {
    #[error("order is missing the {} slot", slot.as_str())]
    MissingSlot { slot: SlotKind },
    #[error("{} confidence {confidence:.2} is below {MIN_ORDER_CONFIDENCE}", slot.as_str())]
    LowConfidence { slot: SlotKind, confidence: f64 },
    #[error("quantity {value} outside 1..={MAX_ORDER_QUANTITY}")]
    QuantityOutOfRange { value: i64 },
    #[error("inventory row {} no longer matches confirmed product {}", found.0, confirmed.0)]
    StaleProduct { confirmed: ProductId, found: ProductId },
}

/// Build a `create_invoice` draft from confirmed slots and the live
/// inventory row for the confirmed product id.
///
/// The price and prescription flag are taken from `item`, never from
/// anything cached at extraction time, so a price change between
/// confirmation and drafting is reflected rather than papered over.
pub fn build_invoice_draft(
    business: &Business,
    item: &InventoryItem,
    slots: &OrderSlots,
) -> Result<NewDraftAction, DraftRejection> {
    let product = slots
        .product
        .as_ref()
        .ok_or(DraftRejection::MissingSlot { slot: SlotKind::Product })?;
    if product.confidence < MIN_ORDER_CONFIDENCE {
        return Err(DraftRejection::LowConfidence {
            slot: SlotKind::Product,
            confidence: product.confidence,
        });
    }
    if item.id != product.product_id {
        return Err(DraftRejection::StaleProduct {
            confirmed: product.product_id,
            found: item.id,
        });
    }

    let quantity = slots
        .quantity
        .as_ref()
        .ok_or(DraftRejection::MissingSlot { slot: SlotKind::Quantity })?;
    if quantity.confidence < MIN_ORDER_CONFIDENCE {
        return Err(DraftRejection::LowConfidence {
            slot: SlotKind::Quantity,
            confidence: quantity.confidence,
        });
    }
    if quantity.value <= 0 || quantity.value > MAX_ORDER_QUANTITY {
        return Err(DraftRejection::QuantityOutOfRange { value: quantity.value });
    }

    let customer = slots
        .customer
        .as_ref()
        .filter(|c| !c.name.trim().is_empty())
        .ok_or(DraftRejection::MissingSlot { slot: SlotKind::Customer })?;

    let amount = item.unit_price * Decimal::from(quantity.value);
    let mut explanation = format!(
        "Invoice for {}: {} x {} = \u{20b9}{}",
        customer.name,
        quantity.value,
        item.name,
        amount.round_dp(2)
    );
    if item.requires_prescription {
        explanation.push_str(" [PRESCRIPTION REQUIRED]");
    }

    let payload = DraftPayload::CreateInvoice {
        customer_name: customer.name.clone(),
        product: item.name.clone(),
        product_id: item.id,
        quantity: quantity.value,
        unit_price: item.unit_price,
        amount,
        requires_prescription: item.requires_prescription,
        seller: business.name.clone(),
        buyer: customer.name.clone(),
    };

    Ok(NewDraftAction { business_id: business.id, payload, explanation })
}
