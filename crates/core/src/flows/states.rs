use serde::{Deserialize, Serialize};

use crate::domain::inventory::ProductId;

/// Confidence floor a resolved product or quantity must clear before its
/// slot counts as filled for order purposes.
pub const MIN_ORDER_CONFIDENCE: f64 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Idle,
    NeedProduct,
    NeedQuantity,
    NeedCustomer,
    ReadyToConfirm,
    Confirmed,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::NeedProduct => "need_product",
            Self::NeedQuantity => "need_quantity",
            Self::NeedCustomer => "need_customer",
            Self::ReadyToConfirm => "ready_to_confirm",
            Self::Confirmed => "confirmed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "idle" => Some(Self::Idle),
            "need_product" => Some(Self::NeedProduct),
            "need_quantity" => Some(Self::NeedQuantity),
            "need_customer" => Some(Self::NeedCustomer),
            "ready_to_confirm" => Some(Self::ReadyToConfirm),
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }

    /// States that wait for one specific slot. While in one of these the
    /// classifier must not reinterpret free text as a query.
    pub fn awaiting_slot(&self) -> bool {
        matches!(self, Self::NeedProduct | Self::NeedQuantity | Self::NeedCustomer)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    SlotsUpdated,
    ConfirmReceived,
    CancelRequested,
    ResolutionFailed,
    ProductVanished,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    AskProduct,
    AskQuantity,
    AskCustomer,
    ShowConfirmation,
    CreateDraft,
    ClearContext,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Product,
    Quantity,
    Customer,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Quantity => "quantity",
            Self::Customer => "customer",
        }
    }
}

/// Product slot holds the resolved canonical reference, never the phrase
/// the user typed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSlot {
    pub product_id: ProductId,
    pub canonical_name: String,
    pub confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantitySlot {
    pub value: i64,
    pub confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerSlot {
    pub name: String,
    pub confidence: f64,
}

/// What the user literally typed for each slot, kept for audit and for
/// context fallback on later turns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInputs {
    pub product: Option<String>,
    pub quantity: Option<String>,
    pub customer: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderSlots {
    pub product: Option<ProductSlot>,
    pub quantity: Option<QuantitySlot>,
    pub customer: Option<CustomerSlot>,
    pub raw_inputs: RawInputs,
}

impl OrderSlots {
    /// First unfilled slot in ask order, or `None` when the order is
    /// complete. Product and quantity must clear the confidence floor;
    /// the customer only has to be present, but present it must be.
    pub fn next_missing(&self) -> Option<SlotKind> {
        match &self.product {
            Some(slot) if slot.confidence >= MIN_ORDER_CONFIDENCE => {}
            _ => return Some(SlotKind::Product),
        }
        match &self.quantity {
            Some(slot) if slot.confidence >= MIN_ORDER_CONFIDENCE => {}
            _ => return Some(SlotKind::Quantity),
        }
        match &self.customer {
            Some(slot) if !slot.name.trim().is_empty() => {}
            _ => return Some(SlotKind::Customer),
        }
        None
    }

    pub fn is_complete(&self) -> bool {
        self.next_missing().is_none()
    }
}

/// Durable per-conversation record. Exactly one lives per conversation
/// id; it is reloaded on every turn so a restart never drops a
/// half-collected order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub state: OrderState,
    pub slots: OrderSlots,
}

impl ConversationContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            state: OrderState::Idle,
            slots: OrderSlots::default(),
        }
    }

    pub fn reset(&mut self) {
        self.state = OrderState::Idle;
        self.slots = OrderSlots::default();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: OrderState,
    pub to: OrderState,
    pub event: OrderEvent,
    pub actions: Vec<FlowAction>,
}
