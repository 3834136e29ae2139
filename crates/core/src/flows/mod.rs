pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, OrderFlow};
pub use states::{
    ConversationContext, CustomerSlot, FlowAction, OrderEvent, OrderSlots, OrderState, ProductSlot,
    QuantitySlot, RawInputs, SlotKind, TransitionOutcome, MIN_ORDER_CONFIDENCE,
};
