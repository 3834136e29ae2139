use thiserror::Error;

use crate::flows::states::{FlowAction, OrderEvent, OrderSlots, OrderState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> OrderState;
    fn transition(
        &self,
        current: &OrderState,
        event: &OrderEvent,
        slots: &OrderSlots,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// The one flow this engine runs: collect product, quantity and customer,
/// confirm, then hand off to the decision engine.
#[derive(Clone, Debug, Default)]
pub struct OrderFlow;

impl FlowDefinition for OrderFlow {
    fn initial_state(&self) -> OrderState {
        OrderState::Idle
    }

    fn transition(
        &self,
        current: &OrderState,
        event: &OrderEvent,
        slots: &OrderSlots,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_order(current, event, slots)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> OrderState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &OrderState,
        event: &OrderEvent,
        slots: &OrderSlots,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, slots)
    }
}

impl Default for FlowEngine<OrderFlow> {
    fn default() -> Self {
        Self::new(OrderFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum FlowTransitionError {
    #[error("cannot confirm from {state:?} with unfilled slots: {missing:?}")]
    MissingSlots { state: OrderState, missing: Vec<String> },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: OrderState, event: OrderEvent },
}

impl Eq for FlowTransitionError {}

fn transition_order(
    current: &OrderState,
    event: &OrderEvent,
    slots: &OrderSlots,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        AskCustomer, AskProduct, AskQuantity, ClearContext, CreateDraft, ShowConfirmation,
    };
    use OrderEvent::{
        CancelRequested, ConfirmReceived, ProductVanished, ResolutionFailed, SlotsUpdated,
    };
    use OrderState::{Confirmed, Idle, NeedCustomer, NeedProduct, NeedQuantity, ReadyToConfirm};

    let (to, actions) = match (current, event) {
        (_, CancelRequested) => (Idle, vec![ClearContext]),
        (_, ResolutionFailed) => (Idle, vec![ClearContext]),
        (Confirmed, SlotsUpdated) => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
        (_, SlotsUpdated) => match slots.next_missing() {
            Some(super::states::SlotKind::Product) => (NeedProduct, vec![AskProduct]),
            Some(super::states::SlotKind::Quantity) => (NeedQuantity, vec![AskQuantity]),
            Some(super::states::SlotKind::Customer) => (NeedCustomer, vec![AskCustomer]),
            None => (ReadyToConfirm, vec![ShowConfirmation]),
        },
        (ReadyToConfirm, ConfirmReceived) => {
            if let Some(missing) = slots.next_missing() {
                return Err(FlowTransitionError::MissingSlots {
                    state: *current,
                    missing: vec![missing.as_str().to_owned()],
                });
            }
            (Confirmed, vec![CreateDraft, ClearContext])
        }
        (ReadyToConfirm, ProductVanished) | (Confirmed, ProductVanished) => {
            (Idle, vec![ClearContext])
        }
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}
