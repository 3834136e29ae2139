pub mod config;
pub mod decision;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod flows;
pub mod intent;
pub mod resolve;
pub mod symptoms;

pub use decision::{build_invoice_draft, DraftRejection};
pub use domain::business::{Business, BusinessId};
pub use domain::customer::{Customer, CustomerId};
pub use domain::draft::{DraftAction, DraftActionId, DraftPayload, DraftStatus, NewDraftAction};
pub use domain::inventory::{InventoryItem, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use extract::{EntitySource, ExtractedEntities, ExtractedValue};
pub use flows::{
    ConversationContext, FlowAction, FlowDefinition, FlowEngine, FlowTransitionError, OrderEvent,
    OrderSlots, OrderState, TransitionOutcome,
};
pub use intent::Intent;
pub use resolve::ProductMatch;
