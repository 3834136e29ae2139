use parchi_core::domain::draft::MAX_ORDER_QUANTITY;
use serde::Deserialize;
use thiserror::Error;

pub const MIN_ENTITY_CHARS: usize = 2;
pub const MAX_ENTITY_CHARS: usize = 100;

/// Closed intent vocabulary the model is allowed to answer with.
/// Anything outside this list fails deserialization and the reply is
/// discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmIntent {
    CheckStock,
    CreateInvoice,
    GetInvoice,
    ApproveInvoice,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmConfidence {
    Low,
    Medium,
    High,
}

/// The only shape a model reply may take. `deny_unknown_fields` means an
/// out-of-vocabulary key discards the whole reply rather than being
/// silently dropped.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmReply {
    pub intent: LlmIntent,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub customer: Option<String>,
    pub confidence: LlmConfidence,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("reply was not valid schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} length {len} outside {MIN_ENTITY_CHARS}..={MAX_ENTITY_CHARS} chars")]
    EntityLength { field: &'static str, len: usize },
    #[error("quantity {0} outside 1..={MAX_ORDER_QUANTITY}")]
    QuantityRange(i64),
}

/// Parses and validates a raw model completion into a schema-checked
/// reply. Any violation discards the whole reply; there are no partial
/// salvages at this boundary.
pub fn parse_reply(raw: &str) -> Result<LlmReply, SchemaError> {
    let trimmed = strip_code_fences(raw);
    let reply: LlmReply = serde_json::from_str(trimmed)?;

    validate_entity("product", reply.product.as_deref())?;
    validate_entity("customer", reply.customer.as_deref())?;
    if let Some(quantity) = reply.quantity {
        if !(1..=MAX_ORDER_QUANTITY).contains(&quantity) {
            return Err(SchemaError::QuantityRange(quantity));
        }
    }

    Ok(reply)
}

fn validate_entity(field: &'static str, value: Option<&str>) -> Result<(), SchemaError> {
    if let Some(value) = value {
        let len = value.trim().chars().count();
        if !(MIN_ENTITY_CHARS..=MAX_ENTITY_CHARS).contains(&len) {
            return Err(SchemaError::EntityLength { field, len });
        }
    }
    Ok(())
}

// Models often wrap JSON in markdown fences despite instructions.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
