use parchi_core::Intent;

use crate::schema::{LlmConfidence, LlmIntent, LlmReply};

/// A model reply the guardrails were willing to let through. The intent
/// re-enters the same deterministic vocabulary the keyword router uses;
/// the optional fields are hints for the extractor, never trusted
/// records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub product: Option<String>,
    pub quantity: Option<i64>,
    pub customer: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow(Classification),
    Degrade { reason_code: &'static str },
    Deny { reason_code: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub llm_can_approve_drafts: bool,
    pub act_on_low_confidence: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self { llm_can_approve_drafts: false, act_on_low_confidence: false }
    }
}

impl FallbackPolicy {
    pub fn evaluate(&self, reply: &LlmReply) -> GuardrailDecision {
        match reply.intent {
            // Approval never flows through the model, whatever the
            // policy flags say. A permissive flag is itself a policy
            // conflict worth its own reason code.
            LlmIntent::ApproveInvoice => GuardrailDecision::Deny {
                reason_code: if self.llm_can_approve_drafts {
                    "approval_policy_conflict"
                } else {
                    "approval_from_chat_disallowed"
                },
            },
            LlmIntent::Unknown => GuardrailDecision::Degrade { reason_code: "model_unsure" },
            LlmIntent::GetInvoice => {
                GuardrailDecision::Degrade { reason_code: "no_invoice_surface" }
            }
            _ if reply.confidence == LlmConfidence::Low && !self.act_on_low_confidence => {
                GuardrailDecision::Degrade { reason_code: "low_confidence" }
            }
            LlmIntent::CheckStock => GuardrailDecision::Allow(Classification {
                intent: Intent::QueryStock,
                product: reply.product.clone(),
                quantity: None,
                customer: None,
            }),
            LlmIntent::CreateInvoice => GuardrailDecision::Allow(Classification {
                intent: Intent::Order,
                product: reply.product.clone(),
                quantity: reply.quantity,
                customer: reply.customer.clone(),
            }),
        }
    }
}
