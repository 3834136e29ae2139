//! Language-model fallback adapter - classification of last resort
//!
//! This crate is the only place the system talks to a language model. It is
//! invoked when the deterministic keyword router gives up on a message, and
//! it does exactly one thing: ask the model to classify the text against a
//! fixed intent vocabulary, then validate the answer hard before anyone
//! else sees it.
//!
//! # Architecture
//!
//! 1. **Completion** (`llm`) - `LlmClient` trait plus an HTTP client for
//!    OpenAI-compatible chat-completions endpoints.
//! 2. **Schema validation** (`schema`) - strict JSON parse of the reply;
//!    any out-of-vocabulary field or out-of-range value discards the whole
//!    reply.
//! 3. **Guardrails** (`guardrails`) - policy check on the validated reply;
//!    maps accepted replies into the deterministic intent vocabulary.
//! 4. **Adapter** (`fallback`) - `FallbackAdapter::try_classify`, the one
//!    narrow surface the rest of the system calls.
//!
//! # Safety Principle
//!
//! The model is strictly a classifier. It NEVER creates drafts, never
//! approves anything, never touches inventory, and never writes a message
//! to the customer. When anything goes wrong - timeout, malformed JSON,
//! guardrail denial - the adapter returns `None` and the deterministic
//! path carries on as if the model did not exist.

pub mod fallback;
pub mod guardrails;
pub mod llm;
pub mod schema;

pub use fallback::FallbackAdapter;
pub use guardrails::{Classification, FallbackPolicy, GuardrailDecision};
pub use llm::{HttpLlmClient, LlmClient, LlmConfig};
pub use schema::{LlmConfidence, LlmIntent, LlmReply, SchemaError};
