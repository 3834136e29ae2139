//! Chat interface - conversational order taking over a messaging channel
//!
//! This crate turns one incoming message into one reply:
//! - **Engine** (`engine`) - per-turn dispatch: classify, extract, resolve,
//!   advance the order flow, persist the context, answer
//! - **Commands** (`commands`) - `/start` and `/help`
//! - **Replies** (`replies`) - the Hinglish texts the customer sees
//!
//! # Architecture
//!
//! ```text
//! message -> classify -> extract -> resolve -> flow transition -> reply
//!                |                                   |
//!           LLM fallback                     conversation_contexts
//!          (unknowns only)                      (one row per chat)
//! ```
//!
//! The engine itself never bills anyone. A confirmed order becomes a
//! DRAFT action; money moves only after the owner approves it elsewhere.

pub mod commands;
pub mod engine;
pub mod replies;

pub use commands::ChatCommand;
pub use engine::{ChatEngine, ChatError};
