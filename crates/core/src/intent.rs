//! Deterministic intent routing. Keyword tables plus the current flow
//! state decide where a message goes; no scoring, no model. The one
//! ordering rule that matters: while a slot question is pending, free
//! text is the answer to that question, not a fresh query, no matter
//! which keywords it happens to contain.

use std::sync::OnceLock;

use regex::Regex;

use crate::flows::states::OrderState;

const CANCEL_KEYWORDS: &[&str] = &["cancel", "stop", "band", "nahi", "mat karo", "rehne do"];
const HELP_KEYWORDS: &[&str] = &["help", "kya kar", "batao", "kaise"];
const CONFIRM_KEYWORDS: &[&str] = &["confirm", "yes", "haan", "ha", "theek", "ok", "sahi"];
const STOCK_KEYWORDS: &[&str] = &["hai kya", "available", "stock", "milega", "check"];
const SYMPTOM_KEYWORDS: &[&str] =
    &["bukhar", "fever", "dard", "pain", "cold", "sardi", "headache", "sir"];
const PRICE_KEYWORDS: &[&str] = &["kitne ka", "price", "cost", "kya rate"];
const ORDER_KEYWORDS: &[&str] = &["chahiye", "order", "bill", "lena", "de do", "dedo"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Cancel,
    /// Free text while an order is underway: the current slot's answer
    /// or a correction to the pending confirmation.
    ContinueOrder,
    Confirm,
    Help,
    QueryStock,
    QuerySymptom,
    QueryPrice,
    Order,
    Unknown,
}

fn confirm_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        CONFIRM_KEYWORDS
            .iter()
            .map(|kw| {
                let pattern = format!(r"\b{}\b", regex::escape(kw));
                Regex::new(&pattern).expect("static pattern")
            })
            .collect()
    })
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

fn contains_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

/// Classify one message given the current flow state. First match wins.
pub fn classify(text: &str, state: OrderState) -> Intent {
    let text_lower = text.to_lowercase().trim().to_string();

    // Cancellation is honored from anywhere, even mid-question.
    if contains_any(&text_lower, CANCEL_KEYWORDS) {
        return Intent::Cancel;
    }

    // While a slot question is pending the reply IS the slot value.
    // Keyword lookup here would misroute names like "Sardi Lal".
    if state.awaiting_slot() {
        return Intent::ContinueOrder;
    }

    if state == OrderState::ReadyToConfirm {
        // Confirmation keywords match whole words only, so "chahiye"
        // never reads as "ha". Anything else is a correction.
        if confirm_patterns().iter().any(|p| p.is_match(&text_lower)) {
            return Intent::Confirm;
        }
        return Intent::ContinueOrder;
    }

    if contains_any(&text_lower, HELP_KEYWORDS) {
        return Intent::Help;
    }

    if contains_any(&text_lower, STOCK_KEYWORDS) || text_lower.ends_with('?') {
        return Intent::QueryStock;
    }

    if contains_any(&text_lower, SYMPTOM_KEYWORDS) {
        return Intent::QuerySymptom;
    }

    if contains_any(&text_lower, PRICE_KEYWORDS) {
        return Intent::QueryPrice;
    }

    if contains_any(&text_lower, ORDER_KEYWORDS) || contains_digit(&text_lower) {
        return Intent::Order;
    }

    Intent::Unknown
}

#[cfg(test)]
mod tests {
    use crate::flows::states::OrderState;

    use super::{classify, Intent};

    #[test]
    fn cancel_wins_from_any_state() {
        assert_eq!(classify("cancel karo", OrderState::Idle), Intent::Cancel);
        assert_eq!(classify("rehne do", OrderState::NeedQuantity), Intent::Cancel);
        assert_eq!(classify("nahi chahiye", OrderState::ReadyToConfirm), Intent::Cancel);
    }

    #[test]
    fn awaiting_slot_suppresses_keyword_routing() {
        // "Sardi Lal" is a customer name, not a cold-medicine query.
        assert_eq!(classify("Sardi Lal", OrderState::NeedCustomer), Intent::ContinueOrder);
        assert_eq!(classify("dolo 650", OrderState::NeedProduct), Intent::ContinueOrder);
        assert_eq!(classify("10", OrderState::NeedQuantity), Intent::ContinueOrder);
    }

    #[test]
    fn confirmation_requires_ready_state_and_whole_words() {
        assert_eq!(classify("haan", OrderState::ReadyToConfirm), Intent::Confirm);
        assert_eq!(classify("theek hai", OrderState::ReadyToConfirm), Intent::Confirm);
        assert_eq!(classify("haan", OrderState::Idle), Intent::Unknown);
        // "chahiye" contains "ha" but is not a confirmation.
        assert_eq!(
            classify("dusra wala chahiye", OrderState::ReadyToConfirm),
            Intent::ContinueOrder
        );
    }

    #[test]
    fn non_confirmation_at_ready_state_is_a_correction() {
        assert_eq!(classify("Priya", OrderState::ReadyToConfirm), Intent::ContinueOrder);
    }

    #[test]
    fn stock_queries_match_keywords_or_trailing_question_mark() {
        assert_eq!(classify("Paracetamol hai kya", OrderState::Idle), Intent::QueryStock);
        assert_eq!(classify("paracetamol?", OrderState::Idle), Intent::QueryStock);
        assert_eq!(classify("dolo available hai", OrderState::Idle), Intent::QueryStock);
    }

    #[test]
    fn symptom_queries_route_to_symptom_search() {
        assert_eq!(classify("bukhar ka medicine", OrderState::Idle), Intent::QuerySymptom);
    }

    #[test]
    fn price_queries_route_to_price_lookup() {
        assert_eq!(classify("dolo 650 kitne ka", OrderState::Idle), Intent::QueryPrice);
    }

    #[test]
    fn order_matches_vocabulary_or_bare_numerals() {
        assert_eq!(classify("dolo chahiye", OrderState::Idle), Intent::Order);
        assert_eq!(classify("10 dolo", OrderState::Idle), Intent::Order);
    }

    #[test]
    fn unmatched_text_is_unknown() {
        assert_eq!(classify("namaste ji", OrderState::Idle), Intent::Unknown);
    }
}
