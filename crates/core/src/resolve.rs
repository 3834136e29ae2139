//! Canonical product resolution. Raw user phrasing goes in, the exact
//! inventory record comes out, or nothing at all: a near-tie between two
//! catalog names is rejected rather than guessed, because a wrong guess
//! here becomes a wrong line on an invoice.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::inventory::{InventoryItem, ProductId};

/// Looser floor for read-only stock and price queries.
pub const MIN_QUERY_CONFIDENCE: f64 = 0.6;
/// Floor for "did you mean" suggestion lists.
pub const SUGGESTION_CONFIDENCE: f64 = 0.5;
/// Two candidates closer than this are an ambiguous match.
pub const AMBIGUITY_GAP: f64 = 0.1;

const MAX_SUGGESTIONS: usize = 5;

/// Filler and unit words dropped during normalization.
const NOISE_WORDS: &[&str] = &[
    "hai",
    "kya",
    "ka",
    "ki",
    "ke",
    "chahiye",
    "dena",
    "dedo",
    "do",
    "lo",
    "give",
    "please",
    "bhai",
    "sir",
    "ma'am",
    "order",
    "pack",
    "tablet",
    "tablets",
    "strip",
    "strips",
    "bottle",
    "bottles",
    "?",
    "!",
];

/// A resolved canonical record. `product_id` is guaranteed to reference
/// a live inventory row with a positive id; there is no partial variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub product_id: ProductId,
    pub canonical_name: String,
    pub unit_price: Decimal,
    pub stock_quantity: i64,
    pub requires_prescription: bool,
    pub used_for: Option<String>,
    pub confidence: f64,
}

impl ProductMatch {
    fn from_item(item: &InventoryItem, confidence: f64) -> Self {
        Self {
            product_id: item.id,
            canonical_name: item.name.clone(),
            unit_price: item.unit_price,
            stock_quantity: item.stock_quantity,
            requires_prescription: item.requires_prescription,
            used_for: item.used_for.clone(),
            confidence,
        }
    }
}

fn punctuation_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("static pattern"))
}

/// Lowercase, strip punctuation, drop filler words.
///
/// "Dolo 650 hai kya?" -> "dolo 650", "dolo-650" -> "dolo 650".
pub fn normalize_product_input(text: &str) -> String {
    let lowered = text.to_lowercase();
    let depunctuated = punctuation_pattern().replace_all(lowered.trim(), " ");
    depunctuated
        .split_whitespace()
        .filter(|word| !NOISE_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity between raw user input and one catalog name.
///
/// Exact normalized match scores 1.0, containment either direction just
/// below it, otherwise token overlap scaled into the remaining range.
pub fn match_confidence(user_input: &str, product_name: &str) -> f64 {
    let user_norm = normalize_product_input(user_input);
    let product_norm = normalize_product_input(product_name);

    if user_norm.is_empty() || product_norm.is_empty() {
        return 0.0;
    }

    if user_norm == product_norm {
        return 1.0;
    }

    if product_norm.contains(&user_norm) {
        return 0.95;
    }
    if user_norm.contains(&product_norm) {
        return 0.92;
    }

    let user_words: Vec<&str> = user_norm.split_whitespace().collect();
    let product_words: Vec<&str> = product_norm.split_whitespace().collect();

    let intersection =
        user_words.iter().filter(|word| product_words.contains(word)).count() as f64;
    let union = {
        let mut all: Vec<&str> = user_words.clone();
        for word in &product_words {
            if !all.contains(word) {
                all.push(word);
            }
        }
        all.len() as f64
    };

    let jaccard = if union > 0.0 { intersection / union } else { 0.0 };

    if intersection > 0.0 {
        return (0.7 + jaccard * 0.2).min(0.95);
    }

    jaccard * 0.6
}

/// Resolve raw user text against an inventory snapshot.
///
/// Returns `None` when nothing clears `min_confidence`, when the top two
/// candidates are within [`AMBIGUITY_GAP`] of each other, or when the
/// winning record carries a non-positive id.
pub fn resolve(
    user_input: &str,
    items: &[InventoryItem],
    min_confidence: f64,
) -> Option<ProductMatch> {
    if user_input.trim().is_empty() {
        return None;
    }
    if normalize_product_input(user_input).is_empty() {
        return None;
    }

    let mut best: Option<&InventoryItem> = None;
    let mut best_confidence = 0.0_f64;
    let mut second: Option<&InventoryItem> = None;
    let mut second_confidence = 0.0_f64;

    for item in items {
        let confidence = match_confidence(user_input, &item.name);
        if confidence > best_confidence {
            second = best;
            second_confidence = best_confidence;
            best = Some(item);
            best_confidence = confidence;
        } else if confidence > second_confidence {
            second = Some(item);
            second_confidence = confidence;
        }
    }

    let best = best?;
    if best_confidence < min_confidence {
        return None;
    }

    if second.is_some() && (best_confidence - second_confidence) < AMBIGUITY_GAP {
        return None;
    }

    if best.id.0 <= 0 {
        return None;
    }

    Some(ProductMatch::from_item(best, best_confidence))
}

/// Rank every candidate above `min_confidence` for disambiguation
/// prompts. No ambiguity rejection here; the caller is presenting
/// options, not billing.
pub fn resolve_multiple(
    user_input: &str,
    items: &[InventoryItem],
    min_confidence: f64,
) -> Vec<ProductMatch> {
    if user_input.trim().is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<ProductMatch> = items
        .iter()
        .filter_map(|item| {
            let confidence = match_confidence(user_input, &item.name);
            (confidence >= min_confidence).then(|| ProductMatch::from_item(item, confidence))
        })
        .collect();

    matches.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));
    matches.truncate(MAX_SUGGESTIONS);
    matches
}
