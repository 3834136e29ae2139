//! Confidence-scored entity extraction from free-form, code-mixed text.
//!
//! Each extractor walks a ladder of sources from strongest to weakest and
//! reports where the value came from, so callers can decide whether a slot
//! is filled or still worth asking about. Everything here is pure; raw
//! product phrases must still go through [`crate::resolve`] before they
//! may appear in any record.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::draft::MAX_ORDER_QUANTITY;

/// Number vocabulary for English and Hinglish, checked in declaration
/// order so multi-word phrases like "half dozen" win over "dozen".
const NUMBER_WORDS: &[(&str, i64)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("fifteen", 15),
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("hundred", 100),
    ("ek", 1),
    ("do", 2),
    ("teen", 3),
    ("char", 4),
    ("paanch", 5),
    ("panch", 5),
    ("chhe", 6),
    ("saat", 7),
    ("aath", 8),
    ("aat", 8),
    ("nau", 9),
    ("das", 10),
    ("gyarah", 11),
    ("barah", 12),
    ("pandrah", 15),
    ("bees", 20),
    ("tees", 30),
    ("chalis", 40),
    ("pachas", 50),
    ("sau", 100),
    ("only one", 1),
    ("sirf ek", 1),
    ("bas ek", 1),
    ("half dozen", 6),
    ("dozen", 12),
    ("derzen", 12),
];

/// Phrases meaning the speaker is buying for themselves; these map the
/// customer to the shop owner's name.
const SELF_REFERENCES: &[&str] =
    &["mujhe", "mere liye", "mera", "apne liye", "khud", "myself", "me", "for me", "mere"];

/// Filler tokens stripped before product phrase extraction.
const PRODUCT_NOISE_WORDS: &[&str] = &[
    "hai",
    "kya",
    "ka",
    "ki",
    "ke",
    "chahiye",
    "dedo",
    "dena",
    "do",
    "lo",
    "order",
    "give",
    "please",
    "bhai",
    "available",
    "stock",
    "check",
    "milega",
    "?",
    "!",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    /// Literal digits in the message.
    Numeric,
    /// Matched the number-word vocabulary.
    NumberWord,
    /// Self-reference mapped to the owner.
    SelfReference,
    /// "X ko" / "for X" style pattern.
    Pattern,
    /// Short capitalized sequence that looks like a name.
    NameLike,
    /// Token sequence left after noise stripping.
    Phrase,
    /// Carried over from the previous turn.
    Context,
    /// Whole message taken as the answer to a direct slot question.
    SlotFill,
    /// Vetted hint from the fallback classifier.
    Model,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedValue<T> {
    pub value: T,
    pub confidence: f64,
    pub source: EntitySource,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedEntities {
    pub product: Option<ExtractedValue<String>>,
    pub quantity: Option<ExtractedValue<i64>>,
    pub customer: Option<ExtractedValue<String>>,
}

/// Prior-turn values offered as weak fallbacks.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractionContext<'a> {
    pub last_product: Option<&'a str>,
    pub last_quantity: Option<i64>,
    pub last_customer: Option<&'a str>,
}

fn numeral_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("static pattern"))
}

fn number_word_patterns() -> &'static Vec<(Regex, i64)> {
    static PATTERNS: OnceLock<Vec<(Regex, i64)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        NUMBER_WORDS
            .iter()
            .map(|(word, value)| {
                let pattern = format!(r"\b{}\b", regex::escape(word));
                (Regex::new(&pattern).expect("static pattern"), *value)
            })
            .collect()
    })
}

fn self_reference_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SELF_REFERENCES
            .iter()
            .map(|phrase| {
                let pattern = format!(r"\b{}\b", regex::escape(phrase));
                Regex::new(&pattern).expect("static pattern")
            })
            .collect()
    })
}

fn ko_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\w+)\s+ko\b").expect("static pattern"))
}

fn for_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)for\s+(\w+)").expect("static pattern"))
}

/// Python-style capitalize: first letter upper, rest lower.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Quantity ladder: first numeral, then number words, then prior turn.
/// A numeral that is fractional, non-positive or above [`MAX_ORDER_QUANTITY`]
/// makes the quantity absent rather than guessed.
pub fn extract_quantity(text: &str, context: &ExtractionContext<'_>) -> Option<ExtractedValue<i64>> {
    if text.trim().is_empty() {
        return None;
    }

    let text_lower = text.to_lowercase();
    if let Some(found) = numeral_pattern().find(&text_lower) {
        let raw = found.as_str();
        if raw.contains('.') {
            return None;
        }
        let value: i64 = raw.parse().ok()?;
        if value <= 0 || value > MAX_ORDER_QUANTITY {
            return None;
        }
        return Some(ExtractedValue { value, confidence: 0.95, source: EntitySource::Numeric });
    }

    for (pattern, value) in number_word_patterns() {
        if pattern.is_match(&text_lower) {
            return Some(ExtractedValue {
                value: *value,
                confidence: 0.85,
                source: EntitySource::NumberWord,
            });
        }
    }

    context.last_quantity.map(|value| ExtractedValue {
        value,
        confidence: 0.4,
        source: EntitySource::Context,
    })
}

/// Customer ladder: self-reference to the owner, "X ko", "for X", a short
/// capitalized name, then prior turn.
pub fn extract_customer(
    text: &str,
    context: &ExtractionContext<'_>,
    owner_name: &str,
) -> Option<ExtractedValue<String>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let text_lower = trimmed.to_lowercase();
    for pattern in self_reference_patterns() {
        if pattern.is_match(&text_lower) {
            return Some(ExtractedValue {
                value: owner_name.to_owned(),
                confidence: 0.9,
                source: EntitySource::SelfReference,
            });
        }
    }

    if let Some(captures) = ko_pattern().captures(trimmed) {
        return Some(ExtractedValue {
            value: capitalize(&captures[1]),
            confidence: 0.85,
            source: EntitySource::Pattern,
        });
    }

    if let Some(captures) = for_pattern().captures(trimmed) {
        return Some(ExtractedValue {
            value: capitalize(&captures[1]),
            confidence: 0.8,
            source: EntitySource::Pattern,
        });
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if !words.is_empty() && words.len() <= 2 {
        let starts_upper = words[0].chars().next().is_some_and(char::is_uppercase);
        if starts_upper {
            return Some(ExtractedValue {
                value: words.join(" "),
                confidence: 0.7,
                source: EntitySource::NameLike,
            });
        }
    }

    context.last_customer.map(|name| ExtractedValue {
        value: name.to_owned(),
        confidence: 0.4,
        source: EntitySource::Context,
    })
}

/// Product ladder over the noise-stripped tokens: name-like tokens
/// (capitalized or digit-bearing) first, then any short remaining
/// sequence, then prior turn. The returned phrase is still RAW user
/// wording and must be resolved before use.
pub fn extract_product(
    text: &str,
    context: &ExtractionContext<'_>,
) -> Option<ExtractedValue<String>> {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        let cleaned: Vec<&str> =
            trimmed.split_whitespace().filter(|word| !is_product_noise(word)).collect();

        if !cleaned.is_empty() {
            let medicine_like: Vec<&str> = cleaned
                .iter()
                .copied()
                .filter(|word| {
                    word.chars().count() > 2
                        && (word.chars().next().is_some_and(char::is_uppercase)
                            || word.chars().any(char::is_numeric))
                })
                .collect();

            if !medicine_like.is_empty() {
                return Some(ExtractedValue {
                    value: medicine_like.join(" "),
                    confidence: 0.8,
                    source: EntitySource::Phrase,
                });
            }

            if cleaned.len() <= 3 {
                let substantial: Vec<&str> =
                    cleaned.iter().copied().filter(|word| word.chars().count() > 2).collect();
                if !substantial.is_empty() {
                    return Some(ExtractedValue {
                        value: substantial.join(" "),
                        confidence: 0.6,
                        source: EntitySource::Phrase,
                    });
                }
                return Some(ExtractedValue {
                    value: cleaned.join(" "),
                    confidence: 0.4,
                    source: EntitySource::Phrase,
                });
            }
        }
    }

    context.last_product.map(|phrase| ExtractedValue {
        value: phrase.to_owned(),
        confidence: 0.4,
        source: EntitySource::Context,
    })
}

fn is_product_noise(word: &str) -> bool {
    let lower = word.to_lowercase();
    PRODUCT_NOISE_WORDS.contains(&lower.as_str())
}

pub fn extract_all(
    text: &str,
    context: &ExtractionContext<'_>,
    owner_name: &str,
) -> ExtractedEntities {
    ExtractedEntities {
        product: extract_product(text, context),
        quantity: extract_quantity(text, context),
        customer: extract_customer(text, context, owner_name),
    }
}
