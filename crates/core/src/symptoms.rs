//! Symptom to medicine lookup. Deterministic keyword categories, no
//! language model involved: a symptom phrase expands to its category's
//! full keyword set, which is then matched against each item's
//! `used_for` text.

use crate::domain::inventory::InventoryItem;

const MAX_RESULTS: usize = 5;

/// Symptom categories in English, Hinglish and Devanagari.
const SYMPTOM_KEYWORDS: &[(&str, &[&str])] = &[
    ("fever", &["fever", "bukhar", "bukhaar", "\u{924}\u{93e}\u{92a}\u{92e}\u{93e}\u{928}"]),
    ("pain", &["pain", "dard", "\u{926}\u{930}\u{94d}\u{926}", "ache"]),
    ("headache", &["headache", "sir dard", "\u{938}\u{93f}\u{930} \u{926}\u{930}\u{94d}\u{926}"]),
    ("cold", &["cold", "sardi", "\u{91c}\u{941}\u{915}\u{93e}\u{92e}", "cough", "khasi"]),
    ("stomach", &["stomach", "pet", "\u{92a}\u{947}\u{91f}", "acidity", "gas"]),
    ("allergy", &["allergy", "\u{916}\u{941}\u{91c}\u{932}\u{940}", "khujli", "rash"]),
    ("vitamin", &["vitamin", "\u{915}\u{92e}\u{91c}\u{94b}\u{930}\u{940}", "kamjori", "weakness"]),
    ("diabetes", &["sugar", "diabetes", "\u{92e}\u{927}\u{941}\u{92e}\u{947}\u{939}"]),
    ("blood_pressure", &["bp", "blood pressure", "\u{930}\u{915}\u{94d}\u{924}\u{91a}\u{93e}\u{92a}"]),
    ("infection", &["infection", "\u{938}\u{902}\u{915}\u{94d}\u{930}\u{92e}\u{923}", "bacterial"]),
    ("anxiety", &["tension", "\u{91a}\u{93f}\u{902}\u{924}\u{93e}", "anxiety", "stress"]),
];

/// Expand a symptom phrase to every keyword of each category it touches,
/// in declaration order. Unrecognized phrases fall back to the phrase
/// itself so a literal ailment name can still hit `used_for` text.
pub fn expand_symptom_keywords(text: &str) -> Vec<String> {
    let symptom_lower = text.to_lowercase().trim().to_string();

    let mut keywords: Vec<String> = Vec::new();
    for (_, category_keywords) in SYMPTOM_KEYWORDS {
        if category_keywords.iter().any(|kw| symptom_lower.contains(kw)) {
            for kw in *category_keywords {
                if !keywords.iter().any(|existing| existing == kw) {
                    keywords.push((*kw).to_string());
                }
            }
        }
    }

    if keywords.is_empty() {
        keywords.push(symptom_lower);
    }

    keywords
}

/// Medicines whose `used_for` text mentions any expanded keyword,
/// deduplicated by name, at most [`MAX_RESULTS`].
pub fn map_symptoms<'a>(text: &str, items: &'a [InventoryItem]) -> Vec<&'a InventoryItem> {
    let keywords = expand_symptom_keywords(text);

    let mut results: Vec<&'a InventoryItem> = Vec::new();
    for keyword in &keywords {
        for item in items {
            let haystack = match &item.used_for {
                Some(used_for) => used_for.to_lowercase(),
                None => continue,
            };
            if haystack.contains(keyword) && !results.iter().any(|r| r.name == item.name) {
                results.push(item);
            }
        }
    }

    results.truncate(MAX_RESULTS);
    results
}
