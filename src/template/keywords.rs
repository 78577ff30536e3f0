//! Keyword derivation for category matching.
//!
//! Category names are normalized (lower-cased, punctuation stripped) and
//! looked up in a fixed dictionary. Unknown names fall back to the
//! normalized name itself plus its first word, so every category yields a
//! non-empty, deterministic keyword set.

use std::sync::OnceLock;

use regex::Regex;

/// Keyword sets for well-known category names, keyed by normalized name.
static DICTIONARY: &[(&str, &[&str])] = &[
    (
        "new leads",
        &["quote", "price", "cost", "interested", "inquiry", "information"],
    ),
    (
        "sales",
        &["quote", "price", "buy", "purchase", "order", "interested"],
    ),
    (
        "support",
        &["help", "issue", "problem", "error", "broken", "not working"],
    ),
    (
        "customer support",
        &["help", "issue", "problem", "complaint", "refund", "return"],
    ),
    (
        "technical support",
        &["bug", "crash", "error", "login", "password", "not working"],
    ),
    (
        "billing",
        &["invoice", "payment", "receipt", "refund", "charge", "billing"],
    ),
    (
        "scheduling",
        &["appointment", "schedule", "reschedule", "booking", "availability", "cancel"],
    ),
    (
        "urgent",
        &["urgent", "asap", "emergency", "immediately", "critical"],
    ),
];

fn non_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap())
}

/// Normalize a category name: lower-case, strip punctuation, collapse
/// whitespace. "Support - Technical" becomes "support technical".
pub fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let spaced = non_word_pattern().replace_all(&lowered, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive the keyword set for a category name.
///
/// Dictionary hit: the fixed set, in dictionary order. Miss: the
/// normalized name plus its first word (deduplicated). Never empty for a
/// name containing at least one alphanumeric character.
pub fn derive_keywords(name: &str) -> Vec<String> {
    let normalized = normalize(name);

    if let Some((_, words)) = DICTIONARY.iter().find(|(key, _)| *key == normalized) {
        return words.iter().map(|w| w.to_string()).collect();
    }

    let mut keywords = Vec::new();
    if !normalized.is_empty() {
        keywords.push(normalized.clone());
        if let Some(first) = normalized.split_whitespace().next() {
            if first != normalized {
                keywords.push(first.to_string());
            }
        }
    }
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_case_and_punctuation() {
        assert_eq!(normalize("Support - Technical"), "support technical");
        assert_eq!(normalize("  New   Leads!! "), "new leads");
        assert_eq!(normalize("Billing/Invoices"), "billing invoices");
    }

    #[test]
    fn dictionary_hit_for_new_leads() {
        let keywords = derive_keywords("New Leads");
        assert_eq!(
            keywords,
            vec!["quote", "price", "cost", "interested", "inquiry", "information"]
        );
    }

    #[test]
    fn punctuation_variant_is_nonempty_and_deterministic() {
        let first = derive_keywords("Support - Technical");
        let second = derive_keywords("Support - Technical");
        assert!(!first.is_empty());
        assert_eq!(first, second);
        assert!(first.contains(&"support".to_string()));
    }

    #[test]
    fn unknown_name_falls_back_to_name_and_first_word() {
        let keywords = derive_keywords("Vendor Contracts");
        assert_eq!(keywords, vec!["vendor contracts", "vendor"]);
    }

    #[test]
    fn single_word_fallback_does_not_duplicate() {
        let keywords = derive_keywords("Partnerships");
        assert_eq!(keywords, vec!["partnerships"]);
    }

    #[test]
    fn dictionary_keys_are_normalized() {
        for (key, words) in DICTIONARY {
            assert_eq!(*key, normalize(key), "dictionary key {key:?} not normalized");
            assert!(!words.is_empty());
        }
    }
}
