//! # Compound Ingredient Splitter
//!
//! Detects identity strings that name several purchasable items at once
//! ("salt and pepper") and splits them into independent components, while
//! refusing to split multi-word product names ("mac and cheese", anything
//! ending in "sauce" or "mix").
//!
//! This is a precision-over-recall component: a false split corrupts
//! shopping lists, so the product-phrase blocklist always wins over
//! connector detection, and a split that fails validation falls back to
//! "not compound".

use crate::keywords::KeywordConfig;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The connector that joined a compound phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    And,
    Or,
    Plus,
    With,
    /// Comma/semicolon-separated list (possibly ending in "and").
    List,
}

/// Result of compound detection for one identity string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundSplit {
    pub is_compound: bool,
    /// Independent identity strings; empty unless `is_compound`.
    pub components: Vec<String>,
    pub connector: Option<ConnectorType>,
}

impl CompoundSplit {
    fn single() -> Self {
        Self {
            is_compound: false,
            components: Vec::new(),
            connector: None,
        }
    }
}

lazy_static! {
    /// Word-boundary connector detection.
    static ref WORD_CONNECTOR: Regex =
        Regex::new(r"\b(and|or|plus|with)\b").expect("valid regex");
    /// Split points: commas/semicolons, word connectors, ampersands.
    static ref SPLIT_POINTS: Regex =
        Regex::new(r"\s*[,;]\s*|\s+(?:and|or|plus|with)\s+|\s*&\s*").expect("valid regex");
}

/// Split an identity string into compound components, if it genuinely
/// names more than one item.
pub fn split_compound(identity: &str, keywords: &KeywordConfig) -> CompoundSplit {
    let identity = identity.trim().to_lowercase();
    if identity.is_empty() {
        return CompoundSplit::single();
    }

    // Product names must never split, regardless of connectors.
    if keywords.is_product_phrase(&identity) {
        debug!("'{}' matches a product phrase; not splitting", identity);
        return CompoundSplit::single();
    }

    let has_word_connector = WORD_CONNECTOR.is_match(&identity);
    let has_punct_connector = identity.contains(',') || identity.contains(';') || identity.contains('&');
    if !has_word_connector && !has_punct_connector {
        return CompoundSplit::single();
    }

    let components: Vec<String> = SPLIT_POINTS
        .split(&identity)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    if !validate_components(&components) {
        debug!("Split of '{}' failed validation; not a compound", identity);
        return CompoundSplit::single();
    }

    let connector = Some(classify_connector(&identity));
    debug!("'{}' split into {:?}", identity, components);

    CompoundSplit {
        is_compound: true,
        components,
        connector,
    }
}

/// A genuine compound has at least two components, each at least two
/// characters, none purely numeric, and at least one containing letters.
fn validate_components(components: &[String]) -> bool {
    if components.len() < 2 {
        return false;
    }
    if components.iter().any(|c| c.chars().count() < 2) {
        return false;
    }
    if components
        .iter()
        .any(|c| c.chars().all(|ch| ch.is_ascii_digit()))
    {
        return false;
    }
    components
        .iter()
        .any(|c| c.chars().any(|ch| ch.is_alphabetic()))
}

/// Primary connector: "A, B and C" counts as a list.
fn classify_connector(identity: &str) -> ConnectorType {
    if identity.contains(',') || identity.contains(';') {
        return ConnectorType::List;
    }
    match WORD_CONNECTOR
        .captures(identity)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
    {
        Some("and") => ConnectorType::And,
        Some("or") => ConnectorType::Or,
        Some("plus") => ConnectorType::Plus,
        Some("with") => ConnectorType::With,
        _ => ConnectorType::And, // bare '&'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(identity: &str) -> CompoundSplit {
        split_compound(identity, &KeywordConfig::default())
    }

    #[test]
    fn test_genuine_compound_splits() {
        let result = split("salt and pepper");
        assert!(result.is_compound);
        assert_eq!(result.components, vec!["salt", "pepper"]);
        assert_eq!(result.connector, Some(ConnectorType::And));
    }

    #[test]
    fn test_product_phrase_never_splits() {
        assert!(!split("sweet and sour sauce").is_compound);
        assert!(!split("mac and cheese").is_compound);
        assert!(!split("half and half").is_compound);
        // Generic product token veto.
        assert!(!split("onion soup and dip mix").is_compound);
    }

    #[test]
    fn test_comma_and_list() {
        let result = split("carrots, celery and onion");
        assert!(result.is_compound);
        assert_eq!(result.components, vec!["carrots", "celery", "onion"]);
        assert_eq!(result.connector, Some(ConnectorType::List));
    }

    #[test]
    fn test_ampersand() {
        let result = split("oil & vinegar");
        assert!(result.is_compound);
        assert_eq!(result.components, vec!["oil", "vinegar"]);
        assert_eq!(result.connector, Some(ConnectorType::And));
    }

    #[test]
    fn test_single_item_not_compound() {
        assert!(!split("onion").is_compound);
        assert!(!split("").is_compound);
    }

    #[test]
    fn test_validation_rejects_fragments() {
        // One-character fragments are not purchasable items.
        assert!(!split("a and b").is_compound);
        // Purely numeric components are rejected.
        assert!(!split("12 and 34").is_compound);
    }

    #[test]
    fn test_or_connector() {
        let result = split("butter or margarine");
        assert!(result.is_compound);
        assert_eq!(result.connector, Some(ConnectorType::Or));
    }
}
