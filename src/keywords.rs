//! # Keyword Configuration
//!
//! Versioned keyword tables that drive token classification, compound
//! splitting, and matcher stopword filtering. These lists are the main
//! source of future tuning, so they live here as injectable configuration
//! rather than inline literals: tests and callers can swap in their own
//! `KeywordConfig` without touching the parsing or matching logic.

use crate::catalog::IngredientForm;
use std::collections::{HashMap, HashSet};

/// Built-in preparation terms ("what you do" to an ingredient).
const PREPARATION_TERMS: &[&str] = &[
    "chopped", "diced", "minced", "sliced", "grated", "shredded", "peeled",
    "crushed", "mashed", "melted", "softened", "julienned", "cubed",
    "trimmed", "halved", "quartered", "beaten", "sifted", "rinsed",
    "drained", "packed", "toasted", "crumbled", "zested", "juiced",
    "seeded", "stemmed", "pitted", "deveined", "scrubbed", "divided",
    "finely", "coarsely", "roughly", "thinly", "thickly", "freshly",
    "lightly", "well",
];

/// Quality descriptors that carry no purchasing identity and are discarded.
const QUALITY_DESCRIPTORS: &[&str] = &[
    "large", "small", "medium", "big", "ripe", "overripe", "organic",
    "premium", "quality", "good", "best", "extra-virgin", "free-range",
    "low-sodium", "unsalted", "reduced-fat", "lean",
];

/// Filler words stripped from identity text.
const NOISE_WORDS: &[&str] = &[
    "of", "the", "a", "an", "about", "approximately", "approx", "optional",
];

/// Direct retail-state keywords.
const STATE_KEYWORDS: &[(&str, IngredientForm)] = &[
    ("fresh", IngredientForm::Fresh),
    ("frozen", IngredientForm::Frozen),
    ("thawed", IngredientForm::Frozen),
    ("canned", IngredientForm::Canned),
    ("tinned", IngredientForm::Canned),
    ("jarred", IngredientForm::Canned),
    ("dried", IngredientForm::Dried),
    ("dry", IngredientForm::Dried),
    ("dehydrated", IngredientForm::Dried),
    ("ground", IngredientForm::Dried),
];

/// Pantry staples assumed to be sold dry when no other state signal exists.
const PANTRY_KEYWORDS: &[&str] = &[
    "flour", "sugar", "salt", "pepper", "rice", "pasta", "noodle", "oat",
    "lentil", "bean", "spice", "cumin", "paprika", "oregano", "cinnamon",
    "baking", "yeast", "cornstarch", "breadcrumb",
];

/// Multi-word product phrases that must never be split as compounds.
const PRODUCT_PHRASES: &[&str] = &[
    "sweet and sour",
    "mac and cheese",
    "macaroni and cheese",
    "half and half",
    "salt and vinegar",
    "pork and beans",
    "surf and turf",
    "bangers and mash",
    "fish and chips",
];

/// Single tokens whose presence marks a phrase as one product, not a list.
const PRODUCT_TOKENS: &[&str] = &[
    "sauce", "mix", "cream", "seasoning", "blend", "dressing", "soup",
    "spread", "paste", "marinade", "glaze", "rub",
];

/// Stopwords excluded from token-set similarity scoring.
const MATCHER_STOPWORDS: &[&str] = &[
    "of", "the", "a", "an", "and", "with", "in", "for", "style",
];

/// Injectable keyword tables for the parsing and matching pipeline.
///
/// `Default` yields the built-in v1 lists above. Callers tuning behavior
/// construct their own and pass it wherever a `&KeywordConfig` is taken.
#[derive(Debug, Clone)]
pub struct KeywordConfig {
    /// Version tag for the keyword data, bumped when the lists change.
    pub version: &'static str,
    preparation: HashSet<String>,
    quality: HashSet<String>,
    noise: HashSet<String>,
    states: HashMap<String, IngredientForm>,
    pantry: Vec<String>,
    product_phrases: Vec<String>,
    product_tokens: HashSet<String>,
    stopwords: HashSet<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            version: "v1",
            preparation: PREPARATION_TERMS.iter().map(|s| s.to_string()).collect(),
            quality: QUALITY_DESCRIPTORS.iter().map(|s| s.to_string()).collect(),
            noise: NOISE_WORDS.iter().map(|s| s.to_string()).collect(),
            states: STATE_KEYWORDS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            pantry: PANTRY_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            product_phrases: PRODUCT_PHRASES.iter().map(|s| s.to_string()).collect(),
            product_tokens: PRODUCT_TOKENS.iter().map(|s| s.to_string()).collect(),
            stopwords: MATCHER_STOPWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl KeywordConfig {
    /// Check whether a lowercase token is a preparation term.
    pub fn is_preparation(&self, token: &str) -> bool {
        self.preparation.contains(token)
    }

    /// Check whether a lowercase token is a discardable quality descriptor.
    pub fn is_quality(&self, token: &str) -> bool {
        self.quality.contains(token)
    }

    /// Check whether a lowercase token is a discardable filler word.
    pub fn is_noise(&self, token: &str) -> bool {
        self.noise.contains(token)
    }

    /// Look up the retail state a lowercase token directly implies, if any.
    pub fn state_for(&self, token: &str) -> Option<IngredientForm> {
        self.states.get(token).copied()
    }

    /// Check whether identity text names a pantry staple (dry-goods heuristic).
    pub fn is_pantry_item(&self, identity: &str) -> bool {
        self.pantry.iter().any(|kw| identity.contains(kw.as_str()))
    }

    /// Check whether a phrase contains a known product name or product token,
    /// which vetoes compound splitting.
    pub fn is_product_phrase(&self, phrase: &str) -> bool {
        if self.product_phrases.iter().any(|p| phrase.contains(p.as_str())) {
            return true;
        }
        phrase
            .split_whitespace()
            .any(|tok| self.product_tokens.contains(tok))
    }

    /// Check whether a lowercase token is a matcher stopword.
    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Replace the preparation list (used by tests exercising edge cases).
    pub fn with_preparation_terms<I: IntoIterator<Item = String>>(mut self, terms: I) -> Self {
        self.preparation = terms.into_iter().collect();
        self
    }

    /// Replace the product-phrase blocklist.
    pub fn with_product_phrases<I: IntoIterator<Item = String>>(mut self, phrases: I) -> Self {
        self.product_phrases = phrases.into_iter().collect();
        self
    }
}
