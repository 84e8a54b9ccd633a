//! # Identity Matcher
//!
//! Resolves a parsed identity string to a catalog ingredient with a
//! confidence score, using staged resolution: exact/alias lookup (with a
//! simple-English singular fallback), token-set Jaccard similarity,
//! Levenshtein edit distance, and an optional per-ingredient regex
//! pattern fallback. Each stage runs only if the previous one found
//! nothing, so exact matches are a hash lookup and only the deliberate
//! fuzzy stages scan the catalog.
//!
//! Compound identities ("salt and pepper") are resolved per component;
//! the rollup status is `Compound` only when every component matched.

use crate::catalog::{IngredientCatalog, IngredientForm};
use crate::compound::{split_compound, ConnectorType};
use crate::keywords::KeywordConfig;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which stage produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Exact,
    Alias,
    Token,
    Fuzzy,
    Pattern,
}

/// Rollup status for an identity, covering compound phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Compound,
    PartialCompound,
    Unknown,
}

/// The outcome of matching one identity (or one compound component).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub catalog_id: Option<String>,
    /// Confidence in [0, 1]; 0 means no match.
    pub confidence: f64,
    pub method: Option<MatchMethod>,
    /// The alias or display name that matched, when one did.
    pub matched_alias: Option<String>,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self {
            catalog_id: None,
            confidence: 0.0,
            method: None,
            matched_alias: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.catalog_id.is_some()
    }
}

/// One compound component and its independent match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMatch {
    pub component: String,
    pub result: MatchResult,
}

/// Full resolution of an identity string, compound-aware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMatch {
    pub status: MatchStatus,
    /// The single-identity result; a no-match placeholder for compounds.
    pub result: MatchResult,
    /// Per-component results when the identity was a compound.
    pub component_results: Vec<ComponentMatch>,
    pub connector: Option<ConnectorType>,
}

/// Minimum Jaccard similarity accepted by the token stage.
const TOKEN_SIMILARITY_THRESHOLD: f64 = 0.6;
/// Confidence floor for the edit-distance stage.
const FUZZY_CONFIDENCE_FLOOR: f64 = 0.5;

/// Staged identity matcher bound to a read-only catalog.
pub struct IdentityMatcher<'a> {
    catalog: &'a IngredientCatalog,
    keywords: &'a KeywordConfig,
    /// Compiled per-ingredient patterns (enhanced matcher only).
    patterns: Vec<(String, Regex)>,
    use_patterns: bool,
}

impl<'a> IdentityMatcher<'a> {
    pub fn new(catalog: &'a IngredientCatalog, keywords: &'a KeywordConfig) -> Self {
        Self {
            catalog,
            keywords,
            patterns: Vec::new(),
            use_patterns: false,
        }
    }

    /// Enable the regex pattern-fallback stage, compiling every catalog
    /// entry's `match_pattern`. Invalid patterns are skipped with a
    /// warning rather than failing the run.
    pub fn with_patterns(mut self) -> Self {
        self.patterns = self
            .catalog
            .iter()
            .filter_map(|ingredient| {
                let pattern = ingredient.match_pattern.as_deref()?;
                match Regex::new(pattern) {
                    Ok(regex) => Some((ingredient.id.clone(), regex)),
                    Err(e) => {
                        warn!(
                            "Skipping invalid match pattern for '{}': {}",
                            ingredient.id, e
                        );
                        None
                    }
                }
            })
            .collect();
        self.use_patterns = true;
        self
    }

    /// Resolve an identity string, splitting compounds and matching each
    /// component independently.
    pub fn resolve(&self, identity: &str, form: IngredientForm) -> ResolvedMatch {
        let split = split_compound(identity, self.keywords);

        if !split.is_compound {
            let result = self.match_identity(identity, form);
            let status = if result.is_match() {
                MatchStatus::Matched
            } else {
                MatchStatus::Unknown
            };
            return ResolvedMatch {
                status,
                result,
                component_results: Vec::new(),
                connector: None,
            };
        }

        let component_results: Vec<ComponentMatch> = split
            .components
            .iter()
            .map(|component| ComponentMatch {
                component: component.clone(),
                result: self.match_identity(component, form),
            })
            .collect();

        let matched = component_results
            .iter()
            .filter(|c| c.result.is_match())
            .count();
        let status = if matched == component_results.len() {
            MatchStatus::Compound
        } else if matched > 0 {
            MatchStatus::PartialCompound
        } else {
            MatchStatus::Unknown
        };

        debug!(
            "Compound '{}': {}/{} components matched",
            identity,
            matched,
            component_results.len()
        );

        ResolvedMatch {
            status,
            result: MatchResult::no_match(),
            component_results,
            connector: split.connector,
        }
    }

    /// Match a single identity string through the stages in order.
    pub fn match_identity(&self, identity: &str, form: IngredientForm) -> MatchResult {
        let identity = identity.trim().to_lowercase();
        if identity.is_empty() {
            return MatchResult::no_match();
        }

        if let Some(result) = self.exact_match(&identity, form) {
            return result;
        }
        if let Some(result) = self.token_similarity_match(&identity, form) {
            return result;
        }
        if let Some(result) = self.edit_distance_match(&identity, form) {
            return result;
        }
        if self.use_patterns {
            if let Some(result) = self.pattern_match(&identity, form) {
                return result;
            }
        }

        debug!("No catalog match for '{}'", identity);
        MatchResult::no_match()
    }

    /// Stage 1: verbatim id/alias lookup, then the simple English singular.
    pub fn exact_match(&self, identity: &str, form: IngredientForm) -> Option<MatchResult> {
        if let Some(ingredient) = self.catalog.resolve_exact(identity) {
            let state_matches = ingredient.form == form;
            return Some(MatchResult {
                catalog_id: Some(ingredient.id.clone()),
                confidence: if state_matches { 1.0 } else { 0.95 },
                method: Some(if identity == ingredient.id.to_lowercase() {
                    MatchMethod::Exact
                } else {
                    MatchMethod::Alias
                }),
                matched_alias: Some(identity.to_string()),
            });
        }

        let singular = singularize(identity);
        if singular != identity {
            if let Some(ingredient) = self.catalog.resolve_exact(&singular) {
                let state_matches = ingredient.form == form;
                return Some(MatchResult {
                    catalog_id: Some(ingredient.id.clone()),
                    confidence: if state_matches { 0.95 } else { 0.90 },
                    method: Some(MatchMethod::Alias),
                    matched_alias: Some(singular),
                });
            }
        }

        None
    }

    /// Stage 2: Jaccard similarity between stopword-filtered token sets.
    pub fn token_similarity_match(
        &self,
        identity: &str,
        form: IngredientForm,
    ) -> Option<MatchResult> {
        let identity_tokens = self.token_set(identity);
        if identity_tokens.is_empty() {
            return None;
        }

        let mut best: Option<(f64, &str, String)> = None;
        for ingredient in self.catalog.iter() {
            let mut candidates = vec![ingredient.display_name.clone()];
            candidates.extend(ingredient.aliases.iter().cloned());
            for candidate in candidates {
                let similarity = jaccard(&identity_tokens, &self.token_set(&candidate));
                if best.as_ref().is_none_or(|(s, _, _)| similarity > *s) {
                    best = Some((similarity, &ingredient.id, candidate));
                }
            }
        }

        let (similarity, id, display_name) = best?;
        if similarity < TOKEN_SIMILARITY_THRESHOLD {
            return None;
        }

        let ingredient = self.catalog.get(id)?;
        let confidence = if ingredient.form == form {
            (similarity + 0.1).min(1.0)
        } else {
            similarity * 0.9
        };

        Some(MatchResult {
            catalog_id: Some(id.to_string()),
            confidence,
            method: Some(MatchMethod::Token),
            matched_alias: Some(display_name),
        })
    }

    /// Stage 3: minimum Levenshtein distance over every alias, accepted
    /// when within max(2, 20% of the identity length).
    pub fn edit_distance_match(
        &self,
        identity: &str,
        form: IngredientForm,
    ) -> Option<MatchResult> {
        let mut best: Option<(usize, &str, String)> = None;
        for ingredient in self.catalog.iter() {
            let mut candidates = vec![
                ingredient.id.to_lowercase(),
                ingredient.display_name.to_lowercase(),
            ];
            candidates.extend(ingredient.aliases.iter().map(|a| a.to_lowercase()));
            for candidate in candidates {
                let distance = levenshtein(identity, &candidate);
                if best.as_ref().is_none_or(|(d, _, _)| distance < *d) {
                    best = Some((distance, &ingredient.id, candidate));
                }
            }
        }

        let (distance, id, alias) = best?;
        let max_distance = 2.max((0.2 * identity.chars().count() as f64).floor() as usize);
        if distance > max_distance {
            return None;
        }

        let length = identity.chars().count().max(1) as f64;
        let mut confidence = (1.0 - distance as f64 / length).max(FUZZY_CONFIDENCE_FLOOR);
        let ingredient = self.catalog.get(id)?;
        if ingredient.form == form {
            confidence = (confidence + 0.05).min(1.0);
        }

        Some(MatchResult {
            catalog_id: Some(id.to_string()),
            confidence,
            method: Some(MatchMethod::Fuzzy),
            matched_alias: Some(alias),
        })
    }

    /// Stage 4 (enhanced only): first catalog pattern that matches wins at
    /// fixed confidence.
    pub fn pattern_match(&self, identity: &str, form: IngredientForm) -> Option<MatchResult> {
        for (id, regex) in &self.patterns {
            if regex.is_match(identity) {
                let state_matches = self.catalog.get(id).is_some_and(|i| i.form == form);
                return Some(MatchResult {
                    catalog_id: Some(id.clone()),
                    confidence: if state_matches { 0.90 } else { 0.85 },
                    method: Some(MatchMethod::Pattern),
                    matched_alias: None,
                });
            }
        }
        None
    }

    fn token_set(&self, text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .filter(|t| !self.keywords.is_stopword(t))
            .map(|t| t.to_string())
            .collect()
    }
}

/// Jaccard similarity of two token sets.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Levenshtein edit distance, used by the fuzzy stage and by process-id
/// "did you mean" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution_cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (prev[j] + substitution_cost)
                .min(prev[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

/// Reduce a plural English word to its simple singular form.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["ches", "shes", "sses", "xes", "oes"] {
        if let Some(stem) = word.strip_suffix(suffix) {
            if !stem.is_empty() {
                // Strip only the trailing "es".
                return format!("{}{}", stem, &suffix[..suffix.len() - 2]);
            }
        }
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CanonicalUnit, CatalogIngredient};

    fn test_catalog() -> IngredientCatalog {
        IngredientCatalog::from_records(vec![
            CatalogIngredient::new("onion", "Onion", CanonicalUnit::Mass)
                .with_form(IngredientForm::Fresh)
                .with_aliases(&["yellow onion", "brown onion"]),
            CatalogIngredient::new("tomato", "Tomato", CanonicalUnit::Mass)
                .with_form(IngredientForm::Fresh)
                .with_aliases(&["roma tomato"]),
            CatalogIngredient::new("salt", "Salt", CanonicalUnit::Mass)
                .with_form(IngredientForm::Dried)
                .with_aliases(&["table salt", "sea salt"]),
            CatalogIngredient::new("black-pepper", "Black Pepper", CanonicalUnit::Mass)
                .with_form(IngredientForm::Dried)
                .with_aliases(&["pepper", "ground pepper"]),
            CatalogIngredient::new("cheddar", "Cheddar Cheese", CanonicalUnit::Mass)
                .with_form(IngredientForm::Fresh)
                .with_match_pattern(r"cheddar|sharp cheese"),
        ])
        .unwrap()
    }

    fn matcher_for<'a>(
        catalog: &'a IngredientCatalog,
        keywords: &'a KeywordConfig,
    ) -> IdentityMatcher<'a> {
        IdentityMatcher::new(catalog, keywords)
    }

    #[test]
    fn test_exact_match_with_state() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();
        let matcher = matcher_for(&catalog, &keywords);

        let result = matcher.match_identity("onion", IngredientForm::Fresh);
        assert_eq!(result.catalog_id.as_deref(), Some("onion"));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.method, Some(MatchMethod::Exact));

        let result = matcher.match_identity("onion", IngredientForm::Frozen);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_alias_match() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();
        let matcher = matcher_for(&catalog, &keywords);

        let result = matcher.match_identity("yellow onion", IngredientForm::Fresh);
        assert_eq!(result.catalog_id.as_deref(), Some("onion"));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.method, Some(MatchMethod::Alias));
    }

    #[test]
    fn test_singular_fallback() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();
        let matcher = matcher_for(&catalog, &keywords);

        let result = matcher.match_identity("onions", IngredientForm::Fresh);
        assert_eq!(result.catalog_id.as_deref(), Some("onion"));
        assert_eq!(result.confidence, 0.95);

        let result = matcher.match_identity("tomatoes", IngredientForm::Fresh);
        assert_eq!(result.catalog_id.as_deref(), Some("tomato"));
    }

    #[test]
    fn test_token_similarity() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();
        let matcher = matcher_for(&catalog, &keywords);

        // "onion yellow" shares both tokens with the "yellow onion" alias.
        let result = matcher.match_identity("onion yellow", IngredientForm::Fresh);
        assert_eq!(result.catalog_id.as_deref(), Some("onion"));
        assert_eq!(result.method, Some(MatchMethod::Token));
        assert!(result.confidence >= 0.6);
    }

    #[test]
    fn test_edit_distance_typo() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();
        let matcher = matcher_for(&catalog, &keywords);

        let result = matcher.match_identity("onoin", IngredientForm::Fresh);
        assert_eq!(result.catalog_id.as_deref(), Some("onion"));
        assert_eq!(result.method, Some(MatchMethod::Fuzzy));
        assert!(result.confidence >= 0.5);
    }

    #[test]
    fn test_pattern_fallback_enhanced_only() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();

        let plain = matcher_for(&catalog, &keywords);
        let result = plain.match_identity("aged sharp cheese wedge wheel", IngredientForm::Fresh);
        assert!(!result.is_match());

        let enhanced = IdentityMatcher::new(&catalog, &keywords).with_patterns();
        let result = enhanced.match_identity("aged sharp cheese wedge wheel", IngredientForm::Fresh);
        assert_eq!(result.catalog_id.as_deref(), Some("cheddar"));
        assert_eq!(result.method, Some(MatchMethod::Pattern));
        assert_eq!(result.confidence, 0.90);
    }

    #[test]
    fn test_no_match() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();
        let matcher = matcher_for(&catalog, &keywords);

        let result = matcher.match_identity("dragonfruit syrup extract", IngredientForm::Other);
        assert!(!result.is_match());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, None);
    }

    #[test]
    fn test_stage_monotonicity() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();
        let matcher = matcher_for(&catalog, &keywords);

        // When several stages would succeed for the same identity, the
        // earlier stage's confidence is never lower.
        let exact = matcher.exact_match("onion", IngredientForm::Fresh).unwrap();
        let token = matcher
            .token_similarity_match("onion", IngredientForm::Fresh)
            .unwrap();
        let fuzzy = matcher
            .edit_distance_match("onion", IngredientForm::Fresh)
            .unwrap();
        assert!(exact.confidence >= token.confidence);
        assert!(token.confidence >= fuzzy.confidence);
    }

    #[test]
    fn test_compound_resolution() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();
        let matcher = matcher_for(&catalog, &keywords);

        let resolved = matcher.resolve("salt and pepper", IngredientForm::Dried);
        assert_eq!(resolved.status, MatchStatus::Compound);
        assert_eq!(resolved.component_results.len(), 2);
        assert_eq!(
            resolved.component_results[0].result.catalog_id.as_deref(),
            Some("salt")
        );
        assert_eq!(
            resolved.component_results[1].result.catalog_id.as_deref(),
            Some("black-pepper")
        );
    }

    #[test]
    fn test_partial_compound() {
        let catalog = test_catalog();
        let keywords = KeywordConfig::default();
        let matcher = matcher_for(&catalog, &keywords);

        let resolved = matcher.resolve("salt and gobbledygook powder", IngredientForm::Dried);
        assert_eq!(resolved.status, MatchStatus::PartialCompound);
        let matched: Vec<_> = resolved
            .component_results
            .iter()
            .filter(|c| c.result.is_match())
            .collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].result.catalog_id.as_deref(), Some("salt"));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("onion", "onoin"), 2);
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("onions"), "onion");
        assert_eq!(singularize("tomatoes"), "tomato");
        assert_eq!(singularize("berries"), "berry");
        assert_eq!(singularize("peaches"), "peach");
        assert_eq!(singularize("grass"), "grass");
        assert_eq!(singularize("egg"), "egg");
    }
}
