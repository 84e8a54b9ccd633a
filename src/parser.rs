//! # Ingredient Text Parser
//!
//! This module parses raw recipe ingredient lines into structured data:
//! quantity, unit, identity ("what you buy"), preparation tokens ("what
//! you do"), and retail form.
//!
//! ## Features
//!
//! - Vulgar fractions (1/2, 2 1/4, ½, 1½) normalized to decimals
//! - Ranges (2-3, 1 to 2) resolved to their midpoint
//! - Unit extraction against an alias table, including count nouns
//!   ("clove", "bunch")
//! - Token classification into preparation / state / quality / noise /
//!   identity, driven by an injectable [`KeywordConfig`]
//! - Ambiguous quantities ("to taste", "as needed") stripped without
//!   polluting identity text
//!
//! Parsing is a pure function of the input line, the keyword tables, and
//! the (optional) catalog-derived state lookup. Two lines that differ only
//! in preparation produce identical identity text so they aggregate
//! together downstream.

use crate::catalog::{IngredientCatalog, IngredientForm};
use crate::keywords::KeywordConfig;
use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A normalized measurement unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Unit {
    // Volume
    Cup,
    Tablespoon,
    Teaspoon,
    FluidOunce,
    Pint,
    Quart,
    Gallon,
    Milliliter,
    Liter,
    // Mass
    Gram,
    Kilogram,
    Ounce,
    Pound,
    /// Count noun such as "clove" or "bunch"; the noun is preserved.
    Count(String),
    /// Unrecognized unit, passed through unmodified.
    Other(String),
}

impl Unit {
    pub fn is_volume(&self) -> bool {
        matches!(
            self,
            Unit::Cup
                | Unit::Tablespoon
                | Unit::Teaspoon
                | Unit::FluidOunce
                | Unit::Pint
                | Unit::Quart
                | Unit::Gallon
                | Unit::Milliliter
                | Unit::Liter
        )
    }

    pub fn is_mass(&self) -> bool {
        matches!(self, Unit::Gram | Unit::Kilogram | Unit::Ounce | Unit::Pound)
    }

    pub fn is_count(&self) -> bool {
        matches!(self, Unit::Count(_))
    }

    /// Short display form for shopping lists and warnings.
    pub fn display_name(&self) -> &str {
        match self {
            Unit::Cup => "cup",
            Unit::Tablespoon => "tbsp",
            Unit::Teaspoon => "tsp",
            Unit::FluidOunce => "fl oz",
            Unit::Pint => "pint",
            Unit::Quart => "quart",
            Unit::Gallon => "gallon",
            Unit::Milliliter => "ml",
            Unit::Liter => "l",
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Ounce => "oz",
            Unit::Pound => "lb",
            Unit::Count(noun) => noun,
            Unit::Other(text) => text,
        }
    }
}

/// A parsed ingredient line.
///
/// Preparation tokens never leak into `identity_text`: parses that differ
/// only in preparation yield identical identity and form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedIngredient {
    pub quantity: Option<f64>,
    pub unit: Option<Unit>,
    /// Normalized "what you buy" text; `None` for empty input.
    pub identity_text: Option<String>,
    /// Ordered "what you do" tokens, e.g. ["finely", "chopped"].
    pub preparation_tokens: Vec<String>,
    pub form: IngredientForm,
    /// The raw line as received, kept for diagnostics.
    pub original_text: String,
}

impl ParsedIngredient {
    fn empty(original: &str) -> Self {
        Self {
            quantity: None,
            unit: None,
            identity_text: None,
            preparation_tokens: Vec::new(),
            form: IngredientForm::Other,
            original_text: original.to_string(),
        }
    }
}

/// Unicode vulgar fractions and their ASCII expansions.
const VULGAR_FRACTIONS: &[(char, &str)] = &[
    ('¼', "1/4"),
    ('½', "1/2"),
    ('¾', "3/4"),
    ('⅓', "1/3"),
    ('⅔', "2/3"),
    ('⅕', "1/5"),
    ('⅖', "2/5"),
    ('⅗', "3/5"),
    ('⅘', "4/5"),
    ('⅙', "1/6"),
    ('⅚', "5/6"),
    ('⅛', "1/8"),
    ('⅜', "3/8"),
    ('⅝', "5/8"),
    ('⅞', "7/8"),
];

/// Phrases signalling an unmeasured quantity; stripped before tokenizing.
const AMBIGUOUS_PHRASES: &[&str] = &[
    "to taste",
    "as needed",
    "for serving",
    "for garnish",
    "plus more",
    "if desired",
    "a pinch of",
    "a little",
];

lazy_static! {
    /// Unit alias table (lowercased alias → unit).
    static ref UNIT_ALIASES: HashMap<&'static str, Unit> = {
        let mut map = HashMap::new();

        // Volume units
        map.insert("cup", Unit::Cup);
        map.insert("cups", Unit::Cup);
        map.insert("c", Unit::Cup);
        map.insert("tbsp", Unit::Tablespoon);
        map.insert("tbs", Unit::Tablespoon);
        map.insert("tablespoon", Unit::Tablespoon);
        map.insert("tablespoons", Unit::Tablespoon);
        map.insert("tsp", Unit::Teaspoon);
        map.insert("teaspoon", Unit::Teaspoon);
        map.insert("teaspoons", Unit::Teaspoon);
        map.insert("fl oz", Unit::FluidOunce);
        map.insert("fluid ounce", Unit::FluidOunce);
        map.insert("fluid ounces", Unit::FluidOunce);
        map.insert("pint", Unit::Pint);
        map.insert("pints", Unit::Pint);
        map.insert("pt", Unit::Pint);
        map.insert("quart", Unit::Quart);
        map.insert("quarts", Unit::Quart);
        map.insert("qt", Unit::Quart);
        map.insert("gallon", Unit::Gallon);
        map.insert("gallons", Unit::Gallon);
        map.insert("gal", Unit::Gallon);
        map.insert("ml", Unit::Milliliter);
        map.insert("milliliter", Unit::Milliliter);
        map.insert("milliliters", Unit::Milliliter);
        map.insert("millilitre", Unit::Milliliter);
        map.insert("millilitres", Unit::Milliliter);
        map.insert("l", Unit::Liter);
        map.insert("liter", Unit::Liter);
        map.insert("liters", Unit::Liter);
        map.insert("litre", Unit::Liter);
        map.insert("litres", Unit::Liter);

        // Mass units
        map.insert("g", Unit::Gram);
        map.insert("gram", Unit::Gram);
        map.insert("grams", Unit::Gram);
        map.insert("kg", Unit::Kilogram);
        map.insert("kilogram", Unit::Kilogram);
        map.insert("kilograms", Unit::Kilogram);
        map.insert("oz", Unit::Ounce);
        map.insert("ounce", Unit::Ounce);
        map.insert("ounces", Unit::Ounce);
        map.insert("lb", Unit::Pound);
        map.insert("lbs", Unit::Pound);
        map.insert("pound", Unit::Pound);
        map.insert("pounds", Unit::Pound);

        map
    };

    /// Count nouns that behave like units but stay counts downstream.
    static ref COUNT_NOUNS: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("clove", "clove");
        map.insert("cloves", "clove");
        map.insert("bunch", "bunch");
        map.insert("bunches", "bunch");
        map.insert("head", "head");
        map.insert("heads", "head");
        map.insert("stalk", "stalk");
        map.insert("stalks", "stalk");
        map.insert("sprig", "sprig");
        map.insert("sprigs", "sprig");
        map.insert("slice", "slice");
        map.insert("slices", "slice");
        map.insert("piece", "piece");
        map.insert("pieces", "piece");
        map.insert("stick", "stick");
        map.insert("sticks", "stick");
        map.insert("can", "can");
        map.insert("cans", "can");
        map.insert("whole", "whole");
        map
    };

    static ref MIXED_FRACTION: Regex =
        Regex::new(r"^(\d+)\s+(\d+)\s*[/⁄]\s*(\d+)").expect("valid regex");
    static ref SIMPLE_FRACTION: Regex =
        Regex::new(r"^(\d+)\s*[/⁄]\s*(\d+)").expect("valid regex");
    static ref RANGE: Regex =
        Regex::new(r"^(\d+(?:\.\d+)?)\s*(?:-|–|—|to\s|or\s)\s*(\d+(?:\.\d+)?)").expect("valid regex");
    static ref NUMBER: Regex = Regex::new(r"^(\d+(?:\.\d+)?)").expect("valid regex");
}

/// Ingredient line parser bound to keyword tables and an optional catalog
/// for the state-fallback lookup.
pub struct IngredientParser<'a> {
    keywords: &'a KeywordConfig,
    catalog: Option<&'a IngredientCatalog>,
}

impl<'a> IngredientParser<'a> {
    pub fn new(keywords: &'a KeywordConfig) -> Self {
        Self {
            keywords,
            catalog: None,
        }
    }

    /// Attach a catalog so state classification can fall back to the
    /// catalog-derived alias lookup.
    pub fn with_catalog(mut self, catalog: &'a IngredientCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Parse a raw ingredient line.
    pub fn parse_line(&self, line: &str) -> ParsedIngredient {
        let original = line;
        let line = line.trim();
        if line.is_empty() {
            return ParsedIngredient::empty(original);
        }

        let normalized = normalize_fractions(line);
        let (quantity, rest) = extract_leading_quantity(&normalized);
        let (unit, rest) = extract_unit(rest);

        trace!(
            "Parsed quantity={:?} unit={:?} from '{}'",
            quantity,
            unit,
            line
        );

        self.finish(quantity, unit, rest, original)
    }

    /// Parse pre-split input where quantity/unit/name are already separate.
    /// An unrecognized unit string passes through as [`Unit::Other`].
    pub fn parse_parts(
        &self,
        quantity: Option<f64>,
        unit: Option<&str>,
        name: &str,
    ) -> ParsedIngredient {
        let unit = unit.and_then(|u| {
            let u = u.trim().trim_end_matches('.').to_lowercase();
            if u.is_empty() {
                return None;
            }
            if let Some(known) = UNIT_ALIASES.get(u.as_str()) {
                Some(known.clone())
            } else if let Some(noun) = COUNT_NOUNS.get(u.as_str()) {
                Some(Unit::Count(noun.to_string()))
            } else {
                Some(Unit::Other(u))
            }
        });
        let normalized = normalize_fractions(name);
        self.finish(quantity, unit, &normalized, name)
    }

    /// Classify the remainder tokens and assemble the result.
    fn finish(
        &self,
        quantity: Option<f64>,
        unit: Option<Unit>,
        remainder: &str,
        original: &str,
    ) -> ParsedIngredient {
        let mut remainder = strip_parentheticals(remainder).to_lowercase();
        for phrase in AMBIGUOUS_PHRASES {
            if remainder.contains(phrase) {
                remainder = remainder.replace(phrase, " ");
            }
        }
        let remainder = remainder.replace([',', ';'], " ");

        let mut identity_tokens: Vec<String> = Vec::new();
        let mut preparation_tokens: Vec<String> = Vec::new();
        let mut direct_form: Option<IngredientForm> = None;
        let mut prev_was_identity = false;

        for raw_token in remainder.split_whitespace() {
            let token = raw_token.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '&');
            if token.is_empty() {
                continue;
            }
            // Connectors stay in identity only between identity tokens, so
            // the compound splitter can see "salt and pepper" while
            // "peeled and diced" leaves no dangling connector.
            if matches!(token, "and" | "&" | "plus" | "or" | "with") {
                if prev_was_identity {
                    identity_tokens.push(token.to_string());
                }
                prev_was_identity = false;
                continue;
            }
            if let Some(form) = self.keywords.state_for(token) {
                if direct_form.is_none() {
                    direct_form = Some(form);
                }
                prev_was_identity = false;
                continue;
            }
            if self.keywords.is_preparation(token) {
                preparation_tokens.push(token.to_string());
                prev_was_identity = false;
                continue;
            }
            if self.keywords.is_quality(token) || self.keywords.is_noise(token) {
                prev_was_identity = false;
                continue;
            }
            if token.chars().all(|c| c.is_ascii_digit()) {
                prev_was_identity = false;
                continue;
            }
            identity_tokens.push(token.to_string());
            prev_was_identity = true;
        }

        // A connector left hanging at the end of identity is dropped.
        while identity_tokens
            .last()
            .is_some_and(|t| matches!(t.as_str(), "and" | "&" | "plus" | "or" | "with"))
        {
            identity_tokens.pop();
        }

        let identity_text = if identity_tokens.is_empty() {
            None
        } else {
            Some(identity_tokens.join(" "))
        };

        let form = self.resolve_form(direct_form, identity_text.as_deref());

        debug!(
            "Parsed '{}' -> identity={:?} prep={:?} form={:?}",
            original, identity_text, preparation_tokens, form
        );

        ParsedIngredient {
            quantity,
            unit,
            identity_text,
            preparation_tokens,
            form,
            original_text: original.to_string(),
        }
    }

    /// State resolution: direct keyword, then catalog alias lookup, then
    /// the pantry-staple heuristic.
    fn resolve_form(
        &self,
        direct: Option<IngredientForm>,
        identity: Option<&str>,
    ) -> IngredientForm {
        if let Some(form) = direct {
            return form;
        }
        let Some(identity) = identity else {
            return IngredientForm::Other;
        };
        if let Some(catalog) = self.catalog {
            if let Some(form) = catalog.form_for_text(identity) {
                return form;
            }
        }
        if self.keywords.is_pantry_item(identity) {
            return IngredientForm::Dried;
        }
        IngredientForm::Other
    }
}

/// Expand unicode vulgar fractions into ASCII, keeping "1½" readable as a
/// mixed number ("1 1/2").
fn normalize_fractions(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if let Some((_, ascii)) = VULGAR_FRACTIONS.iter().find(|(c, _)| *c == ch) {
            if out.ends_with(|c: char| c.is_ascii_digit()) {
                out.push(' ');
            }
            out.push_str(ascii);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Remove parenthetical notes like "(about 2 lbs)".
fn strip_parentheticals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Pull a leading quantity expression off the string, returning the value
/// and the rest. Ranges resolve to their midpoint.
fn extract_leading_quantity(text: &str) -> (Option<f64>, &str) {
    let text = text.trim_start();

    if let Some(caps) = MIXED_FRACTION.captures(text) {
        let whole: f64 = caps[1].parse().unwrap_or(0.0);
        let num: f64 = caps[2].parse().unwrap_or(0.0);
        let den: f64 = caps[3].parse().unwrap_or(1.0);
        if den > 0.0 {
            let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            return (Some(whole + num / den), text[end..].trim_start());
        }
    }

    if let Some(caps) = RANGE.captures(text) {
        let min: f64 = caps[1].parse().unwrap_or(0.0);
        let max: f64 = caps[2].parse().unwrap_or(min);
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        return (Some((min + max) / 2.0), text[end..].trim_start());
    }

    if let Some(caps) = SIMPLE_FRACTION.captures(text) {
        let num: f64 = caps[1].parse().unwrap_or(0.0);
        let den: f64 = caps[2].parse().unwrap_or(1.0);
        if den > 0.0 {
            let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            return (Some(num / den), text[end..].trim_start());
        }
    }

    if let Some(caps) = NUMBER.captures(text) {
        let value: f64 = caps[1].parse().unwrap_or(0.0);
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        return (Some(value), text[end..].trim_start());
    }

    (None, text)
}

/// Consume a unit token (or two-token "fl oz" form) if the next word is a
/// known unit or count noun. In free text an unknown word is identity, not
/// a unit.
fn extract_unit(text: &str) -> (Option<Unit>, &str) {
    let text = text.trim_start();
    if text.is_empty() {
        return (None, text);
    }

    // Two-token volume forms first ("fl oz", "fluid ounces").
    for two_word in ["fl oz", "fluid ounce", "fluid ounces"] {
        if let Some(rest) = strip_prefix_word(text, two_word) {
            return (Some(Unit::FluidOunce), rest);
        }
    }

    let word_end = text.find(char::is_whitespace).unwrap_or(text.len());
    let word = text[..word_end].trim_end_matches('.').to_lowercase();

    if let Some(unit) = UNIT_ALIASES.get(word.as_str()) {
        return (Some(unit.clone()), text[word_end..].trim_start());
    }
    if let Some(noun) = COUNT_NOUNS.get(word.as_str()) {
        return (
            Some(Unit::Count(noun.to_string())),
            text[word_end..].trim_start(),
        );
    }

    (None, text)
}

/// Strip a multi-word prefix followed by a word boundary, case-insensitive.
fn strip_prefix_word<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        let rest = &text[prefix.len()..];
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(rest.trim_start());
        }
    }
    None
}
