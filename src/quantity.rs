//! # Quantity Normalizer
//!
//! Converts parsed quantities into canonical grams or milliliters using
//! fixed unit constants and per-ingredient density data, and aggregates
//! occurrences of the same catalog ingredient into shopping-list
//! quantities.
//!
//! Count-based quantities (no unit, or count nouns like "clove") are
//! never converted here; they are preserved as counts for aggregation.
//! Occurrences that contribute neither grams, milliliters, nor a count
//! clear the `has_complete_data` flag, which the shopping formatter
//! surfaces so unresolved items are visibly distinct from zero.

use crate::catalog::CatalogIngredient;
use crate::catalog::CanonicalUnit;
use crate::parser::{ParsedIngredient, Unit};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Grams per mass unit.
pub const GRAMS_PER_OUNCE: f64 = 28.3495;
pub const GRAMS_PER_POUND: f64 = 453.592;
pub const GRAMS_PER_KILOGRAM: f64 = 1000.0;

/// Milliliters per volume unit.
pub const ML_PER_CUP: f64 = 236.588;
pub const ML_PER_TBSP: f64 = 14.787;
pub const ML_PER_TSP: f64 = 4.929;
pub const ML_PER_FL_OZ: f64 = 29.5735;
pub const ML_PER_PINT: f64 = 473.176;
pub const ML_PER_QUART: f64 = 946.353;
pub const ML_PER_GALLON: f64 = 3785.41;
pub const ML_PER_LITER: f64 = 1000.0;

/// Cup equivalents for the density fallback.
pub const CUPS_PER_TBSP: f64 = 1.0 / 16.0;
pub const CUPS_PER_TSP: f64 = 1.0 / 48.0;

/// A quantity converted to canonical units.
///
/// At most one of `normalized_grams` / `normalized_milliliters` is
/// authoritative for a given ingredient; both are `None` when no unit or
/// density was resolvable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuantity {
    pub original_quantity: Option<f64>,
    pub original_unit: Option<Unit>,
    pub normalized_grams: Option<f64>,
    pub normalized_milliliters: Option<f64>,
}

impl NormalizedQuantity {
    fn unconverted(parsed: &ParsedIngredient) -> Self {
        Self {
            original_quantity: parsed.quantity,
            original_unit: parsed.unit.clone(),
            normalized_grams: None,
            normalized_milliliters: None,
        }
    }

    /// Whether this occurrence is count-based (no unit or a count noun).
    /// A count noun without a number contributes nothing countable.
    pub fn is_count_based(&self) -> bool {
        if self.original_quantity.is_none() {
            return false;
        }
        match &self.original_unit {
            None => true,
            Some(unit) => unit.is_count(),
        }
    }
}

/// Convert a parsed quantity to canonical grams or milliliters.
///
/// `ingredient` is the matched catalog entry, needed for density-based
/// conversion of recipe-volume units; pass `None` when unmatched.
pub fn normalize(
    parsed: &ParsedIngredient,
    ingredient: Option<&CatalogIngredient>,
) -> NormalizedQuantity {
    let mut normalized = NormalizedQuantity::unconverted(parsed);
    let Some(quantity) = parsed.quantity else {
        return normalized;
    };
    let Some(unit) = &parsed.unit else {
        // Count-based: preserved for aggregation, not converted.
        return normalized;
    };

    match unit {
        Unit::Gram => normalized.normalized_grams = Some(quantity),
        Unit::Kilogram => normalized.normalized_grams = Some(quantity * GRAMS_PER_KILOGRAM),
        Unit::Ounce => normalized.normalized_grams = Some(quantity * GRAMS_PER_OUNCE),
        Unit::Pound => normalized.normalized_grams = Some(quantity * GRAMS_PER_POUND),

        Unit::Milliliter => normalized.normalized_milliliters = Some(quantity),
        Unit::Liter => normalized.normalized_milliliters = Some(quantity * ML_PER_LITER),
        Unit::FluidOunce => normalized.normalized_milliliters = Some(quantity * ML_PER_FL_OZ),
        Unit::Pint => normalized.normalized_milliliters = Some(quantity * ML_PER_PINT),
        Unit::Quart => normalized.normalized_milliliters = Some(quantity * ML_PER_QUART),
        Unit::Gallon => normalized.normalized_milliliters = Some(quantity * ML_PER_GALLON),

        Unit::Cup | Unit::Tablespoon | Unit::Teaspoon => {
            convert_recipe_volume(quantity, unit, ingredient, &mut normalized);
        }

        Unit::Count(_) => {}
        Unit::Other(text) => {
            warn!(
                "Unconvertible unit '{}' for '{}'; preserving original quantity",
                text, parsed.original_text
            );
        }
    }

    normalized
}

/// Cup/tbsp/tsp conversion: unit-specific density first, then the
/// cup-equivalent fallback, then milliliters for volume-canonical
/// ingredients, else nothing.
fn convert_recipe_volume(
    quantity: f64,
    unit: &Unit,
    ingredient: Option<&CatalogIngredient>,
    normalized: &mut NormalizedQuantity,
) {
    if let Some(ingredient) = ingredient {
        if let Some(density) = &ingredient.density {
            let per_unit = match unit {
                Unit::Cup => density.grams_per_cup,
                Unit::Tablespoon => density.grams_per_tbsp,
                Unit::Teaspoon => density.grams_per_tsp,
                _ => None,
            };
            if let Some(grams_per_unit) = per_unit {
                normalized.normalized_grams = Some(quantity * grams_per_unit);
                return;
            }
            // Fall back to the cup-equivalent when only that is known.
            if let Some(grams_per_cup) = density.grams_per_cup {
                let cups = match unit {
                    Unit::Cup => quantity,
                    Unit::Tablespoon => quantity * CUPS_PER_TBSP,
                    Unit::Teaspoon => quantity * CUPS_PER_TSP,
                    _ => unreachable!(),
                };
                normalized.normalized_grams = Some(cups * grams_per_cup);
                return;
            }
        }

        if ingredient.canonical_unit == CanonicalUnit::Volume {
            let ml_per_unit = match unit {
                Unit::Cup => ML_PER_CUP,
                Unit::Tablespoon => ML_PER_TBSP,
                Unit::Teaspoon => ML_PER_TSP,
                _ => unreachable!(),
            };
            normalized.normalized_milliliters = Some(quantity * ml_per_unit);
            return;
        }

        warn!(
            "No density data for '{}'; cannot convert {} {}",
            ingredient.id,
            quantity,
            unit.display_name()
        );
    }
}

/// One shopping-list entry: all occurrences of a catalog ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub catalog_id: String,
    pub display_name: String,
    pub total_grams: Option<f64>,
    pub total_milliliters: Option<f64>,
    pub total_count: Option<f64>,
    /// False when any occurrence contributed neither grams, milliliters,
    /// nor a count.
    pub has_complete_data: bool,
    pub occurrences: usize,
}

impl ShoppingItem {
    fn new(catalog_id: &str, display_name: &str) -> Self {
        Self {
            catalog_id: catalog_id.to_string(),
            display_name: display_name.to_string(),
            total_grams: None,
            total_milliliters: None,
            total_count: None,
            has_complete_data: true,
            occurrences: 0,
        }
    }

    fn add_occurrence(&mut self, quantity: &NormalizedQuantity) {
        self.occurrences += 1;
        if let Some(grams) = quantity.normalized_grams {
            self.total_grams = Some(self.total_grams.unwrap_or(0.0) + grams);
        } else if let Some(ml) = quantity.normalized_milliliters {
            self.total_milliliters = Some(self.total_milliliters.unwrap_or(0.0) + ml);
        } else if quantity.is_count_based() {
            let count = quantity.original_quantity.unwrap_or(0.0);
            self.total_count = Some(self.total_count.unwrap_or(0.0) + count);
        } else {
            self.has_complete_data = false;
        }
    }

    /// Render one shopping line: grams first, then milliliters, then a
    /// count; unresolved items are visibly marked.
    pub fn format_line(&self) -> String {
        let quantity = if let Some(grams) = self.total_grams {
            format!("{:.0} g", grams)
        } else if let Some(ml) = self.total_milliliters {
            format!("{:.0} ml", ml)
        } else if let Some(count) = self.total_count {
            format!("{} ×", trim_number(count))
        } else {
            "?".to_string()
        };

        if self.has_complete_data {
            format!("{} {}", quantity, self.display_name)
        } else {
            format!("{} {} (needs review)", quantity, self.display_name)
        }
    }
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

/// Shopping-list aggregator keyed by catalog id.
#[derive(Debug, Clone, Default)]
pub struct ShoppingList {
    items: HashMap<String, ShoppingItem>,
}

impl ShoppingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one normalized occurrence into the list.
    pub fn add(&mut self, catalog_id: &str, display_name: &str, quantity: &NormalizedQuantity) {
        let item = self
            .items
            .entry(catalog_id.to_string())
            .or_insert_with(|| ShoppingItem::new(catalog_id, display_name));
        item.add_occurrence(quantity);
        debug!(
            "Shopping list: {} now {} occurrence(s)",
            catalog_id, item.occurrences
        );
    }

    pub fn get(&self, catalog_id: &str) -> Option<&ShoppingItem> {
        self.items.get(catalog_id)
    }

    /// Items sorted by display name for stable output.
    pub fn items(&self) -> Vec<&ShoppingItem> {
        let mut items: Vec<&ShoppingItem> = self.items.values().collect();
        items.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CanonicalUnit, CatalogIngredient, Density};
    use crate::keywords::KeywordConfig;
    use crate::parser::IngredientParser;

    fn onion() -> CatalogIngredient {
        CatalogIngredient::new("onion", "Onion", CanonicalUnit::Mass).with_density(Density {
            grams_per_cup: Some(160.0),
            grams_per_tbsp: Some(10.0),
            grams_per_tsp: None,
        })
    }

    fn parse(line: &str) -> ParsedIngredient {
        let keywords = KeywordConfig::default();
        IngredientParser::new(&keywords).parse_line(line)
    }

    #[test]
    fn test_density_round_trip() {
        let onion = onion();
        let one_cup = normalize(&parse("1 cup onion"), Some(&onion));
        assert_eq!(one_cup.normalized_grams, Some(160.0));
        let two_cups = normalize(&parse("2 cups onion"), Some(&onion));
        assert_eq!(two_cups.normalized_grams, Some(320.0));
    }

    #[test]
    fn test_tbsp_specific_density() {
        let onion = onion();
        let result = normalize(&parse("3 tbsp onion"), Some(&onion));
        assert_eq!(result.normalized_grams, Some(30.0));
    }

    #[test]
    fn test_tsp_cup_equivalent_fallback() {
        // No grams_per_tsp; falls back through the cup equivalent.
        let onion = onion();
        let result = normalize(&parse("48 tsp onion"), Some(&onion));
        let grams = result.normalized_grams.unwrap();
        assert!((grams - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_direct_mass_units() {
        let result = normalize(&parse("2 kg potatoes"), None);
        assert_eq!(result.normalized_grams, Some(2000.0));
        let result = normalize(&parse("1 lb butter"), None);
        assert_eq!(result.normalized_grams, Some(GRAMS_PER_POUND));
    }

    #[test]
    fn test_direct_volume_units() {
        let result = normalize(&parse("500 ml stock"), None);
        assert_eq!(result.normalized_milliliters, Some(500.0));
        assert_eq!(result.normalized_grams, None);
        let result = normalize(&parse("2 l water"), None);
        assert_eq!(result.normalized_milliliters, Some(2000.0));
    }

    #[test]
    fn test_volume_canonical_without_density() {
        let stock = CatalogIngredient::new("stock", "Chicken Stock", CanonicalUnit::Volume);
        let result = normalize(&parse("1 cup stock"), Some(&stock));
        assert_eq!(result.normalized_milliliters, Some(ML_PER_CUP));
        assert_eq!(result.normalized_grams, None);
    }

    #[test]
    fn test_count_preserved_not_converted() {
        let result = normalize(&parse("3 eggs"), None);
        assert_eq!(result.normalized_grams, None);
        assert_eq!(result.normalized_milliliters, None);
        assert!(result.is_count_based());
        assert_eq!(result.original_quantity, Some(3.0));

        let result = normalize(&parse("2 cloves garlic"), None);
        assert!(result.is_count_based());
    }

    #[test]
    fn test_cup_without_density_left_null() {
        let mystery = CatalogIngredient::new("mystery", "Mystery", CanonicalUnit::Mass);
        let result = normalize(&parse("1 cup mystery"), Some(&mystery));
        assert_eq!(result.normalized_grams, None);
        assert_eq!(result.normalized_milliliters, None);
        // Original preserved for manual reconciliation.
        assert_eq!(result.original_quantity, Some(1.0));
        assert_eq!(result.original_unit, Some(Unit::Cup));
    }

    #[test]
    fn test_shopping_aggregation_same_id() {
        let onion = onion();
        let mut list = ShoppingList::new();
        list.add(
            "onion",
            "Onion",
            &normalize(&parse("2 cups diced onion"), Some(&onion)),
        );
        list.add(
            "onion",
            "Onion",
            &normalize(&parse("3 tbsp minced onion"), Some(&onion)),
        );

        let item = list.get("onion").unwrap();
        assert_eq!(item.occurrences, 2);
        assert_eq!(item.total_grams, Some(350.0));
        assert!(item.has_complete_data);
        assert_eq!(item.format_line(), "350 g Onion");
    }

    #[test]
    fn test_incomplete_data_flag_propagates() {
        let mystery = CatalogIngredient::new("mystery", "Mystery Spice", CanonicalUnit::Mass);
        let mut list = ShoppingList::new();
        list.add(
            "mystery",
            "Mystery Spice",
            &normalize(&parse("1 cup mystery spice"), Some(&mystery)),
        );

        let item = list.get("mystery").unwrap();
        assert!(!item.has_complete_data);
        assert!(item.format_line().contains("needs review"));
    }

    #[test]
    fn test_count_unit_without_quantity_needs_review() {
        // "cloves garlic, to taste": a count noun but no number.
        let keywords = KeywordConfig::default();
        let parsed = IngredientParser::new(&keywords).parse_parts(None, Some("cloves"), "garlic");
        let normalized = normalize(&parsed, None);
        assert!(!normalized.is_count_based());

        let mut list = ShoppingList::new();
        list.add("garlic", "Garlic", &normalized);
        let item = list.get("garlic").unwrap();
        assert_eq!(item.total_count, None);
        assert!(!item.has_complete_data);
        assert!(item.format_line().contains("needs review"));
    }

    #[test]
    fn test_count_aggregation() {
        let mut list = ShoppingList::new();
        list.add("lemon", "Lemon", &normalize(&parse("2 lemons"), None));
        list.add("lemon", "Lemon", &normalize(&parse("1 lemon"), None));
        let item = list.get("lemon").unwrap();
        assert_eq!(item.total_count, Some(3.0));
        assert_eq!(item.format_line(), "3 × Lemon");
    }
}
