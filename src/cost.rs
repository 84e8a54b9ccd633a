//! # Cost Calculator
//!
//! Converts canonical quantities into monetary cost using the catalog's
//! pricing metadata. Pricing schemes are tried in priority order:
//! price-per-kilogram, price-per-package (with package-size parsing),
//! then price-per-item with a typical-item-weight fallback chain.
//!
//! Missing pricing data never fails: the cost is zero and a warning is
//! returned as data for the caller to surface.

use crate::catalog::{CatalogIngredient, PackageUnit, Pricing, Process};
use crate::quantity::NormalizedQuantity;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fallback weight when nothing better is known.
const GENERIC_ITEM_GRAMS: f64 = 100.0;

/// Built-in incidental absorption rates as fractions of batch mass.
const OIL_ABSORPTION_RATE: f64 = 0.05;
const BUTTER_ABSORPTION_RATE: f64 = 0.08;
const SALT_ADDITION_RATE: f64 = 0.01;
const DEFAULT_ADDITION_RATE: f64 = 0.02;

lazy_static! {
    /// Typical weights for common count-purchased items, in grams.
    static ref ITEM_WEIGHTS: HashMap<&'static str, f64> = {
        let mut map = HashMap::new();
        map.insert("egg", 50.0);
        map.insert("onion", 150.0);
        map.insert("lemon", 100.0);
        map.insert("lime", 70.0);
        map.insert("garlic", 5.0);
        map.insert("potato", 170.0);
        map.insert("carrot", 60.0);
        map.insert("tomato", 120.0);
        map.insert("apple", 180.0);
        map.insert("avocado", 200.0);
        map
    };

    /// "400" or "400-500"; a range resolves to the larger size.
    static ref PACKAGE_SIZE: Regex =
        Regex::new(r"(\d+(?:\.\d+)?)(?:\s*-\s*(\d+(?:\.\d+)?))?").expect("valid regex");
}

/// A computed cost plus any caller-visible warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostResult {
    pub cost: f64,
    pub warning: Option<String>,
}

impl CostResult {
    fn of(cost: f64) -> Self {
        Self {
            cost,
            warning: None,
        }
    }

    fn zero_with_warning(warning: String) -> Self {
        Self {
            cost: 0.0,
            warning: Some(warning),
        }
    }
}

/// Cost of a given mass of an ingredient.
pub fn cost_for_grams(ingredient: &CatalogIngredient, grams: f64) -> CostResult {
    let Some(pricing) = &ingredient.pricing else {
        warn!("No pricing data for '{}'", ingredient.id);
        return CostResult::zero_with_warning(format!(
            "No pricing data for '{}'",
            ingredient.display_name
        ));
    };

    match pricing {
        Pricing::PerKilogram { price } => CostResult::of(price * grams / 1000.0),
        Pricing::PerPackage {
            price,
            package_size,
            unit,
        } => match grams_per_package(ingredient, package_size, *unit) {
            Some(package_grams) if package_grams > 0.0 => {
                CostResult::of(price / package_grams * grams)
            }
            _ => CostResult::zero_with_warning(format!(
                "Unparseable package size '{}' for '{}'",
                package_size, ingredient.display_name
            )),
        },
        Pricing::PerItem { price, .. } => {
            let item_grams = typical_item_grams(ingredient);
            CostResult::of(price / item_grams * grams)
        }
    }
}

/// Cost of a number of items of a per-item-priced ingredient; other
/// schemes route through an estimated mass.
pub fn cost_for_count(ingredient: &CatalogIngredient, count: f64) -> CostResult {
    match &ingredient.pricing {
        Some(Pricing::PerItem { price, .. }) => CostResult::of(price * count),
        Some(_) => cost_for_grams(ingredient, count * typical_item_grams(ingredient)),
        None => CostResult::zero_with_warning(format!(
            "No pricing data for '{}'",
            ingredient.display_name
        )),
    }
}

/// Cost for a normalized quantity, whichever canonical form it carries.
/// Milliliters are costed at 1 g/ml.
pub fn cost_for_quantity(
    ingredient: &CatalogIngredient,
    quantity: &NormalizedQuantity,
) -> CostResult {
    if let Some(grams) = quantity.normalized_grams {
        return cost_for_grams(ingredient, grams);
    }
    if let Some(ml) = quantity.normalized_milliliters {
        return cost_for_grams(ingredient, ml);
    }
    if quantity.is_count_based() {
        if let Some(count) = quantity.original_quantity {
            return cost_for_count(ingredient, count);
        }
    }
    CostResult::zero_with_warning(format!(
        "No convertible quantity for '{}'",
        ingredient.display_name
    ))
}

/// Estimated mass and cost of an incidental ingredient introduced by a
/// process (e.g. oil absorbed during frying).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentalEstimate {
    pub catalog_id: String,
    pub grams: f64,
    pub cost: f64,
    pub warning: Option<String>,
}

/// Estimate an incidental ingredient's contribution as a fraction of the
/// batch's source mass, using the process's explicit absorption rate when
/// it has one.
pub fn estimate_incidental(
    process: &Process,
    ingredient: &CatalogIngredient,
    batch_grams: f64,
) -> IncidentalEstimate {
    let rate = process
        .absorption_rate
        .unwrap_or_else(|| builtin_addition_rate(ingredient));
    let grams = batch_grams * rate;
    let result = cost_for_grams(ingredient, grams);

    debug!(
        "Incidental '{}' via '{}': {:.1} g at rate {:.2}",
        ingredient.id, process.id, grams, rate
    );

    IncidentalEstimate {
        catalog_id: ingredient.id.clone(),
        grams,
        cost: result.cost,
        warning: result.warning,
    }
}

fn builtin_addition_rate(ingredient: &CatalogIngredient) -> f64 {
    let name = format!(
        "{} {}",
        ingredient.id.to_lowercase(),
        ingredient.display_name.to_lowercase()
    );
    if name.contains("oil") {
        OIL_ABSORPTION_RATE
    } else if name.contains("butter") {
        BUTTER_ABSORPTION_RATE
    } else if name.contains("salt") {
        SALT_ADDITION_RATE
    } else {
        DEFAULT_ADDITION_RATE
    }
}

/// Grams in one package: numeric size × unit factor; "each" packages use
/// the typical item weight.
fn grams_per_package(
    ingredient: &CatalogIngredient,
    package_size: &str,
    unit: PackageUnit,
) -> Option<f64> {
    let caps = PACKAGE_SIZE.captures(package_size)?;
    let first: f64 = caps.get(1)?.as_str().parse().ok()?;
    let size = match caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()) {
        Some(second) => first.max(second),
        None => first,
    };

    let grams = match unit {
        PackageUnit::Kg => size * 1000.0,
        PackageUnit::G => size,
        PackageUnit::Ml => size,
        PackageUnit::L => size * 1000.0,
        PackageUnit::Each => size * typical_item_grams(ingredient),
    };
    Some(grams)
}

/// Typical-item-weight fallback chain: explicit catalog value, density
/// cup weight, built-in table, generic default.
pub(crate) fn typical_item_grams(ingredient: &CatalogIngredient) -> f64 {
    if let Some(Pricing::PerItem {
        typical_item_grams: Some(grams),
        ..
    }) = &ingredient.pricing
    {
        return *grams;
    }
    if let Some(grams_per_cup) = ingredient.density.and_then(|d| d.grams_per_cup) {
        return grams_per_cup;
    }
    let name = format!(
        "{} {}",
        ingredient.id.to_lowercase(),
        ingredient.display_name.to_lowercase()
    );
    for (key, grams) in ITEM_WEIGHTS.iter() {
        if name.contains(key) {
            return *grams;
        }
    }
    GENERIC_ITEM_GRAMS
}
