//! # Ingredient and Process Catalogs
//!
//! This module defines the immutable reference data the engine runs
//! against: catalog ingredients (identity, density, pricing, nutrition)
//! and cooking processes (yield factors, incidental ingredients,
//! prep-ahead metadata).
//!
//! Catalogs are loaded wholesale at startup and treated as read-only for
//! the duration of a run. `IngredientCatalog` builds a lowercase
//! alias → id index once at load time so exact resolution is a hash
//! lookup; only the deliberate fuzzy-match fallback scans the whole
//! catalog.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Retail form of a product, distinct from its preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IngredientForm {
    Fresh,
    Frozen,
    Canned,
    Dried,
    #[default]
    Other,
}

/// The unit class an ingredient is canonically measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalUnit {
    Mass,
    Volume,
    Count,
}

/// Per-ingredient density data for volume-to-mass conversion.
///
/// Stored as grams per US customary measure, the convention used by most
/// published density tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Density {
    /// Grams per US cup (236.588 ml).
    pub grams_per_cup: Option<f64>,
    /// Grams per tablespoon.
    pub grams_per_tbsp: Option<f64>,
    /// Grams per teaspoon.
    pub grams_per_tsp: Option<f64>,
}

/// Nutrition facts, either per 100 canonical units (catalog data) or as an
/// absolute total (aggregated data).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Nutrition {
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    pub fiber_g: f64,
    pub sugar_g: f64,
    pub sodium_mg: f64,
}

impl Nutrition {
    /// Scale every field by a factor.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein_g: self.protein_g * factor,
            fat_g: self.fat_g * factor,
            carbs_g: self.carbs_g * factor,
            fiber_g: self.fiber_g * factor,
            sugar_g: self.sugar_g * factor,
            sodium_mg: self.sodium_mg * factor,
        }
    }

    /// Add another nutrition total into this one.
    pub fn accumulate(&mut self, other: &Nutrition) {
        self.calories += other.calories;
        self.protein_g += other.protein_g;
        self.fat_g += other.fat_g;
        self.carbs_g += other.carbs_g;
        self.fiber_g += other.fiber_g;
        self.sugar_g += other.sugar_g;
        self.sodium_mg += other.sodium_mg;
    }
}

/// The unit a package size is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageUnit {
    Kg,
    G,
    Ml,
    L,
    Each,
}

/// Pricing metadata, one scheme per ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum Pricing {
    /// Price for one kilogram.
    PerKilogram { price: f64 },
    /// Price for one retail package of a given size.
    PerPackage {
        price: f64,
        /// Size string as printed on the package, e.g. "500" or "400-500".
        package_size: String,
        unit: PackageUnit,
    },
    /// Price for one item (e.g. one lemon), with an optional typical weight.
    PerItem {
        price: f64,
        typical_item_grams: Option<f64>,
    },
}

/// One immutable catalog ingredient record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogIngredient {
    /// Stable, globally unique key. Never reused once indexed.
    pub id: String,
    pub display_name: String,
    pub canonical_unit: CanonicalUnit,
    #[serde(default)]
    pub form: IngredientForm,
    /// Alternative names, case-insensitive. Unique within this record;
    /// overlaps across records are resolved by match confidence.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub density: Option<Density>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub nutrition_per_100: Option<Nutrition>,
    /// Optional regex used by the enhanced matcher's pattern fallback.
    #[serde(default)]
    pub match_pattern: Option<String>,
}

impl CatalogIngredient {
    /// Create a minimal record; builder methods fill in the rest.
    pub fn new(id: &str, display_name: &str, canonical_unit: CanonicalUnit) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            canonical_unit,
            form: IngredientForm::Other,
            aliases: Vec::new(),
            density: None,
            pricing: None,
            nutrition_per_100: None,
            match_pattern: None,
        }
    }

    pub fn with_form(mut self, form: IngredientForm) -> Self {
        self.form = form;
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_density(mut self, density: Density) -> Self {
        self.density = Some(density);
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn with_nutrition(mut self, nutrition: Nutrition) -> Self {
        self.nutrition_per_100 = Some(nutrition);
        self
    }

    pub fn with_match_pattern(mut self, pattern: &str) -> Self {
        self.match_pattern = Some(pattern.to_string());
        self
    }
}

/// Broad category of a cooking process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessCategory {
    Prep,
    Cook,
    Other,
}

impl ProcessCategory {
    /// Duration assumed for a process application with no explicit duration
    /// and no per-process default.
    pub fn default_duration_minutes(&self) -> f64 {
        match self {
            ProcessCategory::Prep => 5.0,
            ProcessCategory::Cook => 15.0,
            ProcessCategory::Other => 5.0,
        }
    }
}

/// Where a stored component should be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    Refrigerator,
    Freezer,
    Pantry,
}

/// Whether and how long a process's output can be made ahead and stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepAhead {
    pub can_store: bool,
    pub shelf_life_hours: Option<f64>,
    pub storage: Option<StorageLocation>,
}

/// One immutable cooking-process record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: String,
    pub display_name: String,
    pub category: ProcessCategory,
    /// Fraction of input mass retained, in (0, 1].
    pub yield_factor: f64,
    /// Ingredient-specific yield overrides, keyed by catalog ingredient id.
    #[serde(default)]
    pub yield_factor_overrides: HashMap<String, f64>,
    /// Catalog ids of incidental ingredients this process introduces.
    #[serde(default)]
    pub additional_ingredients: Vec<String>,
    #[serde(default)]
    pub prep_ahead: Option<PrepAhead>,
    /// Method tag describing how cooking affects nutrient density.
    /// Carried through but not computed here.
    #[serde(default)]
    pub nutrition_multiplier_ref: Option<String>,
    /// Default duration when the process graph gives none.
    #[serde(default)]
    pub default_duration_minutes: Option<f64>,
    /// Explicit absorption rate for incidental ingredients, as a fraction
    /// of batch source mass. Overrides the built-in percentages.
    #[serde(default)]
    pub absorption_rate: Option<f64>,
}

impl Process {
    pub fn new(id: &str, display_name: &str, category: ProcessCategory, yield_factor: f64) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            category,
            yield_factor,
            yield_factor_overrides: HashMap::new(),
            additional_ingredients: Vec::new(),
            prep_ahead: None,
            nutrition_multiplier_ref: None,
            default_duration_minutes: None,
            absorption_rate: None,
        }
    }

    pub fn with_yield_override(mut self, ingredient_id: &str, factor: f64) -> Self {
        self.yield_factor_overrides
            .insert(ingredient_id.to_string(), factor);
        self
    }

    pub fn with_additional_ingredient(mut self, ingredient_id: &str) -> Self {
        self.additional_ingredients.push(ingredient_id.to_string());
        self
    }

    pub fn with_prep_ahead(mut self, prep_ahead: PrepAhead) -> Self {
        self.prep_ahead = Some(prep_ahead);
        self
    }

    pub fn with_default_duration(mut self, minutes: f64) -> Self {
        self.default_duration_minutes = Some(minutes);
        self
    }

    /// Yield factor for a specific ingredient, honoring overrides.
    pub fn yield_factor_for(&self, ingredient_id: &str) -> f64 {
        self.yield_factor_overrides
            .get(ingredient_id)
            .copied()
            .unwrap_or(self.yield_factor)
    }

    /// Duration estimate used when the process graph gives none.
    pub fn estimated_duration_minutes(&self) -> f64 {
        self.default_duration_minutes
            .unwrap_or_else(|| self.category.default_duration_minutes())
    }
}

/// Errors raised while loading or indexing catalog data.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    InvalidJson(String),
    DuplicateId(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::InvalidJson(msg) => write!(f, "Invalid catalog JSON: {}", msg),
            CatalogError::DuplicateId(id) => write!(f, "Duplicate catalog id: {}", id),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Read-only ingredient catalog with a precomputed alias index.
#[derive(Debug, Clone, Default)]
pub struct IngredientCatalog {
    ingredients: HashMap<String, CatalogIngredient>,
    /// Lowercased alias / display name / id → ingredient id.
    alias_index: HashMap<String, String>,
}

impl IngredientCatalog {
    /// Build a catalog from records, indexing every id, display name, and
    /// alias (lowercased). Duplicate ids are rejected; alias collisions
    /// across ingredients keep the first indexed entry and log a warning,
    /// since ties are resolved by match confidence, not uniqueness.
    pub fn from_records(records: Vec<CatalogIngredient>) -> Result<Self, CatalogError> {
        let mut ingredients = HashMap::new();
        let mut alias_index = HashMap::new();

        for record in records {
            if ingredients.contains_key(&record.id) {
                return Err(CatalogError::DuplicateId(record.id));
            }

            let mut seen_within = HashSet::new();
            let mut keys = vec![record.id.clone(), record.display_name.clone()];
            keys.extend(record.aliases.iter().cloned());

            for key in keys {
                let key = key.trim().to_lowercase();
                if key.is_empty() || !seen_within.insert(key.clone()) {
                    continue;
                }
                if let Some(existing) = alias_index.get(&key) {
                    if existing != &record.id {
                        warn!(
                            "Alias '{}' maps to both '{}' and '{}'; keeping first",
                            key, existing, record.id
                        );
                    }
                    continue;
                }
                alias_index.insert(key, record.id.clone());
            }

            ingredients.insert(record.id.clone(), record);
        }

        debug!(
            "Indexed {} ingredients with {} alias keys",
            ingredients.len(),
            alias_index.len()
        );

        Ok(Self {
            ingredients,
            alias_index,
        })
    }

    /// Load a catalog from a JSON array of ingredient records.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let records: Vec<CatalogIngredient> =
            serde_json::from_str(json).map_err(|e| CatalogError::InvalidJson(e.to_string()))?;
        Self::from_records(records)
    }

    /// Get an ingredient by its id.
    pub fn get(&self, id: &str) -> Option<&CatalogIngredient> {
        self.ingredients.get(id)
    }

    /// Resolve an exact (lowercased) id, display name, or alias.
    pub fn resolve_exact(&self, text: &str) -> Option<&CatalogIngredient> {
        let key = text.trim().to_lowercase();
        self.alias_index
            .get(&key)
            .and_then(|id| self.ingredients.get(id))
    }

    /// Retail form implied by an exact alias hit, used as the parser's
    /// catalog-derived state fallback.
    pub fn form_for_text(&self, text: &str) -> Option<IngredientForm> {
        self.resolve_exact(text).map(|i| i.form)
    }

    /// Iterate over all ingredients (fuzzy-match fallback only).
    pub fn iter(&self) -> impl Iterator<Item = &CatalogIngredient> {
        self.ingredients.values()
    }

    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }
}

/// Read-only process catalog.
#[derive(Debug, Clone, Default)]
pub struct ProcessCatalog {
    processes: HashMap<String, Process>,
}

impl ProcessCatalog {
    pub fn from_records(records: Vec<Process>) -> Result<Self, CatalogError> {
        let mut processes = HashMap::new();
        for record in records {
            if processes.contains_key(&record.id) {
                return Err(CatalogError::DuplicateId(record.id));
            }
            processes.insert(record.id.clone(), record);
        }
        Ok(Self { processes })
    }

    /// Load a process catalog from a JSON array of process records.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let records: Vec<Process> =
            serde_json::from_str(json).map_err(|e| CatalogError::InvalidJson(e.to_string()))?;
        Self::from_records(records)
    }

    pub fn get(&self, id: &str) -> Option<&Process> {
        self.processes.get(id)
    }

    /// All known process ids, for "did you mean" suggestions.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.processes.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn onion() -> CatalogIngredient {
        CatalogIngredient::new("onion", "Onion", CanonicalUnit::Mass)
            .with_form(IngredientForm::Fresh)
            .with_aliases(&["yellow onion", "brown onion"])
            .with_density(Density {
                grams_per_cup: Some(160.0),
                grams_per_tbsp: Some(10.0),
                grams_per_tsp: None,
            })
    }

    #[test]
    fn test_alias_index_resolution() {
        let catalog = IngredientCatalog::from_records(vec![onion()]).unwrap();
        assert_eq!(catalog.resolve_exact("onion").unwrap().id, "onion");
        assert_eq!(catalog.resolve_exact("Yellow Onion").unwrap().id, "onion");
        assert_eq!(catalog.resolve_exact("  BROWN ONION ").unwrap().id, "onion");
        assert!(catalog.resolve_exact("shallot").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = IngredientCatalog::from_records(vec![onion(), onion()]);
        assert_eq!(result.unwrap_err(), CatalogError::DuplicateId("onion".to_string()));
    }

    #[test]
    fn test_form_lookup_from_alias() {
        let catalog = IngredientCatalog::from_records(vec![onion()]).unwrap();
        assert_eq!(catalog.form_for_text("yellow onion"), Some(IngredientForm::Fresh));
        assert_eq!(catalog.form_for_text("unknown thing"), None);
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"[
            {
                "id": "flour",
                "display_name": "All-Purpose Flour",
                "canonical_unit": "mass",
                "form": "dried",
                "aliases": ["ap flour", "plain flour"],
                "density": { "grams_per_cup": 120.0, "grams_per_tbsp": 7.5, "grams_per_tsp": 2.5 },
                "pricing": { "scheme": "per_package", "price": 2.49, "package_size": "1000", "unit": "g" },
                "nutrition_per_100": {
                    "calories": 364.0, "protein_g": 10.3, "fat_g": 1.0,
                    "carbs_g": 76.3, "fiber_g": 2.7, "sugar_g": 0.3, "sodium_mg": 2.0
                }
            }
        ]"#;
        let catalog = IngredientCatalog::from_json(json).unwrap();
        let flour = catalog.resolve_exact("plain flour").unwrap();
        assert_eq!(flour.id, "flour");
        assert_eq!(flour.form, IngredientForm::Dried);
        assert_eq!(flour.density.unwrap().grams_per_cup, Some(120.0));
    }

    #[test]
    fn test_process_yield_override() {
        let dice = Process::new("dice", "Dice", ProcessCategory::Prep, 0.95)
            .with_yield_override("onion", 0.9);
        assert_eq!(dice.yield_factor_for("onion"), 0.9);
        assert_eq!(dice.yield_factor_for("carrot"), 0.95);
    }

    #[test]
    fn test_process_duration_defaults() {
        let saute = Process::new("saute", "Sauté", ProcessCategory::Cook, 0.8);
        assert_eq!(saute.estimated_duration_minutes(), 15.0);
        let saute = saute.with_default_duration(8.0);
        assert_eq!(saute.estimated_duration_minutes(), 8.0);
    }
}
