//! # Recipe Pipeline
//!
//! The per-recipe entry point: parse raw ingredient lines, resolve
//! identities against the catalog, normalize quantities, cost everything,
//! seed the ingredient-state table, walk the process graph, and roll up
//! metrics and diagnostics.
//!
//! The pipeline never fails a recipe over one bad ingredient or process
//! id: failures are isolated to the offending item and surfaced as
//! structured warnings for a human reviewer.

use crate::catalog::{IngredientCatalog, ProcessCatalog};
use crate::components::{
    compute_metrics, Component, ComponentGenerator, GenerationWarning, IngredientState,
    IngredientStateTable, RecipeMetrics,
};
use crate::cost::{cost_for_quantity, typical_item_grams};
use crate::keywords::KeywordConfig;
use crate::matcher::{IdentityMatcher, MatchStatus, ResolvedMatch};
use crate::parser::{IngredientParser, ParsedIngredient};
use crate::process_graph::{validate_graph, GraphWarning, ProcessGraph};
use crate::quantity::{normalize, NormalizedQuantity, ShoppingItem, ShoppingList};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Confidence below which a match is flagged for review.
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// One raw recipe ingredient as received from upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIngredient {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// A full recipe handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeInput {
    pub title: String,
    #[serde(default = "default_servings")]
    pub servings: u32,
    pub ingredients: Vec<RawIngredient>,
    pub process_graph: ProcessGraph,
}

fn default_servings() -> u32 {
    1
}

impl RecipeInput {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One matched catalog entry behind a raw line (compounds yield several).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub catalog_id: String,
    pub confidence: f64,
    pub normalized: NormalizedQuantity,
    pub cost: f64,
}

/// Full resolution of one raw ingredient line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLine {
    pub raw_name: String,
    pub parsed: ParsedIngredient,
    pub resolution: ResolvedMatch,
    pub entries: Vec<ResolvedEntry>,
    pub needs_review: bool,
}

/// A structured, non-fatal problem surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    UnresolvedIdentity { identity: String },
    UnconvertibleUnit { ingredient: String, unit: String },
    MissingPricing { ingredient: String, detail: String },
    Graph(GraphWarning),
    Generation(GenerationWarning),
}

/// Match-quality counters plus all collected warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecipeDiagnostics {
    pub matched: usize,
    pub unmatched: usize,
    pub low_confidence: usize,
    pub warnings: Vec<PipelineWarning>,
}

/// Everything the engine produces for one recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeReport {
    pub title: String,
    pub lines: Vec<ResolvedLine>,
    pub shopping_items: Vec<ShoppingItem>,
    pub components: Vec<Component>,
    pub metrics: RecipeMetrics,
    pub diagnostics: RecipeDiagnostics,
}

impl RecipeReport {
    /// Human-readable summary for review output.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Recipe: {}\n", self.title));
        out.push_str(&format!(
            "  matched {} / unmatched {} / low-confidence {}\n",
            self.diagnostics.matched, self.diagnostics.unmatched, self.diagnostics.low_confidence
        ));
        out.push_str(&format!(
            "  total cost {:.2} ({:.2} per serving), prep {:.0} min\n",
            self.metrics.total_cost,
            self.metrics.cost_per_serving,
            self.metrics.total_prep_time_minutes
        ));
        for component in &self.components {
            out.push_str(&format!(
                "  component '{}': {:.0} g, cost {:.2}{}\n",
                component.name,
                component.output_quantity_grams,
                component.calculated_cost,
                if component.reusable { " (reusable)" } else { "" }
            ));
        }
        out.push_str("Shopping list:\n");
        for item in &self.shopping_items {
            out.push_str(&format!("  - {}\n", item.format_line()));
        }
        if !self.diagnostics.warnings.is_empty() {
            out.push_str(&format!(
                "Warnings: {}\n",
                self.diagnostics.warnings.len()
            ));
        }
        out
    }
}

/// The synchronous per-recipe pipeline, bound to shared read-only
/// catalogs and keyword tables.
pub struct RecipePipeline<'a> {
    ingredients: &'a IngredientCatalog,
    processes: &'a ProcessCatalog,
    keywords: &'a KeywordConfig,
    use_patterns: bool,
}

impl<'a> RecipePipeline<'a> {
    pub fn new(
        ingredients: &'a IngredientCatalog,
        processes: &'a ProcessCatalog,
        keywords: &'a KeywordConfig,
    ) -> Self {
        Self {
            ingredients,
            processes,
            keywords,
            use_patterns: false,
        }
    }

    /// Enable the matcher's regex pattern-fallback stage.
    pub fn with_patterns(mut self) -> Self {
        self.use_patterns = true;
        self
    }

    /// Run the full pipeline for one recipe. Always returns a report;
    /// per-item failures become diagnostics, never errors.
    pub fn run(&self, recipe: &RecipeInput) -> RecipeReport {
        info!(
            "Running pipeline for '{}' ({} ingredients, {} steps)",
            recipe.title,
            recipe.ingredients.len(),
            recipe.process_graph.process_steps.len()
        );

        let parser = IngredientParser::new(self.keywords).with_catalog(self.ingredients);
        let matcher = if self.use_patterns {
            IdentityMatcher::new(self.ingredients, self.keywords).with_patterns()
        } else {
            IdentityMatcher::new(self.ingredients, self.keywords)
        };

        let mut diagnostics = RecipeDiagnostics::default();
        let mut lines: Vec<ResolvedLine> = Vec::new();
        let mut shopping = ShoppingList::new();
        let mut table = IngredientStateTable::new();

        for raw in &recipe.ingredients {
            let line = self.resolve_line(raw, &parser, &matcher, &mut diagnostics);

            for (index, entry) in line.entries.iter().enumerate() {
                if let Some(ingredient) = self.ingredients.get(&entry.catalog_id) {
                    shopping.add(&entry.catalog_id, &ingredient.display_name, &entry.normalized);

                    // The first entry owns the raw name so the process
                    // graph can reference it; compound extras get
                    // derived keys and still count toward totals.
                    let key = if index == 0 {
                        raw.name.clone()
                    } else {
                        format!("{}#{}", raw.name, entry.catalog_id)
                    };
                    // A key already held by a different catalog match gets
                    // a derived key too; same-match repeats ("... divided"
                    // across lines) fold into one state.
                    let key = match table.get(&key) {
                        Some(existing) if existing.catalog_id != entry.catalog_id => {
                            format!("{}#{}", raw.name, entry.catalog_id)
                        }
                        _ => key,
                    };
                    let grams = state_grams(&entry.normalized, ingredient);
                    let nutrition = ingredient
                        .nutrition_per_100
                        .map(|n| n.scaled(grams / 100.0))
                        .unwrap_or_default();
                    table.accumulate(
                        &key,
                        IngredientState::new(&entry.catalog_id, grams, entry.cost, nutrition),
                    );
                }
            }

            lines.push(line);
        }

        let known_names: Vec<String> = recipe.ingredients.iter().map(|i| i.name.clone()).collect();
        for warning in validate_graph(&recipe.process_graph, self.processes, &known_names) {
            diagnostics.warnings.push(PipelineWarning::Graph(warning));
        }

        let generator = ComponentGenerator::new(self.processes, self.ingredients);
        let outcome = generator.run(&recipe.process_graph, &mut table);
        for warning in &outcome.warnings {
            diagnostics
                .warnings
                .push(PipelineWarning::Generation(warning.clone()));
        }

        let metrics = compute_metrics(&table, &outcome, recipe.servings);

        RecipeReport {
            title: recipe.title.clone(),
            lines,
            shopping_items: shopping.items().into_iter().cloned().collect(),
            components: outcome.components,
            metrics,
            diagnostics,
        }
    }

    /// Parse and match one raw line, producing costed entries and
    /// updating the match counters.
    fn resolve_line(
        &self,
        raw: &RawIngredient,
        parser: &IngredientParser<'_>,
        matcher: &IdentityMatcher<'_>,
        diagnostics: &mut RecipeDiagnostics,
    ) -> ResolvedLine {
        let parsed = if raw.quantity.is_some() || raw.unit.is_some() {
            parser.parse_parts(raw.quantity, raw.unit.as_deref(), &raw.name)
        } else {
            parser.parse_line(&raw.name)
        };

        let Some(identity) = parsed.identity_text.clone() else {
            diagnostics.unmatched += 1;
            diagnostics
                .warnings
                .push(PipelineWarning::UnresolvedIdentity {
                    identity: raw.name.clone(),
                });
            return ResolvedLine {
                raw_name: raw.name.clone(),
                parsed,
                resolution: ResolvedMatch {
                    status: MatchStatus::Unknown,
                    result: crate::matcher::MatchResult::no_match(),
                    component_results: Vec::new(),
                    connector: None,
                },
                entries: Vec::new(),
                needs_review: true,
            };
        };

        let resolution = matcher.resolve(&identity, parsed.form);
        let mut entries: Vec<ResolvedEntry> = Vec::new();
        let mut needs_review = false;

        match resolution.status {
            MatchStatus::Matched => {
                diagnostics.matched += 1;
                let confidence = resolution.result.confidence;
                if confidence < LOW_CONFIDENCE_THRESHOLD {
                    diagnostics.low_confidence += 1;
                    needs_review = true;
                }
                if let Some(id) = &resolution.result.catalog_id {
                    entries.push(self.build_entry(id, confidence, &parsed, diagnostics));
                }
            }
            MatchStatus::Compound | MatchStatus::PartialCompound => {
                // Soft-match policy: matched components flow through;
                // unmatched ones are flagged for review.
                diagnostics.matched += 1;
                for component in &resolution.component_results {
                    match &component.result.catalog_id {
                        Some(id) => {
                            let confidence = component.result.confidence;
                            if confidence < LOW_CONFIDENCE_THRESHOLD {
                                diagnostics.low_confidence += 1;
                                needs_review = true;
                            }
                            entries.push(self.build_entry(id, confidence, &parsed, diagnostics));
                        }
                        None => {
                            diagnostics.low_confidence += 1;
                            needs_review = true;
                            diagnostics
                                .warnings
                                .push(PipelineWarning::UnresolvedIdentity {
                                    identity: component.component.clone(),
                                });
                        }
                    }
                }
            }
            MatchStatus::Unknown => {
                diagnostics.unmatched += 1;
                needs_review = true;
                diagnostics
                    .warnings
                    .push(PipelineWarning::UnresolvedIdentity { identity });
            }
        }

        ResolvedLine {
            raw_name: raw.name.clone(),
            parsed,
            resolution,
            entries,
            needs_review,
        }
    }

    fn build_entry(
        &self,
        catalog_id: &str,
        confidence: f64,
        parsed: &ParsedIngredient,
        diagnostics: &mut RecipeDiagnostics,
    ) -> ResolvedEntry {
        let ingredient = self.ingredients.get(catalog_id);
        let normalized = normalize(parsed, ingredient);

        // A measured quantity that converted to nothing and is not a
        // count is an unconvertible unit.
        if parsed.quantity.is_some()
            && normalized.normalized_grams.is_none()
            && normalized.normalized_milliliters.is_none()
            && !normalized.is_count_based()
        {
            let unit = parsed
                .unit
                .as_ref()
                .map(|u| u.display_name().to_string())
                .unwrap_or_default();
            diagnostics.warnings.push(PipelineWarning::UnconvertibleUnit {
                ingredient: catalog_id.to_string(),
                unit,
            });
        }

        let cost = match ingredient {
            Some(ingredient) => {
                let result = cost_for_quantity(ingredient, &normalized);
                if let Some(detail) = result.warning {
                    diagnostics.warnings.push(PipelineWarning::MissingPricing {
                        ingredient: catalog_id.to_string(),
                        detail,
                    });
                }
                result.cost
            }
            None => 0.0,
        };

        debug!(
            "Entry '{}': confidence {:.2}, cost {:.2}",
            catalog_id, confidence, cost
        );

        ResolvedEntry {
            catalog_id: catalog_id.to_string(),
            confidence,
            normalized,
            cost,
        }
    }
}

/// Grams used to seed the state table: canonical grams, then milliliters
/// at 1 g/ml, then count × typical item weight.
fn state_grams(
    normalized: &NormalizedQuantity,
    ingredient: &crate::catalog::CatalogIngredient,
) -> f64 {
    if let Some(grams) = normalized.normalized_grams {
        return grams;
    }
    if let Some(ml) = normalized.normalized_milliliters {
        return ml;
    }
    if normalized.is_count_based() {
        if let Some(count) = normalized.original_quantity {
            return count * typical_item_grams(ingredient);
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        CanonicalUnit, CatalogIngredient, Density, IngredientForm, Pricing, Process,
        ProcessCategory,
    };
    use crate::process_graph::{ProcessApplication, ProcessStep};

    fn catalogs() -> (IngredientCatalog, ProcessCatalog) {
        let ingredients = IngredientCatalog::from_records(vec![
            CatalogIngredient::new("onion", "Onion", CanonicalUnit::Mass)
                .with_form(IngredientForm::Fresh)
                .with_density(Density {
                    grams_per_cup: Some(160.0),
                    grams_per_tbsp: Some(10.0),
                    grams_per_tsp: None,
                })
                .with_pricing(Pricing::PerKilogram { price: 2.0 }),
            CatalogIngredient::new("salt", "Salt", CanonicalUnit::Mass)
                .with_form(IngredientForm::Dried)
                .with_pricing(Pricing::PerKilogram { price: 1.0 }),
            CatalogIngredient::new("black-pepper", "Black Pepper", CanonicalUnit::Mass)
                .with_form(IngredientForm::Dried)
                .with_aliases(&["pepper"]),
        ])
        .unwrap();

        let processes = ProcessCatalog::from_records(vec![
            Process::new("dice", "Dice", ProcessCategory::Prep, 0.95),
            Process::new("saute", "Sauté", ProcessCategory::Cook, 0.8),
        ])
        .unwrap();

        (ingredients, processes)
    }

    fn onion_recipe() -> RecipeInput {
        RecipeInput {
            title: "Sautéed Onions".to_string(),
            servings: 2,
            ingredients: vec![RawIngredient {
                name: "onion".to_string(),
                quantity: Some(1.0),
                unit: Some("cup".to_string()),
            }],
            process_graph: ProcessGraph {
                process_steps: vec![ProcessStep {
                    step_number: 1,
                    original_instruction_text: None,
                    processes: vec![
                        ProcessApplication {
                            process_id: "dice".to_string(),
                            ingredient_names: vec!["onion".to_string()],
                            duration_minutes: None,
                        },
                        ProcessApplication {
                            process_id: "saute".to_string(),
                            ingredient_names: vec!["onion".to_string()],
                            duration_minutes: Some(8.0),
                        },
                    ],
                    output_description: Some("golden sautéed onions".to_string()),
                }],
            },
        }
    }

    #[test]
    fn test_single_ingredient_recipe_end_to_end() {
        let (ingredients, processes) = catalogs();
        let keywords = KeywordConfig::default();
        let pipeline = RecipePipeline::new(&ingredients, &processes, &keywords);

        let report = pipeline.run(&onion_recipe());

        assert_eq!(report.diagnostics.matched, 1);
        assert_eq!(report.diagnostics.unmatched, 0);
        assert_eq!(report.components.len(), 1);
        let component = &report.components[0];
        assert!((component.output_quantity_grams - 121.6).abs() < 1e-9);
        // 160 g at 2.00/kg.
        assert!((report.metrics.total_cost - 0.32).abs() < 1e-9);
        assert!((report.metrics.cost_per_serving - 0.16).abs() < 1e-9);
    }

    #[test]
    fn test_unmatched_ingredient_isolated() {
        let (ingredients, processes) = catalogs();
        let keywords = KeywordConfig::default();
        let pipeline = RecipePipeline::new(&ingredients, &processes, &keywords);

        let mut recipe = onion_recipe();
        recipe.ingredients.push(RawIngredient {
            name: "powdered unicorn horn".to_string(),
            quantity: Some(1.0),
            unit: Some("tsp".to_string()),
        });

        let report = pipeline.run(&recipe);
        assert_eq!(report.diagnostics.matched, 1);
        assert_eq!(report.diagnostics.unmatched, 1);
        assert!(report
            .diagnostics
            .warnings
            .iter()
            .any(|w| matches!(w, PipelineWarning::UnresolvedIdentity { .. })));
        // The unmatched line contributes nothing but does not abort.
        assert!((report.metrics.total_cost - 0.32).abs() < 1e-9);
    }

    #[test]
    fn test_compound_line_contributes_all_components() {
        let (ingredients, processes) = catalogs();
        let keywords = KeywordConfig::default();
        let pipeline = RecipePipeline::new(&ingredients, &processes, &keywords);

        let recipe = RecipeInput {
            title: "Seasoning".to_string(),
            servings: 1,
            ingredients: vec![RawIngredient {
                name: "salt and pepper".to_string(),
                quantity: None,
                unit: None,
            }],
            process_graph: ProcessGraph {
                process_steps: vec![],
            },
        };

        let report = pipeline.run(&recipe);
        assert_eq!(report.lines[0].entries.len(), 2);
        assert_eq!(report.shopping_items.len(), 2);
        // Pepper has no pricing; surfaced as a warning, not a failure.
        assert!(report
            .diagnostics
            .warnings
            .iter()
            .any(|w| matches!(w, PipelineWarning::MissingPricing { .. })));
    }

    #[test]
    fn test_invalid_process_id_warns_and_skips() {
        let (ingredients, processes) = catalogs();
        let keywords = KeywordConfig::default();
        let pipeline = RecipePipeline::new(&ingredients, &processes, &keywords);

        let mut recipe = onion_recipe();
        recipe.process_graph.process_steps[0].processes[0].process_id = "dise".to_string();

        let report = pipeline.run(&recipe);
        let graph_warning = report.diagnostics.warnings.iter().find_map(|w| match w {
            PipelineWarning::Graph(GraphWarning::UnknownProcessId { suggestions, .. }) => {
                Some(suggestions.clone())
            }
            _ => None,
        });
        assert!(graph_warning.unwrap().contains(&"dice".to_string()));
        // Only the sauté applies: 160 × 0.8.
        assert!((report.components[0].output_quantity_grams - 128.0).abs() < 1e-9);
    }

    #[test]
    fn test_shopping_aggregation_across_lines() {
        let (ingredients, processes) = catalogs();
        let keywords = KeywordConfig::default();
        let pipeline = RecipePipeline::new(&ingredients, &processes, &keywords);

        let recipe = RecipeInput {
            title: "Onion Heavy".to_string(),
            servings: 1,
            ingredients: vec![
                RawIngredient {
                    name: "2 cups diced onion".to_string(),
                    quantity: None,
                    unit: None,
                },
                RawIngredient {
                    name: "3 tbsp minced onion".to_string(),
                    quantity: None,
                    unit: None,
                },
            ],
            process_graph: ProcessGraph {
                process_steps: vec![],
            },
        };

        let report = pipeline.run(&recipe);
        assert_eq!(report.shopping_items.len(), 1);
        assert_eq!(report.shopping_items[0].total_grams, Some(350.0));
        assert!(report.shopping_items[0].has_complete_data);
    }

    #[test]
    fn test_duplicate_lines_each_counted() {
        let (ingredients, processes) = catalogs();
        let keywords = KeywordConfig::default();
        let pipeline = RecipePipeline::new(&ingredients, &processes, &keywords);

        // "200 g onion ... divided" written as two separate lines.
        let duplicated = RawIngredient {
            name: "onion".to_string(),
            quantity: Some(200.0),
            unit: Some("g".to_string()),
        };
        let recipe = RecipeInput {
            title: "Divided".to_string(),
            servings: 1,
            ingredients: vec![duplicated.clone(), duplicated],
            process_graph: ProcessGraph {
                process_steps: vec![],
            },
        };

        let report = pipeline.run(&recipe);
        assert_eq!(report.shopping_items[0].total_grams, Some(400.0));
        // Both occurrences count toward the total, 400 g at 2.00/kg.
        assert!((report.metrics.total_cost - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_unconvertible_unit_warns() {
        let (ingredients, processes) = catalogs();
        let keywords = KeywordConfig::default();
        let pipeline = RecipePipeline::new(&ingredients, &processes, &keywords);

        let recipe = RecipeInput {
            title: "Handfuls".to_string(),
            servings: 1,
            ingredients: vec![RawIngredient {
                name: "onion".to_string(),
                quantity: Some(2.0),
                unit: Some("handfuls".to_string()),
            }],
            process_graph: ProcessGraph {
                process_steps: vec![],
            },
        };

        let report = pipeline.run(&recipe);
        assert_eq!(report.diagnostics.matched, 1);
        let warning = report.diagnostics.warnings.iter().find_map(|w| match w {
            PipelineWarning::UnconvertibleUnit { ingredient, unit } => {
                Some((ingredient.clone(), unit.clone()))
            }
            _ => None,
        });
        assert_eq!(
            warning,
            Some(("onion".to_string(), "handfuls".to_string()))
        );
    }

    #[test]
    fn test_summary_renders() {
        let (ingredients, processes) = catalogs();
        let keywords = KeywordConfig::default();
        let pipeline = RecipePipeline::new(&ingredients, &processes, &keywords);
        let report = pipeline.run(&onion_recipe());
        let summary = report.summary();
        assert!(summary.contains("Sautéed Onions"));
        assert!(summary.contains("golden sautéed onions"));
        assert!(summary.contains("Onion"));
    }
}
