//! # Yield and Component Generation
//!
//! Walks an ordered process graph, mutating a shared per-recipe
//! ingredient-state table and emitting components (intermediate or final
//! preparations) with aggregated cost, nutrition, prep time, and storage
//! metadata.
//!
//! The state table is the single source of truth for how much of each
//! ingredient exists and what it costs. Recipe totals are summed from it
//! directly, never from components: a component claims an ingredient's
//! full cost exactly once, but later components may still reference the
//! ingredient for tracking. A global consumed-set enforces the
//! at-most-once claim invariant; a second claim attempt is a logic error
//! that is logged loudly and never double-counted.

use crate::catalog::{
    IngredientCatalog, Nutrition, PrepAhead, Process, ProcessCatalog, ProcessCategory,
};
use crate::cost::{estimate_incidental, IncidentalEstimate};
use crate::process_graph::{ProcessApplication, ProcessGraph, ProcessStep};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Minimum name length for a component to count as "descriptive" in the
/// reusability heuristic.
const REUSABLE_NAME_MIN_CHARS: usize = 10;

/// Simplified cooking stage an ingredient passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CookingStage {
    #[default]
    Raw,
    Prepped,
    Cooked,
}

/// Mutable per-recipe state for one raw ingredient occurrence.
///
/// Created once at run start, mutated in place as processes apply, read
/// but never recreated when a component claims it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientState {
    pub catalog_id: String,
    pub current_quantity_grams: f64,
    pub original_quantity_grams: f64,
    pub cost_for_entire_quantity: f64,
    pub nutrition_for_entire_quantity: Nutrition,
    pub applied_process_ids: Vec<String>,
    pub stage: CookingStage,
}

impl IngredientState {
    pub fn new(catalog_id: &str, grams: f64, cost: f64, nutrition: Nutrition) -> Self {
        Self {
            catalog_id: catalog_id.to_string(),
            current_quantity_grams: grams,
            original_quantity_grams: grams,
            cost_for_entire_quantity: cost,
            nutrition_for_entire_quantity: nutrition,
            applied_process_ids: Vec::new(),
            stage: CookingStage::Raw,
        }
    }

    /// Apply one process: shrink by the resolved yield factor, record the
    /// process, update the stage label.
    fn apply_process(&mut self, process: &Process, yield_factor: f64) {
        self.current_quantity_grams *= yield_factor;
        self.applied_process_ids.push(process.id.clone());
        match process.category {
            ProcessCategory::Prep => self.stage = CookingStage::Prepped,
            ProcessCategory::Cook => self.stage = CookingStage::Cooked,
            ProcessCategory::Other => {}
        }
    }
}

/// The shared, owned ingredient-state table for one recipe run, keyed by
/// the raw ingredient's referenced name (lowercased).
#[derive(Debug, Clone, Default)]
pub struct IngredientStateTable {
    states: HashMap<String, IngredientState>,
}

impl IngredientStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, state: IngredientState) {
        self.states.insert(key.to_lowercase(), state);
    }

    /// Insert, or fold into an existing entry under the same key. Recipes
    /// may list the same ingredient name on several lines ("... divided");
    /// each occurrence's mass, cost, and nutrition must all count.
    pub fn accumulate(&mut self, key: &str, state: IngredientState) {
        match self.states.get_mut(&key.to_lowercase()) {
            Some(existing) => {
                existing.current_quantity_grams += state.current_quantity_grams;
                existing.original_quantity_grams += state.original_quantity_grams;
                existing.cost_for_entire_quantity += state.cost_for_entire_quantity;
                existing
                    .nutrition_for_entire_quantity
                    .accumulate(&state.nutrition_for_entire_quantity);
            }
            None => self.insert(key, state),
        }
    }

    pub fn get(&self, key: &str) -> Option<&IngredientState> {
        self.states.get(&key.to_lowercase())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut IngredientState> {
        self.states.get_mut(&key.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IngredientState)> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Recipe-level total cost. This is the authoritative sum; component
    /// costs must never be totalled instead.
    pub fn total_cost(&self) -> f64 {
        self.states.values().map(|s| s.cost_for_entire_quantity).sum()
    }

    /// Recipe-level total nutrition, summed the same way.
    pub fn total_nutrition(&self) -> Nutrition {
        let mut total = Nutrition::default();
        for state in self.states.values() {
            total.accumulate(&state.nutrition_for_entire_quantity);
        }
        total
    }
}

/// One process application resolved into a component, with the yield
/// factor actually used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedProcess {
    pub process_id: String,
    pub yield_factor: f64,
    pub duration_minutes: f64,
}

/// An ingredient claimed by a component, with its original quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceIngredient {
    pub key: String,
    pub catalog_id: String,
    pub original_quantity_grams: f64,
}

/// An intermediate or final preparation emitted by a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub step_number: u32,
    pub source_ingredients: Vec<SourceIngredient>,
    pub processes_applied: Vec<AppliedProcess>,
    pub output_quantity_grams: f64,
    pub calculated_cost: f64,
    pub calculated_nutrition: Nutrition,
    pub prep_time_minutes: f64,
    pub prep_ahead: Option<PrepAhead>,
    pub reusable: bool,
}

/// Non-fatal problems found while generating components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationWarning {
    SkippedUnknownProcess { step_number: u32, process_id: String },
    UnknownIngredientRef { step_number: u32, ingredient_name: String },
    DoubleClaimAttempt { step_number: u32, ingredient_key: String },
}

/// Everything a generation run produces besides the mutated state table.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub components: Vec<Component>,
    pub incidentals: Vec<IncidentalEstimate>,
    pub warnings: Vec<GenerationWarning>,
    pub total_prep_time_minutes: f64,
}

/// Walks the process graph against a shared ingredient-state table.
pub struct ComponentGenerator<'a> {
    processes: &'a ProcessCatalog,
    ingredients: &'a IngredientCatalog,
}

impl<'a> ComponentGenerator<'a> {
    pub fn new(processes: &'a ProcessCatalog, ingredients: &'a IngredientCatalog) -> Self {
        Self {
            processes,
            ingredients,
        }
    }

    /// Run the full graph. The state table is owned by the caller and
    /// mutated in place; the consumed-set lives for this run only.
    pub fn run(&self, graph: &ProcessGraph, table: &mut IngredientStateTable) -> GenerationOutcome {
        let mut outcome = GenerationOutcome::default();
        let mut consumed: HashSet<String> = HashSet::new();

        for step in graph.ordered_steps() {
            self.run_step(step, table, &mut consumed, &mut outcome);
        }

        outcome
    }

    fn run_step(
        &self,
        step: &ProcessStep,
        table: &mut IngredientStateTable,
        consumed: &mut HashSet<String>,
        outcome: &mut GenerationOutcome,
    ) {
        // Resolve applications against the process catalog; unknown ids
        // are skipped for yield/cost purposes, never fatal.
        let mut valid: Vec<(&Process, &ProcessApplication)> = Vec::new();
        for application in &step.processes {
            match self.processes.get(&application.process_id) {
                Some(process) => valid.push((process, application)),
                None => {
                    outcome.warnings.push(GenerationWarning::SkippedUnknownProcess {
                        step_number: step.step_number,
                        process_id: application.process_id.clone(),
                    });
                }
            }
        }
        if valid.is_empty() {
            return;
        }

        let emits_component = valid.len() > 1 || step.output_description.is_some();

        let mut cumulative_yield = 1.0;
        let mut applied: Vec<AppliedProcess> = Vec::new();

        for (process, application) in valid.iter().copied() {
            let yield_factor = self.resolve_yield_factor(process, application, table);
            let duration = application
                .duration_minutes
                .unwrap_or_else(|| process.estimated_duration_minutes());
            cumulative_yield *= yield_factor;
            outcome.total_prep_time_minutes += duration;
            applied.push(AppliedProcess {
                process_id: process.id.clone(),
                yield_factor,
                duration_minutes: duration,
            });

            // Mutate every referenced ingredient's state, claimed or not.
            let mut batch_grams = 0.0;
            for name in &application.ingredient_names {
                match table.get_mut(name) {
                    Some(state) => {
                        let factor = process.yield_factor_for(&state.catalog_id);
                        batch_grams += state.current_quantity_grams;
                        state.apply_process(process, factor);
                    }
                    None => {
                        outcome.warnings.push(GenerationWarning::UnknownIngredientRef {
                            step_number: step.step_number,
                            ingredient_name: name.clone(),
                        });
                    }
                }
            }

            self.introduce_incidentals(process, step.step_number, batch_grams, table, outcome);
        }

        if !emits_component {
            debug!(
                "Step {}: single process, no output description; state mutated only",
                step.step_number
            );
            return;
        }

        // Claim ingredients referenced by the FIRST process that are not
        // yet consumed elsewhere.
        let first_application = valid[0].1;
        let mut sources: Vec<SourceIngredient> = Vec::new();
        let mut cost = 0.0;
        let mut nutrition = Nutrition::default();

        for name in &first_application.ingredient_names {
            let key = name.to_lowercase();
            let Some(state) = table.get(&key) else {
                continue;
            };
            if consumed.contains(&key) {
                // Claim attempt on an already-consumed ingredient: either
                // a malformed graph or a claim-tracking bug. Logged loudly
                // and never double-counted.
                error!(
                    "Step {}: ingredient '{}' already claimed by an earlier component",
                    step.step_number, key
                );
                outcome.warnings.push(GenerationWarning::DoubleClaimAttempt {
                    step_number: step.step_number,
                    ingredient_key: key,
                });
                continue;
            }
            consumed.insert(key.clone());
            sources.push(SourceIngredient {
                key: key.clone(),
                catalog_id: state.catalog_id.clone(),
                original_quantity_grams: state.original_quantity_grams,
            });
            cost += state.cost_for_entire_quantity;
            nutrition.accumulate(&state.nutrition_for_entire_quantity);
        }

        // Incidentals introduced by this step's processes are claimed
        // into the component.
        for incidental in outcome
            .incidentals
            .iter()
            .filter(|i| i.grams > 0.0)
        {
            let key = incidental_key(&incidental.catalog_id, step.step_number);
            if let Some(state) = table.get(&key) {
                if consumed.insert(key.clone()) {
                    cost += state.cost_for_entire_quantity;
                    nutrition.accumulate(&state.nutrition_for_entire_quantity);
                    sources.push(SourceIngredient {
                        key,
                        catalog_id: state.catalog_id.clone(),
                        original_quantity_grams: state.original_quantity_grams,
                    });
                }
            }
        }

        let claimed_grams: f64 = sources.iter().map(|s| s.original_quantity_grams).sum();
        let output_quantity_grams = claimed_grams * cumulative_yield;
        let prep_time_minutes: f64 = applied.iter().map(|p| p.duration_minutes).sum();
        let prep_ahead = merge_prep_ahead(valid.iter().map(|(p, _)| *p));

        let name = step
            .output_description
            .clone()
            .unwrap_or_else(|| format!("step {} preparation", step.step_number));

        let storable = prep_ahead.map(|p| p.can_store).unwrap_or(false);
        let reusable =
            storable && applied.len() > 1 && name.chars().count() >= REUSABLE_NAME_MIN_CHARS;

        let component = Component {
            id: format!("component-{}", outcome.components.len() + 1),
            name,
            step_number: step.step_number,
            source_ingredients: sources,
            processes_applied: applied,
            output_quantity_grams,
            calculated_cost: cost,
            calculated_nutrition: nutrition,
            prep_time_minutes,
            prep_ahead,
            reusable,
        };

        debug!(
            "Step {}: emitted component '{}' ({:.1} g, {:.2} cost)",
            step.step_number, component.name, component.output_quantity_grams, component.calculated_cost
        );

        outcome.components.push(component);
    }

    /// Yield factor for one application: the override of the first
    /// referenced ingredient wins (primary-ingredient convention).
    fn resolve_yield_factor(
        &self,
        process: &Process,
        application: &ProcessApplication,
        table: &IngredientStateTable,
    ) -> f64 {
        let mut referenced_ids: Vec<String> = Vec::new();
        for name in &application.ingredient_names {
            if let Some(state) = table.get(name) {
                referenced_ids.push(state.catalog_id.clone());
            }
        }

        let Some(first_id) = referenced_ids.first() else {
            return process.yield_factor;
        };

        let chosen = process.yield_factor_for(first_id);
        let differing = referenced_ids
            .iter()
            .skip(1)
            .any(|id| process.yield_factor_for(id) != chosen);
        if differing {
            debug!(
                "Process '{}' references ingredients with differing yield overrides; using '{}' ({})",
                process.id, first_id, chosen
            );
        }
        chosen
    }

    /// Add state-table entries for incidental ingredients a process
    /// introduces, so their cost and nutrition count toward recipe
    /// totals exactly once.
    fn introduce_incidentals(
        &self,
        process: &Process,
        step_number: u32,
        batch_grams: f64,
        table: &mut IngredientStateTable,
        outcome: &mut GenerationOutcome,
    ) {
        if batch_grams <= 0.0 {
            return;
        }
        for id in &process.additional_ingredients {
            let Some(ingredient) = self.ingredients.get(id) else {
                warn!(
                    "Process '{}' introduces unknown ingredient '{}'",
                    process.id, id
                );
                continue;
            };
            let estimate = estimate_incidental(process, ingredient, batch_grams);
            let nutrition = ingredient
                .nutrition_per_100
                .map(|n| n.scaled(estimate.grams / 100.0))
                .unwrap_or_default();
            let key = incidental_key(id, step_number);
            // Several applications in one step may introduce the same
            // incidental; accumulate into one state entry.
            if let Some(existing) = table.get_mut(&key) {
                existing.current_quantity_grams += estimate.grams;
                existing.original_quantity_grams += estimate.grams;
                existing.cost_for_entire_quantity += estimate.cost;
                existing.nutrition_for_entire_quantity.accumulate(&nutrition);
            } else {
                table.insert(
                    &key,
                    IngredientState::new(id, estimate.grams, estimate.cost, nutrition),
                );
            }
            outcome.incidentals.push(estimate);
        }
    }
}

fn incidental_key(catalog_id: &str, step_number: u32) -> String {
    format!("incidental:{}:step{}", catalog_id, step_number)
}

/// Keep the most restrictive prep-ahead metadata: storable only if every
/// contributing process allows it, with the shortest shelf life.
fn merge_prep_ahead<'p>(processes: impl Iterator<Item = &'p Process>) -> Option<PrepAhead> {
    let mut merged: Option<PrepAhead> = None;
    for process in processes {
        let Some(prep) = process.prep_ahead else {
            continue;
        };
        merged = Some(match merged {
            None => prep,
            Some(current) => {
                let can_store = current.can_store && prep.can_store;
                let (shelf_life_hours, storage) = match (current.shelf_life_hours, prep.shelf_life_hours) {
                    (Some(a), Some(b)) if b < a => (Some(b), prep.storage),
                    (None, Some(b)) => (Some(b), prep.storage),
                    (a, _) => (a, current.storage),
                };
                PrepAhead {
                    can_store,
                    shelf_life_hours,
                    storage,
                }
            }
        });
    }
    merged
}

/// Per-recipe rollup metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeMetrics {
    pub total_cost: f64,
    pub cost_per_serving: f64,
    pub total_prep_time_minutes: f64,
    pub nutrition_per_serving: Nutrition,
    pub prep_ahead_components: Vec<String>,
    pub reusable_components: Vec<String>,
}

/// Compute recipe metrics from the state table and generation outcome.
///
/// Totals come from the state table, never from summing component costs:
/// components claim full ingredient cost at most once, but unclaimed
/// ingredients (garnish) still count toward the recipe.
pub fn compute_metrics(
    table: &IngredientStateTable,
    outcome: &GenerationOutcome,
    servings: u32,
) -> RecipeMetrics {
    let servings = servings.max(1) as f64;
    let total_cost = table.total_cost();
    let total_nutrition = table.total_nutrition();

    let prep_ahead_components = outcome
        .components
        .iter()
        .filter(|c| c.prep_ahead.map(|p| p.can_store).unwrap_or(false))
        .map(|c| c.id.clone())
        .collect();
    let reusable_components = outcome
        .components
        .iter()
        .filter(|c| c.reusable)
        .map(|c| c.id.clone())
        .collect();

    RecipeMetrics {
        total_cost,
        cost_per_serving: total_cost / servings,
        total_prep_time_minutes: outcome.total_prep_time_minutes,
        nutrition_per_serving: total_nutrition.scaled(1.0 / servings),
        prep_ahead_components,
        reusable_components,
    }
}
