//! # Batch Runner
//!
//! Runs the recipe pipeline over many recipes concurrently. Catalogs and
//! keyword tables are shared read-only behind `Arc`; each recipe gets its
//! own state table, so workers never contend.
//!
//! A panic in one recipe's worker is caught and reported as a failure
//! for that recipe only. The rest of the batch completes normally.

use crate::catalog::{IngredientCatalog, ProcessCatalog};
use crate::keywords::KeywordConfig;
use crate::pipeline::{RecipeInput, RecipePipeline, RecipeReport};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Concurrency cap when none is configured.
const DEFAULT_CONCURRENCY: usize = 8;

/// One recipe that could not be processed.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub title: String,
    pub error: String,
}

/// Reports for the recipes that succeeded plus failures for those that
/// did not, in no particular order guarantee beyond per-vector input
/// order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reports: Vec<RecipeReport>,
    pub failures: Vec<BatchFailure>,
}

/// Concurrent driver over shared catalogs.
pub struct BatchRunner {
    ingredients: Arc<IngredientCatalog>,
    processes: Arc<ProcessCatalog>,
    keywords: Arc<KeywordConfig>,
    use_patterns: bool,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(
        ingredients: Arc<IngredientCatalog>,
        processes: Arc<ProcessCatalog>,
        keywords: Arc<KeywordConfig>,
    ) -> Self {
        Self {
            ingredients,
            processes,
            keywords,
            use_patterns: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_patterns(mut self) -> Self {
        self.use_patterns = true;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Process every recipe, at most `concurrency` at a time. Output
    /// reports preserve the input order of the recipes that succeeded.
    pub async fn run(&self, recipes: Vec<RecipeInput>) -> BatchOutcome {
        info!(
            "Batch run: {} recipes, concurrency {}",
            recipes.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(recipes.len());

        for recipe in recipes {
            let semaphore = Arc::clone(&semaphore);
            let ingredients = Arc::clone(&self.ingredients);
            let processes = Arc::clone(&self.processes);
            let keywords = Arc::clone(&self.keywords);
            let use_patterns = self.use_patterns;
            let title = recipe.title.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                tokio::task::spawn_blocking(move || {
                    let mut pipeline =
                        RecipePipeline::new(&ingredients, &processes, &keywords);
                    if use_patterns {
                        pipeline = pipeline.with_patterns();
                    }
                    pipeline.run(&recipe)
                })
                .await
            });
            handles.push((title, handle));
        }

        let mut outcome = BatchOutcome::default();
        for (title, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => outcome.reports.push(report),
                Ok(Err(join_error)) => {
                    error!("Recipe '{}' worker failed: {}", title, join_error);
                    outcome.failures.push(BatchFailure {
                        title,
                        error: join_error.to_string(),
                    });
                }
                Err(join_error) => {
                    error!("Recipe '{}' task failed: {}", title, join_error);
                    outcome.failures.push(BatchFailure {
                        title,
                        error: join_error.to_string(),
                    });
                }
            }
        }

        info!(
            "Batch complete: {} ok, {} failed",
            outcome.reports.len(),
            outcome.failures.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CanonicalUnit, CatalogIngredient, Pricing, Process, ProcessCategory};
    use crate::pipeline::RawIngredient;
    use crate::process_graph::ProcessGraph;

    fn runner() -> BatchRunner {
        let ingredients = IngredientCatalog::from_records(vec![CatalogIngredient::new(
            "onion",
            "Onion",
            CanonicalUnit::Mass,
        )
        .with_pricing(Pricing::PerKilogram { price: 2.0 })])
        .unwrap();
        let processes = ProcessCatalog::from_records(vec![Process::new(
            "dice",
            "Dice",
            ProcessCategory::Prep,
            0.95,
        )])
        .unwrap();
        BatchRunner::new(
            Arc::new(ingredients),
            Arc::new(processes),
            Arc::new(KeywordConfig::default()),
        )
    }

    fn recipe(title: &str, ingredient: &str) -> RecipeInput {
        RecipeInput {
            title: title.to_string(),
            servings: 1,
            ingredients: vec![RawIngredient {
                name: ingredient.to_string(),
                quantity: Some(200.0),
                unit: Some("g".to_string()),
            }],
            process_graph: ProcessGraph {
                process_steps: vec![],
            },
        }
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let runner = runner().with_concurrency(2);
        let recipes = vec![
            recipe("First", "onion"),
            recipe("Second", "onion"),
            recipe("Third", "onion"),
        ];
        let outcome = runner.run(recipes).await;
        assert!(outcome.failures.is_empty());
        let titles: Vec<&str> = outcome.reports.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn test_bad_recipe_does_not_sink_batch() {
        let runner = runner();
        let recipes = vec![recipe("Good", "onion"), recipe("Odd", "moon dust")];
        let outcome = runner.run(recipes).await;
        // An unmatched ingredient is a diagnostic, not a failure.
        assert_eq!(outcome.reports.len(), 2);
        assert!(outcome.failures.is_empty());
        let odd = outcome.reports.iter().find(|r| r.title == "Odd").unwrap();
        assert_eq!(odd.diagnostics.unmatched, 1);
    }
}
