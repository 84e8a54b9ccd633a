use anyhow::{bail, Context, Result};
use log::info;
use std::env;
use std::fs;
use std::sync::Arc;

use provisioner::batch::BatchRunner;
use provisioner::catalog::{IngredientCatalog, ProcessCatalog};
use provisioner::keywords::KeywordConfig;
use provisioner::pipeline::RecipeInput;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: provisioner <ingredients.json> <processes.json> <recipe.json>...");
    }

    let ingredients_json = fs::read_to_string(&args[0])
        .with_context(|| format!("reading ingredient catalog '{}'", args[0]))?;
    let ingredients = IngredientCatalog::from_json(&ingredients_json)
        .context("parsing ingredient catalog")?;

    let processes_json = fs::read_to_string(&args[1])
        .with_context(|| format!("reading process catalog '{}'", args[1]))?;
    let processes =
        ProcessCatalog::from_json(&processes_json).context("parsing process catalog")?;

    let mut recipes = Vec::new();
    for path in &args[2..] {
        let json =
            fs::read_to_string(path).with_context(|| format!("reading recipe '{}'", path))?;
        let recipe =
            RecipeInput::from_json(&json).with_context(|| format!("parsing recipe '{}'", path))?;
        recipes.push(recipe);
    }

    info!(
        "Loaded {} ingredients, {} recipes",
        ingredients.len(),
        recipes.len()
    );

    let runner = BatchRunner::new(
        Arc::new(ingredients),
        Arc::new(processes),
        Arc::new(KeywordConfig::default()),
    )
    .with_patterns();

    let outcome = runner.run(recipes).await;

    for report in &outcome.reports {
        println!("{}", report.summary());
    }
    for failure in &outcome.failures {
        eprintln!("FAILED {}: {}", failure.title, failure.error);
    }

    if outcome.reports.is_empty() && !outcome.failures.is_empty() {
        bail!("no recipe could be processed");
    }
    Ok(())
}
