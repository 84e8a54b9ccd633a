//! # Process Graph
//!
//! Types for the per-recipe process graph produced by the upstream
//! instruction-interpretation step, plus validation against the process
//! catalog and the recipe's raw ingredient list.
//!
//! Validation never fails a recipe: unknown process ids and ingredient
//! names become structured warnings carrying up to three "did you mean"
//! suggestions by edit distance, and the offending applications are
//! skipped downstream.

use crate::catalog::ProcessCatalog;
use crate::matcher::levenshtein;
use log::warn;
use serde::{Deserialize, Serialize};

/// Most suggestions offered for an unrecognized id.
const MAX_SUGGESTIONS: usize = 3;
/// Suggestions beyond this edit distance are noise.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// One process applied to named ingredients within a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessApplication {
    pub process_id: String,
    #[serde(default)]
    pub ingredient_names: Vec<String>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
}

/// One recipe instruction, ordered by step number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStep {
    pub step_number: u32,
    #[serde(default)]
    pub original_instruction_text: Option<String>,
    pub processes: Vec<ProcessApplication>,
    #[serde(default)]
    pub output_description: Option<String>,
}

/// A full recipe process graph, as received from upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGraph {
    pub process_steps: Vec<ProcessStep>,
}

impl ProcessGraph {
    /// Parse a process graph from upstream JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Steps sorted by step number.
    pub fn ordered_steps(&self) -> Vec<&ProcessStep> {
        let mut steps: Vec<&ProcessStep> = self.process_steps.iter().collect();
        steps.sort_by_key(|s| s.step_number);
        steps
    }
}

/// A structured validation warning. Data, not an error: batch runs carry
/// these to a human reviewer instead of aborting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphWarning {
    UnknownProcessId {
        step_number: u32,
        process_id: String,
        suggestions: Vec<String>,
    },
    UnknownIngredientName {
        step_number: u32,
        ingredient_name: String,
        suggestions: Vec<String>,
    },
}

/// Validate every process id against the catalog and every referenced
/// ingredient name against the recipe's raw ingredient identities.
pub fn validate_graph(
    graph: &ProcessGraph,
    processes: &ProcessCatalog,
    known_ingredient_names: &[String],
) -> Vec<GraphWarning> {
    let mut warnings = Vec::new();
    let process_ids: Vec<&str> = processes.ids().collect();

    for step in &graph.process_steps {
        for application in &step.processes {
            if processes.get(&application.process_id).is_none() {
                let suggestions = suggest(&application.process_id, process_ids.iter().copied());
                warn!(
                    "Step {}: unknown process id '{}' (suggestions: {:?})",
                    step.step_number, application.process_id, suggestions
                );
                warnings.push(GraphWarning::UnknownProcessId {
                    step_number: step.step_number,
                    process_id: application.process_id.clone(),
                    suggestions,
                });
            }

            for name in &application.ingredient_names {
                let name_lower = name.to_lowercase();
                let known = known_ingredient_names
                    .iter()
                    .any(|k| k.to_lowercase() == name_lower);
                if !known {
                    let suggestions =
                        suggest(name, known_ingredient_names.iter().map(|s| s.as_str()));
                    warn!(
                        "Step {}: process '{}' references unknown ingredient '{}'",
                        step.step_number, application.process_id, name
                    );
                    warnings.push(GraphWarning::UnknownIngredientName {
                        step_number: step.step_number,
                        ingredient_name: name.clone(),
                        suggestions,
                    });
                }
            }
        }
    }

    warnings
}

/// Closest near-miss candidates by edit distance.
fn suggest<'a>(target: &str, candidates: impl Iterator<Item = &'a str>) -> Vec<String> {
    let target = target.to_lowercase();
    let mut scored: Vec<(usize, &str)> = candidates
        .map(|c| (levenshtein(&target, &c.to_lowercase()), c))
        .filter(|(d, _)| *d <= MAX_SUGGESTION_DISTANCE)
        .collect();
    scored.sort_by_key(|(d, _)| *d);
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, c)| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Process, ProcessCategory};

    fn processes() -> ProcessCatalog {
        ProcessCatalog::from_records(vec![
            Process::new("dice", "Dice", ProcessCategory::Prep, 0.95),
            Process::new("slice", "Slice", ProcessCategory::Prep, 0.95),
            Process::new("saute", "Sauté", ProcessCategory::Cook, 0.8),
        ])
        .unwrap()
    }

    fn step(process_id: &str, ingredients: &[&str]) -> ProcessGraph {
        ProcessGraph {
            process_steps: vec![ProcessStep {
                step_number: 1,
                original_instruction_text: None,
                processes: vec![ProcessApplication {
                    process_id: process_id.to_string(),
                    ingredient_names: ingredients.iter().map(|s| s.to_string()).collect(),
                    duration_minutes: None,
                }],
                output_description: None,
            }],
        }
    }

    #[test]
    fn test_valid_graph_no_warnings() {
        let graph = step("dice", &["onion"]);
        let warnings = validate_graph(&graph, &processes(), &["onion".to_string()]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unknown_process_id_suggests_near_miss() {
        let graph = step("dise", &["onion"]);
        let warnings = validate_graph(&graph, &processes(), &["onion".to_string()]);
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            GraphWarning::UnknownProcessId {
                process_id,
                suggestions,
                ..
            } => {
                assert_eq!(process_id, "dise");
                assert!(suggestions.contains(&"dice".to_string()));
                assert!(suggestions.len() <= 3);
            }
            other => panic!("unexpected warning: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_ingredient_name_warns() {
        let graph = step("dice", &["onions"]);
        let warnings = validate_graph(&graph, &processes(), &["onion".to_string()]);
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            GraphWarning::UnknownIngredientName {
                ingredient_name,
                suggestions,
                ..
            } => {
                assert_eq!(ingredient_name, "onions");
                assert_eq!(suggestions, &vec!["onion".to_string()]);
            }
            other => panic!("unexpected warning: {:?}", other),
        }
    }

    #[test]
    fn test_graph_json_shape() {
        let json = r#"{
            "processSteps": [
                {
                    "stepNumber": 1,
                    "originalInstructionText": "Dice the onion and sauté until golden.",
                    "processes": [
                        { "processId": "dice", "ingredientNames": ["onion"] },
                        { "processId": "saute", "ingredientNames": ["onion"], "durationMinutes": 8 }
                    ],
                    "outputDescription": "golden sautéed onions"
                }
            ]
        }"#;
        let graph = ProcessGraph::from_json(json).unwrap();
        assert_eq!(graph.process_steps.len(), 1);
        assert_eq!(graph.process_steps[0].processes[1].duration_minutes, Some(8.0));
        assert_eq!(
            graph.process_steps[0].output_description.as_deref(),
            Some("golden sautéed onions")
        );
    }

    #[test]
    fn test_ordered_steps() {
        let graph = ProcessGraph {
            process_steps: vec![
                ProcessStep {
                    step_number: 2,
                    original_instruction_text: None,
                    processes: vec![],
                    output_description: None,
                },
                ProcessStep {
                    step_number: 1,
                    original_instruction_text: None,
                    processes: vec![],
                    output_description: None,
                },
            ],
        };
        let ordered = graph.ordered_steps();
        assert_eq!(ordered[0].step_number, 1);
        assert_eq!(ordered[1].step_number, 2);
    }
}
