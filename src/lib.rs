//! # Provisioner
//!
//! An ingredient resolution and process-costing engine: parses raw
//! recipe ingredient lines, resolves them against an ingredient catalog
//! with staged fuzzy matching, normalizes quantities through density
//! data, prices everything, and walks the recipe's process graph to
//! produce yield-adjusted components, costs, and shopping lists.

pub mod batch;
pub mod catalog;
pub mod components;
pub mod compound;
pub mod cost;
pub mod keywords;
pub mod matcher;
pub mod parser;
pub mod pipeline;
pub mod process_graph;
pub mod quantity;
