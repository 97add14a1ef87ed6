//! Plan Bottleneck Analysis Module
//!
//! Walks a parsed plan tree, applies independent detection rules at every
//! node and ranks the resulting bottlenecks. Rules are isolated from each
//! other: a rule that fails on one node is logged and skipped, the rest of
//! the findings are still reported.

mod analyzer;
mod config;
mod model;
mod rules;

pub use analyzer::*;
pub use config::*;
pub use model::*;
pub use rules::{
    DetectionRule, EstimateErrorRule, HighCostRule, JoinIndexRule, NestedLoopRule, RuleContext,
    SeqScanRule, SortRule, default_rules,
};
