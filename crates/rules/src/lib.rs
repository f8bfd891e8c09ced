//! Detection and recommendation rules for fleet diagnostics.
//!
//! This crate provides:
//! - JSON/YAML definition documents (patterns, recommendation rules, plan templates)
//! - Keyword pattern matching over diagnostic records
//! - Feature extraction (keyword counts, numeric passthrough, datetime parts)
//! - Condition → recommendation evaluation with first-match-wins capping
//! - Built-in defaults and static definition checks

pub mod defaults;
pub mod definition;
pub mod features;
pub mod lint;
pub mod loader;
pub mod pattern;
pub mod recommend;

pub use definition::{DefinitionSet, FeatureDefinition, PatternDefinition, PlanTemplate, RecommendationRule};
pub use features::{FeatureError, FeatureExtractor};
pub use pattern::PatternMatcher;
pub use recommend::{Condition, RecommendationEngine};
