//! Plan resolution: recommendation id or pattern name → remediation plan.
//!
//! Lookup goes through a static table of [`PlanTemplate`]s. Ids without an
//! entry get a synthesized Manual plan `REM_<id>` that always requires
//! confirmation.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use fleetmend_core::{
    ImplementationType, PatternMatch, PropertyBag, Recommendation, RemediationActionPlan,
};
use fleetmend_rules::{defaults, DefinitionSet, PlanTemplate};

use crate::template;

/// Prefix of synthesized plan ids.
pub const SYNTHESIZED_PREFIX: &str = "REM_";

pub struct RemediationPlanner {
    plans: IndexMap<String, PlanTemplate>,
}

impl RemediationPlanner {
    pub fn new(plans: IndexMap<String, PlanTemplate>) -> Self {
        Self { plans }
    }

    pub fn from_definitions(set: &DefinitionSet) -> Self {
        Self::new(set.plans.clone())
    }

    /// Resolve a recommendation. `item` is the input the recommendation was
    /// produced for and supplies `${Name}` parameter values.
    pub fn resolve_recommendation(
        &self,
        recommendation: &Recommendation,
        item: &PropertyBag,
    ) -> RemediationActionPlan {
        self.resolve(
            &recommendation.id,
            &recommendation.title,
            &recommendation.description,
            item,
        )
    }

    /// Resolve a pattern match directly. Parameters resolve against the
    /// first example record plus `PatternName` and `MatchedItemCount`.
    pub fn resolve_pattern(&self, pattern: &PatternMatch) -> RemediationActionPlan {
        let mut context = pattern.example_items.first().cloned().unwrap_or_default();
        context.insert("PatternName", pattern.pattern_name.as_str());
        context.insert("MatchedItemCount", pattern.matched_item_count as i64);
        let title = format!("Investigate {}", pattern.pattern_name);
        self.resolve(&pattern.pattern_name, &title, &pattern.description, &context)
    }

    fn resolve(
        &self,
        source_id: &str,
        title: &str,
        description: &str,
        context: &PropertyBag,
    ) -> RemediationActionPlan {
        match self.plans.get(source_id) {
            Some(template) => {
                debug!(source = source_id, action_id = %template.action_id, "resolved plan");
                instantiate(source_id, template, context)
            }
            None => {
                warn!(source = source_id, "no plan mapped, synthesizing manual plan");
                synthesize(source_id, title, description)
            }
        }
    }
}

impl Default for RemediationPlanner {
    /// The built-in plan table.
    fn default() -> Self {
        Self::new(defaults::plans())
    }
}

fn instantiate(source_id: &str, template: &PlanTemplate, context: &PropertyBag) -> RemediationActionPlan {
    let lookup = |name: &str| context.get(name).map(Value::from);
    let mut unresolved = Vec::new();
    let resolved_parameters = template
        .parameters
        .iter()
        .map(|(k, v)| (k.clone(), template::substitute(v, &lookup, &mut unresolved)))
        .collect();
    if !unresolved.is_empty() {
        warn!(
            action_id = %template.action_id,
            placeholders = ?unresolved,
            "unresolved plan parameters left as-is"
        );
    }

    RemediationActionPlan {
        action_id: template.action_id.clone(),
        source_id: source_id.to_string(),
        title: template.title.clone(),
        description: template.description.clone(),
        implementation_type: template.implementation_type,
        target_reference: template.target_reference.clone(),
        resolved_parameters,
        confirmation_required: template.confirmation_required,
        impact: template.impact.clone(),
        success_criteria: template.success_criteria.clone(),
    }
}

fn synthesize(source_id: &str, title: &str, description: &str) -> RemediationActionPlan {
    RemediationActionPlan {
        action_id: format!("{SYNTHESIZED_PREFIX}{source_id}"),
        source_id: source_id.to_string(),
        title: if title.is_empty() { source_id.to_string() } else { title.to_string() },
        description: description.to_string(),
        implementation_type: ImplementationType::Manual,
        target_reference: None,
        resolved_parameters: IndexMap::new(),
        confirmation_required: true,
        impact: "Unknown; review before acting.".to_string(),
        success_criteria: "Operator confirms the issue is resolved.".to_string(),
    }
}
