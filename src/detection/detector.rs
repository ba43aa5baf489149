//! Rule runner.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::rules;
use super::{DetectionContext, DetectionRule};
use crate::models::{Assignment, Conflict};
use crate::snapshot::Snapshot;

/// Runs a set of detection rules and scores their findings.
#[derive(Clone)]
pub struct ConflictDetector {
    rules: Vec<Arc<dyn DetectionRule>>,
}

impl ConflictDetector {
    /// A detector with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// A detector running every built-in rule.
    pub fn standard() -> Self {
        Self::new()
            .with_rule(rules::TimeOverlap)
            .with_rule(rules::Capacity)
            .with_rule(rules::Travel)
            .with_rule(rules::SkillMismatch)
            .with_rule(rules::Availability)
            .with_rule(rules::DeadlineRisk)
            .with_rule(rules::GeographicMismatch)
            .with_rule(rules::WorkloadImbalance)
    }

    /// Adds a rule.
    pub fn with_rule<R: DetectionRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Names of the configured rules.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Scans `assignments` against a snapshot.
    pub fn scan(&self, snapshot: &Snapshot<'_>, assignments: &[Assignment]) -> Vec<Conflict> {
        let ctx = DetectionContext::new(snapshot, assignments);
        self.detect(&ctx)
    }

    /// Runs every rule over a prepared context.
    ///
    /// Conflicts are unique by ID (the most severe copy wins) and sorted by
    /// descending impact, then ID.
    pub fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Conflict> {
        let mut by_id: BTreeMap<String, Conflict> = BTreeMap::new();
        for rule in &self.rules {
            let found = rule.detect(ctx);
            if !found.is_empty() {
                debug!(rule = rule.name(), count = found.len(), "conflicts detected");
            }
            for mut conflict in found {
                conflict.impact_score = impact_score(ctx, &conflict);
                match by_id.get(&conflict.id) {
                    Some(existing) if existing.severity >= conflict.severity => {}
                    _ => {
                        by_id.insert(conflict.id.clone(), conflict);
                    }
                }
            }
        }

        let mut conflicts: Vec<Conflict> = by_id.into_values().collect();
        conflicts.sort_by(|a, b| {
            b.impact_score
                .total_cmp(&a.impact_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        conflicts
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for ConflictDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictDetector")
            .field("rules", &self.rule_names())
            .finish()
    }
}

fn impact_score(ctx: &DetectionContext<'_>, conflict: &Conflict) -> f64 {
    let w = &ctx.snapshot.config.impact;
    let max_priority = conflict
        .assignment_ids
        .iter()
        .filter_map(|id| ctx.assignment(id))
        .filter_map(|a| ctx.job(a))
        .map(|j| j.priority.rank())
        .max()
        .unwrap_or(0);
    w.severity * f64::from(conflict.severity.rank())
        + w.affected * conflict.assignment_ids.len() as f64
        + w.priority * f64::from(max_priority)
}
