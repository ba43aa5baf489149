//! Rule engine for multi-criteria job ordering.
//!
//! Composes dispatching rules evaluated in sequence, each consulted only
//! when every earlier rule ties, with a final tie-breaker.
//!
//! # Reference
//! Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::sync::Arc;

use super::{rules, DispatchContext, DispatchingRule, RuleScore};
use crate::models::{Job, JobOrdering};

/// How ties are broken after all rules are exhausted.
#[derive(Debug, Clone, Default)]
pub enum TieBreaker {
    /// Keep input order.
    #[default]
    NextRule,
    /// Deterministic by job ID (lexicographic).
    ById,
}

/// A composable rule engine for job ordering.
#[derive(Clone)]
pub struct RuleEngine {
    rules: Vec<Arc<dyn DispatchingRule>>,
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl RuleEngine {
    /// Creates an empty rule engine.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            tie_breaker: TieBreaker::NextRule,
            epsilon: 1e-9,
        }
    }

    /// The default visiting order:
    /// descending priority, then earliest deadline, then job ID.
    pub fn job_order() -> Self {
        Self::for_ordering(JobOrdering::PriorityDeadline)
    }

    /// The rule chain behind a request's [`JobOrdering`].
    pub fn for_ordering(ordering: JobOrdering) -> Self {
        let engine = Self::new().with_rule(rules::Priority);
        let engine = match ordering {
            JobOrdering::PriorityDeadline => engine.with_rule(rules::Edd),
            JobOrdering::ShortestFirst => engine.with_rule(rules::Spt).with_rule(rules::Edd),
            JobOrdering::LongestFirst => engine.with_rule(rules::Lpt).with_rule(rules::Edd),
            JobOrdering::LeastSlack => engine.with_rule(rules::Mst),
        };
        engine.with_final_tie_breaker(TieBreaker::ById)
    }

    /// Appends a rule, consulted when every earlier rule ties.
    pub fn with_rule<R: DispatchingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Sets the final tie-breaking strategy.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Returns indices into `jobs`, first-to-place first.
    pub fn sort_indices<J: Borrow<Job>>(&self, jobs: &[J], context: &DispatchContext) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..jobs.len()).collect();
        indices.sort_by(|&a, &b| self.compare(jobs[a].borrow(), jobs[b].borrow(), context));
        indices
    }

    /// Jobs in placement order.
    pub fn sorted<'a, J: Borrow<Job>>(&self, jobs: &'a [J], context: &DispatchContext) -> Vec<&'a Job> {
        self.sort_indices(jobs, context)
            .into_iter()
            .map(|i| jobs[i].borrow())
            .collect()
    }

    /// Returns the index of the first job to place.
    pub fn select_best<J: Borrow<Job>>(&self, jobs: &[J], context: &DispatchContext) -> Option<usize> {
        self.sort_indices(jobs, context).first().copied()
    }

    /// Scores of a single job under each rule, in chain order.
    pub fn evaluate(&self, job: &Job, context: &DispatchContext) -> Vec<RuleScore> {
        self.rules.iter().map(|r| r.evaluate(job, context)).collect()
    }

    fn compare(&self, a: &Job, b: &Job, context: &DispatchContext) -> Ordering {
        for rule in &self.rules {
            let score_a = rule.evaluate(a, context);
            let score_b = rule.evaluate(b, context);

            if (score_a - score_b).abs() > self.epsilon {
                return score_a.total_cmp(&score_b);
            }
        }
        match &self.tie_breaker {
            TieBreaker::NextRule => Ordering::Equal,
            TieBreaker::ById => a.id.cmp(&b.id),
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::job_order()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("tie_breaker", &self.tie_breaker)
            .finish()
    }
}
