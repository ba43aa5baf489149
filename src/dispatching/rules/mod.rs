//! Built-in dispatching rules.
//!
//! # Categories
//!
//! - **Time-based**: SPT, LPT
//! - **Due-date**: EDD, MST
//! - **Priority**: PRIORITY
//!
//! Due-date rules measure in days from [`DispatchContext::reference_date`].
//! Jobs without a deadline sort after every job with one.
//!
//! # Score Convention
//! All rules return lower scores for jobs to place first.

use super::{DispatchContext, DispatchingRule, RuleScore};
use crate::models::{Job, DAY_MS};

// ======================== Time-based rules ========================

/// Shortest Processing Time.
///
/// # Reference
/// Smith (1956), optimal for minimizing mean flow time on single machine.
#[derive(Debug, Clone, Copy)]
pub struct Spt;

impl DispatchingRule for Spt {
    fn name(&self) -> &'static str {
        "SPT"
    }

    fn evaluate(&self, job: &Job, _context: &DispatchContext) -> RuleScore {
        job.duration_ms as f64
    }

    fn description(&self) -> &'static str {
        "Shortest Processing Time"
    }
}

/// Longest Processing Time.
///
/// Long jobs first, so they claim whole free days before short jobs
/// fragment them.
#[derive(Debug, Clone, Copy)]
pub struct Lpt;

impl DispatchingRule for Lpt {
    fn name(&self) -> &'static str {
        "LPT"
    }

    fn evaluate(&self, job: &Job, _context: &DispatchContext) -> RuleScore {
        -(job.duration_ms as f64)
    }

    fn description(&self) -> &'static str {
        "Longest Processing Time"
    }
}

// ======================== Due-date rules ========================

/// Earliest Due Date.
///
/// # Reference
/// Jackson (1955), optimal for minimizing maximum lateness on single machine.
#[derive(Debug, Clone, Copy)]
pub struct Edd;

impl DispatchingRule for Edd {
    fn name(&self) -> &'static str {
        "EDD"
    }

    fn evaluate(&self, job: &Job, context: &DispatchContext) -> RuleScore {
        job.deadline
            .map(|d| context.days_until(d) as f64)
            .unwrap_or(f64::MAX)
    }

    fn description(&self) -> &'static str {
        "Earliest Due Date"
    }
}

/// Minimum Slack Time.
///
/// Slack = days until deadline − job duration in days.
#[derive(Debug, Clone, Copy)]
pub struct Mst;

impl DispatchingRule for Mst {
    fn name(&self) -> &'static str {
        "MST"
    }

    fn evaluate(&self, job: &Job, context: &DispatchContext) -> RuleScore {
        let Some(deadline) = job.deadline else {
            return f64::MAX;
        };
        context.days_until(deadline) as f64 - job.duration_ms as f64 / DAY_MS as f64
    }

    fn description(&self) -> &'static str {
        "Minimum Slack Time"
    }
}

// ======================== Priority-based rule ========================

/// Customer priority, urgent first.
#[derive(Debug, Clone, Copy)]
pub struct Priority;

impl DispatchingRule for Priority {
    fn name(&self) -> &'static str {
        "PRIORITY"
    }

    fn evaluate(&self, job: &Job, _context: &DispatchContext) -> RuleScore {
        -f64::from(job.priority.rank())
    }

    fn description(&self) -> &'static str {
        "Job Priority"
    }
}
