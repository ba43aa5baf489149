//! Job ordering for the greedy assignment pass.
//!
//! The greedy engine places jobs one at a time, so the order it visits
//! them in decides who gets the best slots. Ordering is expressed as a
//! chain of dispatching rules evaluated by a [`RuleEngine`]. The request's
//! [`JobOrdering`](crate::models::JobOrdering) picks the chain; the default
//! is descending priority, then earliest deadline, then job ID.
//!
//! # Usage
//!
//! ```
//! use chrono::NaiveDate;
//! use u_crew::dispatching::{rules, DispatchContext, RuleEngine, TieBreaker};
//! use u_crew::models::{GeoPoint, Job, Priority};
//!
//! let engine = RuleEngine::new()
//!     .with_rule(rules::Priority)
//!     .with_rule(rules::Edd)
//!     .with_final_tie_breaker(TieBreaker::ById);
//!
//! let context = DispatchContext::on(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
//! let jobs = vec![
//!     Job::new("J1", GeoPoint::new(40.0, -74.0)),
//!     Job::new("J2", GeoPoint::new(40.1, -74.0)).with_priority(Priority::Urgent),
//! ];
//! assert_eq!(engine.select_best(&jobs, &context), Some(1));
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

mod context;
mod engine;
pub mod rules;

pub use context::DispatchContext;
pub use engine::{RuleEngine, TieBreaker};

use crate::models::Job;
use std::fmt::Debug;

/// Score returned by a dispatching rule.
///
/// Lower scores = visited first.
pub type RuleScore = f64;

/// A dispatching rule that ranks jobs.
///
/// # Score Convention
/// **Lower score = higher priority.** Rules should return smaller values
/// for jobs that should be placed first.
pub trait DispatchingRule: Send + Sync + Debug {
    /// Rule name (e.g., "EDD").
    fn name(&self) -> &'static str;

    /// Evaluates a job; lower = placed earlier.
    fn evaluate(&self, job: &Job, context: &DispatchContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}
