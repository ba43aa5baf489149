//! Conflict resolution.
//!
//! [`ConflictResolutionEngine`] turns one detected conflict into ranked
//! [`Resolution`](crate::models::Resolution) proposals.
//!
//! # Candidates per conflict type
//!
//! | Conflict | Candidates |
//! |----------|-----------|
//! | Time overlap, availability | Reschedule one assignment, reassign it |
//! | Capacity exceeded | Reschedule, reassign, split a splittable job, approve overtime |
//! | Skill mismatch | Reassign; otherwise manual reassignment to the best partial match |
//! | Travel distance | Resequence the day's route (2-opt), then reassign the later stop |
//! | Deadline risk | Earlier date with the same lead, otherwise with any lead |
//! | Geographic mismatch | Reassign |
//! | Workload imbalance | Move the least disruptive job of the busiest lead to an underloaded one |
//!
//! # Verification
//!
//! Every candidate is applied to a copy of the plan and the detector runs
//! again. A candidate is verified when the target conflict is gone or less
//! severe and no new medium-or-worse conflict touches a proposed
//! assignment. Rounds are bounded by
//! [`MAX_RESOLUTION_ITERATIONS`](crate::config::MAX_RESOLUTION_ITERATIONS);
//! an unverified conflict is escalated and marked not auto-resolvable.
//!
//! # Ranking
//!
//! Verified first, then ascending [`ImpactEstimate::total`], then method
//! (reschedule before reassign before split). The first is suggested; it is
//! never applied here.
//!
//! [`ImpactEstimate::total`]: crate::models::ImpactEstimate::total

mod engine;
pub mod route;

pub use engine::{apply, ConflictResolutionEngine, ResolutionOutcome};
