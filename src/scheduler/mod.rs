//! Greedy auto-assignment, capacity accounting and plan metrics.
//!
//! # Algorithm
//!
//! [`AutoAssignmentEngine`] uses a greedy, priority-driven, best-score
//! heuristic over (job, technician, date) candidates. It is not optimal,
//! but it is explainable, deterministic and bounded at O(J · T · D).
//!
//! # Capacity
//!
//! [`WorkloadTracker`] keeps per-technician-day load for one pass;
//! [`PlanningState`] layers each technician's ordered route on top of it
//! and finds open slots.
//!
//! # Metrics
//!
//! [`metrics::evaluate`] computes travel, utilization and improvement over
//! a naive round-trip baseline.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Solomon (1987), "Algorithms for the Vehicle Routing and Scheduling
//!   Problems with Time Window Constraints"

mod auto;
pub mod metrics;
mod state;
mod workload;

pub use auto::{
    candidate_dates, AssignmentPass, AutoAssignmentEngine, CandidateEvaluation, Disqualification,
};
pub(crate) use state::round_up;
pub use state::{PlanningState, Slot, Stop};
pub use workload::{DayLoad, Workload, WorkloadTracker};
