//! Scheduling request and assignment criteria.
//!
//! A request is an in-memory snapshot supplied by the caller: jobs,
//! technicians and existing assignments (already tenant-scoped and
//! geocoded), an optional distance matrix, the date range to plan, and
//! the knobs that shape the pass.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Assignment, Job, Technician};
use crate::geo::DistanceMatrix;

/// Input container for a scheduling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingRequest {
    /// Jobs in scope.
    pub jobs: Vec<Job>,
    /// Technician roster.
    pub technicians: Vec<Technician>,
    /// Assignments that already exist (committed or proposed).
    pub existing_assignments: Vec<Assignment>,
    /// Known travel distances and durations.
    pub distance_matrix: DistanceMatrix,
    /// First date to plan (inclusive).
    pub start_date: NaiveDate,
    /// Last date to plan (inclusive).
    pub end_date: NaiveDate,
    /// Hard-constraint switches.
    pub constraints: AssignmentConstraints,
    /// Scoring preferences.
    pub criteria: AutoAssignmentCriteria,
    /// Apply suggested resolutions without operator review.
    pub auto_resolve_conflicts: bool,
    /// Upper bound on the greedy pass. Jobs not reached are reported as timed out.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

/// Hard-constraint switches for a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentConstraints {
    /// Allow exceeding daily capacity.
    pub allow_overtime_assignment: bool,
    /// Maximum distance from the previous stop (meters). `None` = unlimited.
    pub max_travel_distance_m: Option<f64>,
    /// Allow technicians missing required skills.
    pub override_skill_requirements: bool,
}

/// What the pass should favor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationGoal {
    /// Equal emphasis on every factor.
    #[default]
    Balanced,
    /// Short routes first.
    MinimizeTravel,
    /// Even utilization across the roster.
    BalanceWorkload,
    /// Best-qualified technicians.
    MaximizeSkillMatch,
    /// Urgent work and customer preferences.
    PrioritizeUrgent,
}

/// Order the greedy pass visits pending jobs in.
///
/// Every ordering ranks by descending priority first and breaks the last
/// tie by job ID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOrdering {
    /// Earliest deadline next.
    #[default]
    PriorityDeadline,
    /// Shortest job next, then earliest deadline.
    ShortestFirst,
    /// Longest job next, then earliest deadline.
    LongestFirst,
    /// Least slack (days to deadline minus job length) next.
    LeastSlack,
}

/// Relative weights of the scoring factors.
///
/// Weights need not sum to one; the score is normalized by their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub skill: f64,
    pub proximity: f64,
    pub workload: f64,
    pub availability: f64,
    pub priority: f64,
    pub preference: f64,
}

/// Scoring preferences for auto-assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoAssignmentCriteria {
    /// Preset used when `weights` is not given.
    pub goal: OptimizationGoal,
    /// Explicit weights; overrides `goal`.
    pub weights: Option<ScoringWeights>,
    /// Job visiting order.
    #[serde(default)]
    pub ordering: JobOrdering,
}

impl ScoringWeights {
    /// Equal emphasis on every factor.
    pub fn equal() -> Self {
        Self {
            skill: 1.0,
            proximity: 1.0,
            workload: 1.0,
            availability: 1.0,
            priority: 1.0,
            preference: 1.0,
        }
    }

    /// Preset weights for a goal.
    pub fn for_goal(goal: OptimizationGoal) -> Self {
        let equal = Self::equal();
        match goal {
            OptimizationGoal::Balanced => equal,
            OptimizationGoal::MinimizeTravel => Self {
                proximity: 3.0,
                ..equal
            },
            OptimizationGoal::BalanceWorkload => Self {
                workload: 3.0,
                ..equal
            },
            OptimizationGoal::MaximizeSkillMatch => Self {
                skill: 3.0,
                ..equal
            },
            OptimizationGoal::PrioritizeUrgent => Self {
                priority: 2.0,
                preference: 2.0,
                ..equal
            },
        }
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.skill + self.proximity + self.workload + self.availability + self.priority + self.preference
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::equal()
    }
}

impl AutoAssignmentCriteria {
    /// Criteria for a goal preset.
    pub fn for_goal(goal: OptimizationGoal) -> Self {
        Self {
            goal,
            ..Self::default()
        }
    }

    /// Same criteria with another job ordering.
    pub fn with_ordering(mut self, ordering: JobOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Weights in effect.
    pub fn effective_weights(&self) -> ScoringWeights {
        self.weights
            .unwrap_or_else(|| ScoringWeights::for_goal(self.goal))
    }
}

impl SchedulingRequest {
    /// Creates a request for the inclusive date range `[start_date, end_date]`.
    pub fn new(
        jobs: Vec<Job>,
        technicians: Vec<Technician>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            jobs,
            technicians,
            existing_assignments: Vec::new(),
            distance_matrix: DistanceMatrix::new(),
            start_date,
            end_date,
            constraints: AssignmentConstraints::default(),
            criteria: AutoAssignmentCriteria::default(),
            auto_resolve_conflicts: false,
            timeout: None,
        }
    }

    /// Creates a single-day request.
    pub fn for_day(jobs: Vec<Job>, technicians: Vec<Technician>, date: NaiveDate) -> Self {
        Self::new(jobs, technicians, date, date)
    }

    /// Sets existing assignments.
    pub fn with_existing_assignments(mut self, assignments: Vec<Assignment>) -> Self {
        self.existing_assignments = assignments;
        self
    }

    /// Sets the distance matrix.
    pub fn with_distance_matrix(mut self, matrix: DistanceMatrix) -> Self {
        self.distance_matrix = matrix;
        self
    }

    /// Sets the hard-constraint switches.
    pub fn with_constraints(mut self, constraints: AssignmentConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Allows or forbids overtime.
    pub fn with_overtime(mut self, allow: bool) -> Self {
        self.constraints.allow_overtime_assignment = allow;
        self
    }

    /// Sets the scoring criteria.
    pub fn with_criteria(mut self, criteria: AutoAssignmentCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Enables automatic application of suggested resolutions.
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve_conflicts = auto_resolve;
        self
    }

    /// Bounds the greedy pass.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Dates in the range, ascending. Empty if the range is degenerate.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start_date
            .iter_days()
            .take_while(|d| *d <= self.end_date)
            .collect()
    }

    /// Looks up a job by ID.
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Looks up a technician by ID.
    pub fn technician(&self, id: &str) -> Option<&Technician> {
        self.technicians.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn test_dates_inclusive() {
        let req = SchedulingRequest::new(vec![], vec![], d(3), d(5));
        assert_eq!(req.dates(), vec![d(3), d(4), d(5)]);

        let single = SchedulingRequest::for_day(vec![], vec![], d(3));
        assert_eq!(single.dates(), vec![d(3)]);
    }

    #[test]
    fn test_degenerate_range_has_no_dates() {
        let req = SchedulingRequest::new(vec![], vec![], d(5), d(3));
        assert!(req.dates().is_empty());
    }

    #[test]
    fn test_goal_presets() {
        let travel = ScoringWeights::for_goal(OptimizationGoal::MinimizeTravel);
        assert!((travel.proximity - 3.0).abs() < 1e-10);
        assert!((travel.sum() - 8.0).abs() < 1e-10);

        let explicit = AutoAssignmentCriteria {
            goal: OptimizationGoal::MinimizeTravel,
            weights: Some(ScoringWeights::equal()),
            ordering: JobOrdering::default(),
        };
        assert_eq!(explicit.effective_weights(), ScoringWeights::equal());
    }

    #[test]
    fn test_ordering_defaults_when_absent() {
        let criteria: AutoAssignmentCriteria =
            serde_json::from_str(r#"{"goal":"minimize_travel","weights":null}"#).unwrap();
        assert_eq!(criteria.ordering, JobOrdering::PriorityDeadline);

        let criteria: AutoAssignmentCriteria = serde_json::from_str(
            r#"{"goal":"balanced","weights":null,"ordering":"least_slack"}"#,
        )
        .unwrap();
        assert_eq!(criteria.ordering, JobOrdering::LeastSlack);
    }

    #[test]
    fn test_lookup() {
        let job = Job::new("J1", GeoPoint::new(0.0, 0.0));
        let req = SchedulingRequest::for_day(vec![job], vec![], d(3));
        assert!(req.job("J1").is_some());
        assert!(req.job("J2").is_none());
        assert!(req.technician("T1").is_none());
    }
}
