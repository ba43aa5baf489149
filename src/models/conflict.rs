//! Conflict model.
//!
//! Conflicts are recomputed from the current assignment state on every
//! scan; they are never persisted or patched in place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A detected scheduling conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Stable key derived from type and scope.
    pub id: String,
    /// Type of conflict.
    pub conflict_type: ConflictType,
    /// How bad it is.
    pub severity: Severity,
    /// Assignments involved, sorted.
    pub assignment_ids: Vec<String>,
    /// Technician the conflict is scoped to, if any.
    pub technician_id: Option<String>,
    /// Date of the affected assignments.
    pub date: NaiveDate,
    /// Ranking weight (higher = more urgent to resolve).
    pub impact_score: f64,
    /// Whether a resolution may be applied without operator review.
    pub auto_resolvable: bool,
    /// Human-readable description.
    pub message: String,
}

/// Classification of conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Two assignments for one technician overlap (buffer inclusive).
    TimeOverlap,
    /// Scheduled hours or jobs exceed daily capacity.
    CapacityExceeded,
    /// Travel between consecutive stops is too long.
    TravelDistance,
    /// Lead lacks a required skill.
    SkillMismatch,
    /// Assignment lies outside the technician's availability.
    Availability,
    /// Assignment date is after, or too close to, the job deadline.
    DeadlineRisk,
    /// Job lies outside the lead's travel radius.
    GeographicMismatch,
    /// Daily utilization is too uneven across the roster.
    WorkloadImbalance,
}

/// Conflict severity.
///
/// Ordered: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric rank (1 = low .. 4 = critical).
    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }
}

impl ConflictType {
    /// Snake-case name, used in conflict keys.
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictType::TimeOverlap => "time_overlap",
            ConflictType::CapacityExceeded => "capacity_exceeded",
            ConflictType::TravelDistance => "travel_distance",
            ConflictType::SkillMismatch => "skill_mismatch",
            ConflictType::Availability => "availability",
            ConflictType::DeadlineRisk => "deadline_risk",
            ConflictType::GeographicMismatch => "geographic_mismatch",
            ConflictType::WorkloadImbalance => "workload_imbalance",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Conflict {
    /// Creates a conflict over a set of assignments.
    ///
    /// The ID is `{type}:{sorted ids joined by '+'}`. Impact starts at zero;
    /// the detector fills it in.
    pub fn new(
        conflict_type: ConflictType,
        severity: Severity,
        date: NaiveDate,
        mut assignment_ids: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        assignment_ids.sort();
        assignment_ids.dedup();
        Self {
            id: format!("{conflict_type}:{}", assignment_ids.join("+")),
            conflict_type,
            severity,
            assignment_ids,
            technician_id: None,
            date,
            impact_score: 0.0,
            auto_resolvable: true,
            message: message.into(),
        }
    }

    /// Scopes the conflict to a technician-day; the ID becomes `{type}:{tech}:{date}`.
    pub fn for_technician_day(mut self, technician_id: impl Into<String>) -> Self {
        let technician_id = technician_id.into();
        self.id = format!("{}:{technician_id}:{}", self.conflict_type, self.date);
        self.technician_id = Some(technician_id);
        self
    }

    /// Scopes the conflict to a whole day; the ID becomes `{type}:{date}`.
    pub fn for_day(mut self) -> Self {
        self.id = format!("{}:{}", self.conflict_type, self.date);
        self
    }

    /// Records the technician without changing the ID.
    pub fn with_technician(mut self, technician_id: impl Into<String>) -> Self {
        self.technician_id = Some(technician_id.into());
        self
    }

    /// Sets auto-resolvability.
    pub fn with_auto_resolvable(mut self, auto_resolvable: bool) -> Self {
        self.auto_resolvable = auto_resolvable;
        self
    }

    /// Whether the conflict references `assignment_id`.
    pub fn involves(&self, assignment_id: &str) -> bool {
        self.assignment_ids.iter().any(|a| a == assignment_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn test_conflict_key_is_order_independent() {
        let a = Conflict::new(
            ConflictType::TimeOverlap,
            Severity::High,
            date(),
            vec!["b".into(), "a".into()],
            "overlap",
        );
        let b = Conflict::new(
            ConflictType::TimeOverlap,
            Severity::High,
            date(),
            vec!["a".into(), "b".into()],
            "overlap",
        );
        assert_eq!(a.id, "time_overlap:a+b");
        assert_eq!(a.id, b.id);
        assert_eq!(a.assignment_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_scoped_keys() {
        let c = Conflict::new(ConflictType::CapacityExceeded, Severity::Medium, date(), vec![], "")
            .for_technician_day("T1");
        assert_eq!(c.id, "capacity_exceeded:T1:2024-06-03");
        assert_eq!(c.technician_id.as_deref(), Some("T1"));

        let d = Conflict::new(ConflictType::WorkloadImbalance, Severity::Low, date(), vec![], "")
            .for_day();
        assert_eq!(d.id, "workload_imbalance:2024-06-03");
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::Critical.rank(), 4);
    }

    #[test]
    fn test_conflict_type_serializes_snake_case() {
        let json = serde_json::to_string(&ConflictType::GeographicMismatch).unwrap();
        assert_eq!(json, "\"geographic_mismatch\"");
    }
}
