//! Scheduling results.
//!
//! Everything the engine hands back to the caller: proposed assignments,
//! jobs it could not place (with a reason), conflicts, resolutions,
//! supersede instructions and metrics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Assignment, Conflict, Resolution, SupersedeInstruction};

/// Outcome of a scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulingResult {
    /// Assignments proposed by this pass.
    pub assignments: Vec<Assignment>,
    /// Jobs that could not be placed.
    pub unassigned_jobs: Vec<UnassignedJob>,
    /// Conflicts over existing + proposed assignments.
    pub conflicts: Vec<Conflict>,
    /// Ranked resolutions (filled by a resolution pass).
    pub resolutions: Vec<Resolution>,
    /// Existing assignments the caller must mark replaced.
    pub superseded: Vec<SupersedeInstruction>,
    /// Quality metrics.
    pub metrics: OptimizationMetrics,
    /// Per-date breakdown.
    pub daily_schedules: Vec<DailySchedule>,
}

/// A job the engine could not place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnassignedJob {
    /// Job ID.
    pub job_id: String,
    /// Best disqualification reason across all candidates.
    pub reason: UnassignedReason,
    /// Human-readable detail.
    pub message: String,
}

/// Why a job could not be placed.
///
/// Variants are ordered by how far a candidate got through the hard
/// constraints; the furthest one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// The roster is empty.
    NoTechnicians,
    /// No technician holds the required skills.
    MissingSkills,
    /// No qualified technician within travel radius.
    OutsideTravelRadius,
    /// Every candidate date is after the deadline.
    DeadlinePassed,
    /// Every candidate is at capacity.
    CapacityExceeded,
    /// No open slot inside any availability window.
    NoAvailability,
    /// Every open slot needs too long a drive from the previous stop.
    TravelDistanceExceeded,
    /// The pass timed out before reaching the job.
    TimedOut,
}

impl fmt::Display for UnassignedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnassignedReason::NoTechnicians => "no technicians in roster",
            UnassignedReason::MissingSkills => "no technician holds the required skills",
            UnassignedReason::OutsideTravelRadius => "no technician within travel radius",
            UnassignedReason::DeadlinePassed => "no date on or before the deadline",
            UnassignedReason::CapacityExceeded => "all qualified technicians are at capacity",
            UnassignedReason::NoAvailability => "no open slot in any availability window",
            UnassignedReason::TravelDistanceExceeded => "travel from previous stop exceeds the maximum",
            UnassignedReason::TimedOut => "pass timed out before the job was reached",
        };
        f.write_str(text)
    }
}

/// Schedule quality indicators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    /// Total route distance, home base round trips included (meters).
    pub total_travel_distance_m: f64,
    /// Total route driving time (ms).
    pub total_travel_time_ms: i64,
    /// Variance of utilization over working technician-days.
    pub workload_variance: f64,
    /// Mean utilization over working technician-days (0.0..).
    pub utilization_rate: f64,
    /// Travel saved vs. one round trip per job, in percent.
    pub improvement_percentage: f64,
    /// Number of assignments counted.
    pub assignment_count: usize,
    /// Travel legs that fell back to great-circle estimates.
    pub approximate_legs: usize,
}

/// Schedule for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub date: NaiveDate,
    /// One entry per technician with work that day, sorted by technician ID.
    pub technicians: Vec<TechnicianDay>,
}

/// One technician's route on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicianDay {
    pub technician_id: String,
    /// Assignment IDs in visiting order.
    pub assignment_ids: Vec<String>,
    /// Hours on site.
    pub scheduled_hours: f64,
    /// Route distance including home base legs (meters).
    pub travel_distance_m: f64,
    /// Scheduled hours / capacity.
    pub utilization: f64,
}

/// What the caller should do with a bulk result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitInstruction {
    /// Persist the proposed assignments and supersede instructions.
    Commit,
    /// Dry run: show, do not persist.
    DoNotCommit,
}

/// Outcome of a bulk assignment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAssignmentResult {
    /// Full scheduling result for the requested jobs.
    pub result: SchedulingResult,
    /// Job IDs the caller asked for.
    pub requested_job_ids: Vec<String>,
    /// Requested jobs that received an assignment.
    pub assigned_job_ids: Vec<String>,
    /// Requested jobs that did not.
    pub failed_job_ids: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Commit boundary for the caller.
    pub commit: CommitInstruction,
}

impl SchedulingResult {
    /// Whether the pass produced no conflicts.
    pub fn is_conflict_free(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Finds a proposed assignment for a job.
    pub fn assignment_for_job(&self, job_id: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.job_id == job_id)
    }

    /// All proposed assignments for a technician (lead or assistant).
    pub fn assignments_for_technician(&self, technician_id: &str) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| a.involves(technician_id))
            .collect()
    }

    /// Finds an unassigned entry for a job.
    pub fn unassigned(&self, job_id: &str) -> Option<&UnassignedJob> {
        self.unassigned_jobs.iter().find(|u| u.job_id == job_id)
    }

    /// Number of proposed assignments.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Resolutions targeting a conflict, ranked.
    pub fn resolutions_for(&self, conflict_id: &str) -> Vec<&Resolution> {
        self.resolutions
            .iter()
            .filter(|r| r.conflict_id == conflict_id)
            .collect()
    }
}

impl BulkAssignmentResult {
    /// Whether every requested job was assigned.
    pub fn is_complete(&self) -> bool {
        self.failed_job_ids.is_empty()
    }
}
