//! Assignment model.
//!
//! An assignment links a job to a lead (and optional assistant) on a
//! date and time window. The engine only ever creates *proposed*
//! assignments; the caller commits them. Replacing an assignment is
//! expressed as a [`SupersedeInstruction`], never as an in-place edit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::calendar::HOUR_MS;
use super::TimeWindow;

/// A job-technician-date assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique assignment identifier.
    pub id: String,
    /// Assigned job ID.
    pub job_id: String,
    /// Lead technician ID.
    pub lead_id: String,
    /// Assistant technician ID, if any.
    pub assistant_id: Option<String>,
    /// Date the work happens.
    pub date: NaiveDate,
    /// Time of day the crew is on site.
    pub window: TimeWindow,
    /// Lifecycle state.
    pub status: AssignmentStatus,
    /// Lead's utilization on `date` after this assignment (0.0 = idle, 1.0 = full).
    pub workload_score: f64,
    /// Desirability score of the chosen candidate (0.0..=1.0).
    pub efficiency_score: f64,
    /// Skill requirements were explicitly overridden for this assignment.
    pub skill_override: bool,
    /// Set when this is one part of a split job.
    pub split_part: Option<SplitPart>,
    /// Non-fatal issues attached while building the assignment.
    pub warnings: Vec<AssignmentWarning>,
}

/// Assignment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Created by the engine, not yet persisted.
    Proposed,
    /// Persisted by the caller.
    Committed,
    /// Superseded by a newer assignment; kept for the audit trail.
    Replaced,
}

/// One part of a job split across several assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPart {
    /// 1-based part index.
    pub index: u32,
    /// Total number of parts.
    pub count: u32,
}

/// Non-fatal issue attached to an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AssignmentWarning {
    /// Travel to this stop was estimated from great-circle distance.
    ApproximateDistance { from: String, to: String },
    /// The job wants an assistant but none could be scheduled.
    AssistantUnavailable,
}

/// Instruction to the caller to mark an existing assignment as replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupersedeInstruction {
    /// Assignment to mark [`AssignmentStatus::Replaced`].
    pub assignment_id: String,
    /// Assignment that takes over, if any.
    pub replaced_by: Option<String>,
    /// Why it is being replaced.
    pub reason: String,
}

impl Assignment {
    /// Creates a proposed assignment with a deterministic ID.
    pub fn new(
        job_id: impl Into<String>,
        lead_id: impl Into<String>,
        date: NaiveDate,
        window: TimeWindow,
    ) -> Self {
        let job_id = job_id.into();
        let lead_id = lead_id.into();
        Self {
            id: Self::proposal_id(&job_id, &lead_id, date, &window),
            job_id,
            lead_id,
            assistant_id: None,
            date,
            window,
            status: AssignmentStatus::Proposed,
            workload_score: 0.0,
            efficiency_score: 0.0,
            skill_override: false,
            split_part: None,
            warnings: Vec::new(),
        }
    }

    /// Deterministic identifier: `{job}/{lead}/{date}T{HHMM}`.
    pub fn proposal_id(job_id: &str, lead_id: &str, date: NaiveDate, window: &TimeWindow) -> String {
        format!("{job_id}/{lead_id}/{date}T{}", window.start_hhmm())
    }

    /// Overrides the generated ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the assistant.
    pub fn with_assistant(mut self, assistant_id: impl Into<String>) -> Self {
        self.assistant_id = Some(assistant_id.into());
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: AssignmentStatus) -> Self {
        self.status = status;
        self
    }

    /// Marks the assignment as committed.
    pub fn committed(self) -> Self {
        self.with_status(AssignmentStatus::Committed)
    }

    /// Marks this assignment as one part of a split job.
    pub fn with_split_part(mut self, index: u32, count: u32) -> Self {
        self.split_part = Some(SplitPart { index, count });
        self.id = format!("{}#{index}", self.id);
        self
    }

    /// Adds a warning, ignoring exact duplicates.
    pub fn push_warning(&mut self, warning: AssignmentWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Duration on site (ms).
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.window.duration_ms()
    }

    /// Duration on site in hours.
    pub fn duration_hours(&self) -> f64 {
        self.duration_ms() as f64 / HOUR_MS as f64
    }

    /// Whether the assignment still counts (not replaced).
    pub fn is_active(&self) -> bool {
        self.status != AssignmentStatus::Replaced
    }

    /// Whether `technician_id` works on this assignment (lead or assistant).
    pub fn involves(&self, technician_id: &str) -> bool {
        self.lead_id == technician_id || self.assistant_id.as_deref() == Some(technician_id)
    }

    /// Lead followed by the assistant, if any.
    pub fn technician_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.lead_id.as_str()).chain(self.assistant_id.as_deref())
    }
}

impl SupersedeInstruction {
    /// Creates a supersede instruction.
    pub fn new(
        assignment_id: impl Into<String>,
        replaced_by: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            assignment_id: assignment_id.into(),
            replaced_by,
            reason: reason.into(),
        }
    }
}
