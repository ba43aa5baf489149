//! Resolution model.
//!
//! A resolution is a ranked *proposal* for removing one conflict. Applying
//! it re-enters the assignment/conflict pipeline; nothing here is final.

use serde::{Deserialize, Serialize};

use super::{Assignment, SupersedeInstruction};

/// A candidate fix for a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Conflict this resolution targets.
    pub conflict_id: String,
    /// Kind of fix.
    pub method: ResolutionMethod,
    /// Ordered steps the caller (or operator) would carry out.
    pub steps: Vec<ResolutionStep>,
    /// Estimated cost of the fix.
    pub impact: ImpactEstimate,
    /// New or modified assignments this resolution proposes.
    pub proposed_assignments: Vec<Assignment>,
    /// Existing assignments this resolution replaces.
    pub superseded: Vec<SupersedeInstruction>,
    /// Passed the re-detection check.
    pub verified: bool,
    /// Lowest-impact verified candidate for its conflict.
    pub suggested: bool,
}

/// Resolution method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Move the job to another technician chosen by the auto-assigner.
    AutoReassign,
    /// Operator should pick a technician; a best-effort candidate is attached.
    ManualReassign,
    /// Move the job to another slot or date for the same technician.
    Reschedule,
    /// Split the job across days.
    Split,
    /// Accept the conflict (e.g. approve overtime).
    Override,
    /// Hand the conflict to a dispatcher.
    Escalate,
}

/// One step in executing a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionStep {
    /// 1-based position.
    pub order: u32,
    /// What to do.
    pub description: String,
    /// Assignment the step acts on, if any.
    pub assignment_id: Option<String>,
}

/// Estimated impact of a resolution. All components are in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    /// Disruption to the customer (date moves, technician swaps).
    pub customer: f64,
    /// Disruption to the crew (schedules touched).
    pub team: f64,
    /// Added cost (travel, overtime).
    pub cost: f64,
    /// Time needed to carry the fix out.
    pub time: f64,
}

impl ImpactEstimate {
    /// Creates an estimate, clamping each component to [0, 1].
    pub fn new(customer: f64, team: f64, cost: f64, time: f64) -> Self {
        Self {
            customer: customer.clamp(0.0, 1.0),
            team: team.clamp(0.0, 1.0),
            cost: cost.clamp(0.0, 1.0),
            time: time.clamp(0.0, 1.0),
        }
    }

    /// Weighted total used for ranking (customer counts most).
    pub fn total(&self) -> f64 {
        0.4 * self.customer + 0.25 * self.team + 0.2 * self.cost + 0.15 * self.time
    }
}

impl Resolution {
    /// Creates an unverified resolution.
    pub fn new(conflict_id: impl Into<String>, method: ResolutionMethod, impact: ImpactEstimate) -> Self {
        Self {
            conflict_id: conflict_id.into(),
            method,
            steps: Vec::new(),
            impact,
            proposed_assignments: Vec::new(),
            superseded: Vec::new(),
            verified: false,
            suggested: false,
        }
    }

    /// Appends a step.
    pub fn with_step(mut self, description: impl Into<String>, assignment_id: Option<String>) -> Self {
        let order = self.steps.len() as u32 + 1;
        self.steps.push(ResolutionStep {
            order,
            description: description.into(),
            assignment_id,
        });
        self
    }

    /// Adds a proposed assignment.
    pub fn with_assignment(mut self, assignment: Assignment) -> Self {
        self.proposed_assignments.push(assignment);
        self
    }

    /// Adds a supersede instruction.
    pub fn superseding(mut self, instruction: SupersedeInstruction) -> Self {
        self.superseded.push(instruction);
        self
    }

    /// Whether applying this resolution changes the assignment set.
    pub fn changes_assignments(&self) -> bool {
        !self.proposed_assignments.is_empty() || !self.superseded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_total_weights() {
        let all = ImpactEstimate::new(1.0, 1.0, 1.0, 1.0);
        assert!((all.total() - 1.0).abs() < 1e-10);

        let customer_only = ImpactEstimate::new(1.0, 0.0, 0.0, 0.0);
        assert!((customer_only.total() - 0.4).abs() < 1e-10);
    }

    #[test]
    fn test_impact_clamped() {
        let i = ImpactEstimate::new(2.0, -1.0, 0.5, 0.5);
        assert!((i.customer - 1.0).abs() < 1e-10);
        assert!((i.team - 0.0).abs() < 1e-10);
    }

    #[test]
    fn test_steps_are_numbered() {
        let r = Resolution::new("c1", ResolutionMethod::Escalate, ImpactEstimate::default())
            .with_step("notify dispatcher", None)
            .with_step("hold job", Some("a1".into()));
        assert_eq!(r.steps[0].order, 1);
        assert_eq!(r.steps[1].order, 2);
        assert!(!r.changes_assignments());
    }
}
