//! Candidate scoring.
//!
//! Scores a (job, technician, day) candidate in `[0, 1]`, higher is better,
//! as the weighted mean of six explainable terms:
//!
//! | Term | Score |
//! |------|-------|
//! | skill | fraction of required skills held |
//! | proximity | `1 - distance / travel_radius` from the previous stop |
//! | workload | 1.0 at or below the day's median utilization, falling above it |
//! | availability | 1.0 inside a declared window, else 0.0 |
//! | priority | job priority rank / 4 |
//! | preference | 1.0 preferred, 0.5 no preference given, 0.0 not preferred |
//!
//! A candidate holding none of the required skills is disqualified and
//! scores 0 unless skill requirements are overridden.

use serde::{Deserialize, Serialize};

use crate::geo::TravelEstimate;
use crate::models::{AutoAssignmentCriteria, Job, ScoringWeights, Technician};

/// One weighted term of a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveTerm {
    pub name: String,
    pub weight: f64,
    /// Raw score in `[0, 1]`.
    pub score: f64,
    /// `weight * score`.
    pub contribution: f64,
}

impl ObjectiveTerm {
    /// Creates a term; the score is clamped to `[0, 1]`.
    pub fn new(name: impl Into<String>, weight: f64, score: f64) -> Self {
        let weight = weight.max(0.0);
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self {
            name: name.into(),
            weight,
            score,
            contribution: weight * score,
        }
    }
}

/// Explained score for one candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub terms: Vec<ObjectiveTerm>,
    /// Weighted mean of the terms, or 0.0 when disqualified.
    pub total: f64,
    /// Failed the skill hard constraint.
    pub disqualified: bool,
}

impl ScoreBreakdown {
    /// Looks up a term by name.
    pub fn term(&self, name: &str) -> Option<&ObjectiveTerm> {
        self.terms.iter().find(|t| t.name == name)
    }

    /// The term contributing most.
    pub fn top_term(&self) -> Option<&ObjectiveTerm> {
        self.terms
            .iter()
            .max_by(|a, b| a.contribution.total_cmp(&b.contribution))
    }
}

/// Pass state the score depends on.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    /// Leg from the previous stop that day (home base if first).
    pub travel: TravelEstimate,
    /// Technician's utilization on the day before this job.
    pub utilization: f64,
    /// Median utilization of working technicians on the day.
    pub median_utilization: f64,
    /// The proposed window is inside declared availability.
    pub available: bool,
    /// Skill requirements are overridden for this request.
    pub skill_override: bool,
}

/// Weighted candidate scorer.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    weights: ScoringWeights,
}

impl ScoringEngine {
    /// Creates an engine with explicit weights.
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Creates an engine from request criteria.
    pub fn from_criteria(criteria: &AutoAssignmentCriteria) -> Self {
        Self::new(criteria.effective_weights())
    }

    /// The weights in use.
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores a candidate.
    pub fn score(&self, job: &Job, technician: &Technician, inputs: &ScoreInputs) -> ScoreBreakdown {
        let w = &self.weights;
        let skill_ratio = technician.skill_match_ratio(&job.required_skills);

        let terms = vec![
            ObjectiveTerm::new("skill", w.skill, skill_ratio),
            ObjectiveTerm::new(
                "proximity",
                w.proximity,
                proximity_score(inputs.travel.distance_m, technician.travel_radius_m),
            ),
            ObjectiveTerm::new(
                "workload",
                w.workload,
                workload_score(inputs.utilization, inputs.median_utilization),
            ),
            ObjectiveTerm::new("availability", w.availability, f64::from(u8::from(inputs.available))),
            ObjectiveTerm::new("priority", w.priority, job.priority.weight()),
            ObjectiveTerm::new(
                "preference",
                w.preference,
                match job.prefers(&technician.id) {
                    Some(true) => 1.0,
                    Some(false) => 0.0,
                    None => 0.5,
                },
            ),
        ];

        let disqualified = skill_ratio <= 0.0 && !inputs.skill_override;
        let weight_sum: f64 = terms.iter().map(|t| t.weight).sum();
        let total = if disqualified || weight_sum <= 0.0 {
            0.0
        } else {
            terms.iter().map(|t| t.contribution).sum::<f64>() / weight_sum
        };

        ScoreBreakdown {
            terms,
            total,
            disqualified,
        }
    }
}

fn proximity_score(distance_m: f64, radius_m: f64) -> f64 {
    if radius_m <= 0.0 {
        return 0.0;
    }
    (1.0 - distance_m / radius_m).clamp(0.0, 1.0)
}

fn workload_score(utilization: f64, median: f64) -> f64 {
    if utilization <= median {
        1.0
    } else {
        (1.0 - (utilization - median)).clamp(0.0, 1.0)
    }
}
