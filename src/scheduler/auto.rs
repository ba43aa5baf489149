//! Greedy auto-assignment.
//!
//! # Algorithm
//!
//! 1. Order jobs with the dispatching [`RuleEngine`] built from the
//!    criteria's [`JobOrdering`](crate::models::JobOrdering) (by default
//!    priority, then deadline, then ID).
//! 2. For each job, evaluate every lead technician on every candidate date
//!    (date-major, then technician ID) against the hard constraints, in
//!    stage order: skill, travel radius, deadline, capacity, availability,
//!    travel distance.
//! 3. Score the survivors and place the strictly best one; the
//!    [`PlanningState`] updates immediately so later jobs see the load.
//! 4. A job with no survivor is reported unassigned with the reason of the
//!    candidate that got furthest.
//!
//! # Complexity
//! O(J · T · D) slot searches for J jobs, T technicians, D dates.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::metrics;
use super::state::{PlanningState, Slot};
use crate::detection::ConflictDetector;
use crate::dispatching::{DispatchContext, RuleEngine};
use crate::models::{
    Assignment, AssignmentWarning, AutoAssignmentCriteria, Job, SchedulingResult, Technician,
    TechnicianRole, TimeWindow, UnassignedJob, UnassignedReason,
};
use crate::scoring::{ScoreBreakdown, ScoreInputs, ScoringEngine};
use crate::snapshot::Snapshot;

/// Why a candidate (or a whole job) was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Disqualification {
    pub reason: UnassignedReason,
    pub detail: String,
}

impl Disqualification {
    pub fn new(reason: UnassignedReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Outcome of checking one (job, technician, date) candidate.
#[derive(Debug, Clone)]
pub struct CandidateEvaluation {
    pub technician_id: String,
    pub date: NaiveDate,
    /// All-zero when disqualified.
    pub score: ScoreBreakdown,
    /// Earliest open slot; set when the candidate passed.
    pub slot: Option<Slot>,
    /// Passed only because skill requirements are overridden.
    pub skill_override: bool,
    pub disqualification: Option<Disqualification>,
}

impl CandidateEvaluation {
    /// Passed every hard constraint.
    pub fn is_feasible(&self) -> bool {
        self.disqualification.is_none() && self.slot.is_some()
    }

    fn rejected(technician_id: &str, date: NaiveDate, reason: UnassignedReason, detail: String) -> Self {
        Self {
            technician_id: technician_id.to_string(),
            date,
            score: ScoreBreakdown::default(),
            slot: None,
            skill_override: false,
            disqualification: Some(Disqualification::new(reason, detail)),
        }
    }
}

/// Proposed assignments and rejected jobs of one greedy pass.
#[derive(Debug, Clone, Default)]
pub struct AssignmentPass {
    pub proposed: Vec<Assignment>,
    pub unassigned: Vec<UnassignedJob>,
}

/// Greedy, single-pass job allocator.
#[derive(Debug, Clone)]
pub struct AutoAssignmentEngine {
    scoring: ScoringEngine,
    order: RuleEngine,
    detector: ConflictDetector,
    timeout: Option<Duration>,
}

impl AutoAssignmentEngine {
    /// Creates an engine scoring with `criteria`.
    pub fn new(criteria: &AutoAssignmentCriteria) -> Self {
        Self {
            scoring: ScoringEngine::from_criteria(criteria),
            order: RuleEngine::for_ordering(criteria.ordering),
            detector: ConflictDetector::standard(),
            timeout: None,
        }
    }

    /// Replaces the detector used after the pass.
    pub fn with_detector(mut self, detector: ConflictDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Bounds the greedy loop.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn detector(&self) -> &ConflictDetector {
        &self.detector
    }

    /// Checks one candidate against every hard constraint and scores it.
    pub fn evaluate(
        &self,
        state: &PlanningState<'_>,
        job: &Job,
        technician: &Technician,
        date: NaiveDate,
    ) -> CandidateEvaluation {
        self.evaluate_for(state, job, technician, date, job.duration_ms)
    }

    /// Like [`evaluate`](Self::evaluate) for a partial duration.
    pub fn evaluate_for(
        &self,
        state: &PlanningState<'_>,
        job: &Job,
        technician: &Technician,
        date: NaiveDate,
        duration_ms: i64,
    ) -> CandidateEvaluation {
        let median = state.tracker.median_utilization(date);
        self.evaluate_with(state, job, technician, date, duration_ms, median)
    }

    fn evaluate_with(
        &self,
        state: &PlanningState<'_>,
        job: &Job,
        technician: &Technician,
        date: NaiveDate,
        duration_ms: i64,
        median_utilization: f64,
    ) -> CandidateEvaluation {
        let snapshot = state.snapshot();
        let constraints = &snapshot.constraints;
        let tech = technician.id.as_str();

        if !technician.covers_skills(&job.required_skills) && !constraints.override_skill_requirements
        {
            return CandidateEvaluation::rejected(
                tech,
                date,
                UnassignedReason::MissingSkills,
                format!("{tech} lacks skills for '{}'", job.id),
            );
        }
        let skill_override = !technician.covers_skills(&job.required_skills);

        let home = snapshot.home_leg(technician, job);
        if home.distance_m > technician.travel_radius_m {
            return CandidateEvaluation::rejected(
                tech,
                date,
                UnassignedReason::OutsideTravelRadius,
                format!(
                    "'{}' is {:.1} km from {tech}, radius {:.1} km",
                    job.id,
                    home.distance_m / 1000.0,
                    technician.travel_radius_m / 1000.0
                ),
            );
        }

        if job.deadline.is_some_and(|deadline| date > deadline) {
            return CandidateEvaluation::rejected(
                tech,
                date,
                UnassignedReason::DeadlinePassed,
                format!("{date} is after the deadline of '{}'", job.id),
            );
        }

        let overtime = constraints.allow_overtime_assignment;
        if !overtime && !state.tracker.fits(tech, date, duration_ms, 0) {
            return CandidateEvaluation::rejected(
                tech,
                date,
                UnassignedReason::CapacityExceeded,
                format!("{tech} has no capacity left on {date}"),
            );
        }

        let Some(slot) = state.find_slot(tech, job, date, duration_ms) else {
            return CandidateEvaluation::rejected(
                tech,
                date,
                UnassignedReason::NoAvailability,
                format!("{tech} has no open slot on {date}"),
            );
        };

        if !overtime && !state.tracker.fits(tech, date, duration_ms, slot.travel_delta_ms) {
            return CandidateEvaluation::rejected(
                tech,
                date,
                UnassignedReason::CapacityExceeded,
                format!("{tech} has no capacity left on {date} once travel is counted"),
            );
        }

        if let Some(max) = constraints.max_travel_distance_m {
            if slot.inbound.distance_m > max {
                return CandidateEvaluation::rejected(
                    tech,
                    date,
                    UnassignedReason::TravelDistanceExceeded,
                    format!(
                        "{:.1} km from '{}' exceeds {:.1} km",
                        slot.inbound.distance_m / 1000.0,
                        slot.inbound_from,
                        max / 1000.0
                    ),
                );
            }
        }

        let score = self.scoring.score(
            job,
            technician,
            &ScoreInputs {
                travel: slot.inbound,
                utilization: state.tracker.utilization(tech, date),
                median_utilization,
                available: true,
                skill_override: constraints.override_skill_requirements,
            },
        );
        if score.disqualified {
            return CandidateEvaluation::rejected(
                tech,
                date,
                UnassignedReason::MissingSkills,
                format!("{tech} holds none of the skills for '{}'", job.id),
            );
        }

        CandidateEvaluation {
            technician_id: technician.id.clone(),
            date,
            score,
            slot: Some(slot),
            skill_override,
            disqualification: None,
        }
    }

    /// Best feasible lead for `job` over `dates`, restricted by `allow`.
    ///
    /// Candidates are visited date-major, then by technician ID; only a
    /// strictly higher score replaces the current best. Without a feasible
    /// candidate, returns the disqualification that got furthest.
    pub fn best_candidate(
        &self,
        state: &PlanningState<'_>,
        job: &Job,
        dates: &[NaiveDate],
        allow: impl Fn(&Technician, NaiveDate) -> bool,
    ) -> Result<CandidateEvaluation, Disqualification> {
        self.best_candidate_for(state, job, dates, job.duration_ms, allow)
    }

    /// Like [`best_candidate`](Self::best_candidate) for a partial duration.
    pub fn best_candidate_for(
        &self,
        state: &PlanningState<'_>,
        job: &Job,
        dates: &[NaiveDate],
        duration_ms: i64,
        allow: impl Fn(&Technician, NaiveDate) -> bool,
    ) -> Result<CandidateEvaluation, Disqualification> {
        let snapshot = state.snapshot();
        let leads: Vec<&Technician> = snapshot
            .technicians()
            .filter(|t| t.role == TechnicianRole::Lead)
            .collect();
        if leads.is_empty() {
            return Err(Disqualification::new(
                UnassignedReason::NoTechnicians,
                "no lead technicians in roster",
            ));
        }
        if dates.is_empty() {
            let reason = match job.deadline {
                Some(deadline) if deadline < snapshot.start_date => UnassignedReason::DeadlinePassed,
                _ => UnassignedReason::NoAvailability,
            };
            return Err(Disqualification::new(
                reason,
                format!("no candidate date for '{}'", job.id),
            ));
        }

        let mut best: Option<CandidateEvaluation> = None;
        let mut furthest: Option<Disqualification> = None;
        let mut considered = 0usize;
        for &date in dates {
            let median = state.tracker.median_utilization(date);
            for &technician in leads.iter().filter(|t| allow(t, date)) {
                considered += 1;
                let eval = self.evaluate_with(state, job, technician, date, duration_ms, median);
                if let Some(d) = eval.disqualification {
                    if furthest.as_ref().map_or(true, |f| d.reason > f.reason) {
                        furthest = Some(d);
                    }
                } else if best
                    .as_ref()
                    .map_or(true, |b| eval.score.total > b.score.total + 1e-12)
                {
                    best = Some(eval);
                }
            }
        }

        match (best, furthest) {
            (Some(best), _) => Ok(best),
            (None, Some(d)) => Err(d),
            (None, None) => Err(Disqualification::new(
                UnassignedReason::NoTechnicians,
                if considered == 0 {
                    format!("no eligible technician left for '{}'", job.id)
                } else {
                    format!("no technician fits '{}'", job.id)
                },
            )),
        }
    }

    /// Builds the assignment for a feasible candidate, picking an assistant
    /// when the job asks for one. Returns `None` for an infeasible candidate.
    pub fn propose(
        &self,
        state: &PlanningState<'_>,
        job: &Job,
        candidate: &CandidateEvaluation,
    ) -> Option<Assignment> {
        let slot = candidate.slot.as_ref()?;
        if candidate.disqualification.is_some() {
            return None;
        }
        let tech = candidate.technician_id.as_str();
        let mut assignment = Assignment::new(&job.id, tech, candidate.date, slot.window);
        assignment.skill_override = candidate.skill_override;
        assignment.efficiency_score = candidate.score.total;
        assignment.workload_score = state.projected_utilization(
            tech,
            candidate.date,
            slot.window.duration_ms() + travel_share(state, slot),
        );

        if slot.inbound.approximate {
            assignment.push_warning(AssignmentWarning::ApproximateDistance {
                from: slot.inbound_from.clone(),
                to: job.id.clone(),
            });
        }
        if let Some((next, leg)) = &slot.outbound {
            if leg.approximate {
                assignment.push_warning(AssignmentWarning::ApproximateDistance {
                    from: job.id.clone(),
                    to: next.clone(),
                });
            }
        }

        if job.requires_assistant {
            match pick_assistant(state, job, tech, candidate.date, &slot.window) {
                Some(assistant) => assignment.assistant_id = Some(assistant),
                None => assignment.push_warning(AssignmentWarning::AssistantUnavailable),
            }
        }
        Some(assignment)
    }

    /// Places `jobs` one at a time into `state`.
    pub fn assign(&self, state: &mut PlanningState<'_>, jobs: &[&Job]) -> AssignmentPass {
        let snapshot = state.snapshot();
        let context = DispatchContext::on(snapshot.start_date);
        let ordered = self.order.sorted(jobs, &context);
        let started = Instant::now();
        let mut pass = AssignmentPass::default();

        for (i, job) in ordered.iter().enumerate() {
            if self.timeout.is_some_and(|t| started.elapsed() >= t) {
                warn!(remaining = ordered.len() - i, "assignment pass timed out");
                pass.unassigned.extend(ordered[i..].iter().map(|j| UnassignedJob {
                    job_id: j.id.clone(),
                    reason: UnassignedReason::TimedOut,
                    message: UnassignedReason::TimedOut.to_string(),
                }));
                break;
            }

            let dates = candidate_dates(snapshot, job);
            let placed = self
                .best_candidate(state, job, &dates, |_, _| true)
                .and_then(|best| {
                    self.propose(state, job, &best).ok_or_else(|| {
                        Disqualification::new(UnassignedReason::NoAvailability, "no open slot")
                    })
                });
            match placed {
                Ok(assignment) => {
                    debug!(
                        job = %job.id,
                        technician = %assignment.lead_id,
                        date = %assignment.date,
                        score = assignment.efficiency_score,
                        "job placed"
                    );
                    state.place(assignment.clone());
                    pass.proposed.push(assignment);
                }
                Err(d) => {
                    debug!(job = %job.id, reason = ?d.reason, "job unassigned");
                    pass.unassigned.push(UnassignedJob {
                        job_id: job.id.clone(),
                        reason: d.reason,
                        message: d.detail,
                    });
                }
            }
        }

        let approximate = pass
            .proposed
            .iter()
            .flat_map(|a| &a.warnings)
            .filter(|w| matches!(w, AssignmentWarning::ApproximateDistance { .. }))
            .count();
        if approximate > 0 {
            warn!(legs = approximate, "travel estimated from great-circle distance");
        }
        pass
    }

    /// Full pass: place `jobs` around `existing`, then detect conflicts over
    /// the combined set and compute metrics.
    pub fn run(
        &self,
        snapshot: &Snapshot<'_>,
        existing: &[Assignment],
        jobs: &[&Job],
    ) -> SchedulingResult {
        let mut state = PlanningState::new(snapshot, existing);
        let pass = self.assign(&mut state, jobs);
        let plan = state.to_vec();
        let conflicts = self.detector.scan(snapshot, &plan);
        let (metrics, daily_schedules) = metrics::evaluate(snapshot, &plan);

        info!(
            assigned = pass.proposed.len(),
            unassigned = pass.unassigned.len(),
            conflicts = conflicts.len(),
            "assignment pass complete"
        );

        SchedulingResult {
            assignments: pass.proposed,
            unassigned_jobs: pass.unassigned,
            conflicts,
            metrics,
            daily_schedules,
            ..Default::default()
        }
    }
}

impl Default for AutoAssignmentEngine {
    fn default() -> Self {
        Self::new(&AutoAssignmentCriteria::default())
    }
}

/// Dates a job may be placed on: its scheduled date when set (none if that
/// lies outside the range), otherwise every date in the range.
pub fn candidate_dates(snapshot: &Snapshot<'_>, job: &Job) -> Vec<NaiveDate> {
    match job.scheduled_date {
        Some(date) if date >= snapshot.start_date && date <= snapshot.end_date => vec![date],
        Some(_) => Vec::new(),
        None => snapshot.dates(),
    }
}

fn travel_share(state: &PlanningState<'_>, slot: &Slot) -> i64 {
    if state.snapshot().config.scheduling.include_travel_in_capacity {
        slot.travel_delta_ms
    } else {
        0
    }
}

/// Least-loaded technician free for the whole window; assistants first.
fn pick_assistant(
    state: &PlanningState<'_>,
    job: &Job,
    lead_id: &str,
    date: NaiveDate,
    window: &TimeWindow,
) -> Option<String> {
    let snapshot = state.snapshot();
    let overtime = snapshot.constraints.allow_overtime_assignment;
    let utilization: HashMap<&str, f64> = snapshot
        .technicians()
        .map(|t| (t.id.as_str(), state.tracker.utilization(&t.id, date)))
        .collect();

    snapshot
        .technicians()
        .filter(|t| t.id != lead_id)
        .filter(|t| t.calendar.is_available(date, window))
        .filter(|t| overtime || state.tracker.fits(&t.id, date, window.duration_ms(), 0))
        .filter(|t| state.window_clear(&t.id, date, job, window))
        .min_by(|a, b| {
            (a.role != TechnicianRole::Assistant)
                .cmp(&(b.role != TechnicianRole::Assistant))
                .then_with(|| {
                    let ua = utilization.get(a.id.as_str()).copied().unwrap_or(0.0);
                    let ub = utilization.get(b.id.as_str()).copied().unwrap_or(0.0);
                    ua.total_cmp(&ub)
                })
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|t| t.id.clone())
}
