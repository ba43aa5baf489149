//! Candidate generation, verification and ranking.

use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::route::{retime, two_opt};
use crate::config::MAX_RESOLUTION_ITERATIONS;
use crate::detection::DetectionContext;
use crate::models::{
    Assignment, AssignmentWarning, Conflict, ConflictType, ImpactEstimate, Job, Resolution,
    ResolutionMethod, Severity, SupersedeInstruction, Technician, TechnicianRole, TimeWindow,
};
use crate::scheduler::{candidate_dates, AutoAssignmentEngine, CandidateEvaluation, PlanningState};
use crate::snapshot::Snapshot;

/// Ranked resolutions for one conflict.
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    /// The conflict; `auto_resolvable` is cleared when escalated.
    pub conflict: Conflict,
    /// Verified candidates first, then by ascending impact.
    pub resolutions: Vec<Resolution>,
    /// Generation rounds used.
    pub iterations: u32,
    /// No candidate verified; `resolutions` holds a single escalation.
    pub escalated: bool,
}

impl ResolutionOutcome {
    /// The recommended resolution.
    pub fn suggested(&self) -> Option<&Resolution> {
        self.resolutions.iter().find(|r| r.suggested)
    }
}

/// Generates, verifies and ranks resolutions per conflict type.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolutionEngine {
    assigner: AutoAssignmentEngine,
}

type Tried = BTreeSet<(String, NaiveDate)>;

impl ConflictResolutionEngine {
    /// Creates a resolver that re-places jobs with `assigner`.
    pub fn new(assigner: AutoAssignmentEngine) -> Self {
        Self { assigner }
    }

    pub fn assigner(&self) -> &AutoAssignmentEngine {
        &self.assigner
    }

    /// Generation rounds allowed per conflict.
    pub fn max_iterations(snapshot: &Snapshot<'_>) -> u32 {
        snapshot
            .config
            .resolution
            .max_iterations
            .clamp(1, MAX_RESOLUTION_ITERATIONS)
    }

    /// Resolves every conflict against the same plan.
    pub fn resolve_all(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflicts: &[Conflict],
    ) -> Vec<ResolutionOutcome> {
        conflicts
            .iter()
            .map(|c| self.resolve(snapshot, plan, c))
            .collect()
    }

    /// Builds ranked resolutions for `conflict` over `plan`.
    ///
    /// Each round generates candidates not seen before, skipping the
    /// (technician, date) pairs earlier rounds proposed, and verifies them
    /// by re-running detection. Stops at the first round with a verified
    /// candidate; escalates when the rounds run out.
    pub fn resolve(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflict: &Conflict,
    ) -> ResolutionOutcome {
        let baseline: BTreeMap<String, Severity> = self
            .assigner
            .detector()
            .scan(snapshot, plan)
            .into_iter()
            .map(|c| (c.id, c.severity))
            .collect();
        let max = Self::max_iterations(snapshot);

        let mut tried = Tried::new();
        let mut seen = BTreeSet::new();
        let mut candidates: Vec<Resolution> = Vec::new();
        let mut iterations = 0;
        while iterations < max {
            iterations += 1;
            let fresh: Vec<Resolution> = self
                .generate(snapshot, plan, conflict, &tried)
                .into_iter()
                .filter(|r| seen.insert(signature(r)))
                .collect();
            if fresh.is_empty() {
                break;
            }
            let mut any_verified = false;
            for mut resolution in fresh {
                for a in &resolution.proposed_assignments {
                    tried.insert((a.lead_id.clone(), a.date));
                }
                resolution.verified = self.verify(snapshot, plan, conflict, &baseline, &resolution);
                debug!(
                    conflict = %conflict.id,
                    method = ?resolution.method,
                    impact = resolution.impact.total(),
                    verified = resolution.verified,
                    "resolution candidate"
                );
                any_verified |= resolution.verified;
                candidates.push(resolution);
            }
            if any_verified {
                break;
            }
        }

        let mut conflict = conflict.clone();
        if !candidates.iter().any(|r| r.verified) {
            warn!(
                conflict = %conflict.id,
                iterations,
                "no verified resolution, escalating"
            );
            conflict.auto_resolvable = false;
            let mut escalation = escalate(&conflict);
            escalation.suggested = true;
            return ResolutionOutcome {
                conflict,
                resolutions: vec![escalation],
                iterations,
                escalated: true,
            };
        }

        candidates.sort_by(|a, b| {
            b.verified
                .cmp(&a.verified)
                .then_with(|| a.impact.total().total_cmp(&b.impact.total()))
                .then_with(|| method_rank(a.method).cmp(&method_rank(b.method)))
                .then_with(|| signature(a).cmp(&signature(b)))
        });
        if let Some(first) = candidates.first_mut() {
            first.suggested = true;
        }
        ResolutionOutcome {
            conflict,
            resolutions: candidates,
            iterations,
            escalated: false,
        }
    }

    /// Whether applying `resolution` clears `target` without introducing a
    /// new conflict of medium or higher severity on a proposed assignment.
    ///
    /// A new conflict of the target's own type is tolerated when it is less
    /// severe than the target.
    pub fn verify(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        target: &Conflict,
        baseline: &BTreeMap<String, Severity>,
        resolution: &Resolution,
    ) -> bool {
        let applied = apply(plan, resolution);
        let mut ctx = DetectionContext::new(snapshot, &applied);
        if resolution.method == ResolutionMethod::Override {
            ctx.allow_overtime = true;
        }
        let after = self.assigner.detector().detect(&ctx);

        let cleared = after
            .iter()
            .find(|c| c.id == target.id)
            .map_or(true, |c| c.severity < target.severity);
        if !cleared {
            return false;
        }

        let proposed: BTreeSet<&str> = resolution
            .proposed_assignments
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        !after.iter().any(|c| {
            !baseline.contains_key(&c.id)
                && c.severity >= Severity::Medium
                && c.assignment_ids.iter().any(|id| proposed.contains(id.as_str()))
                && (c.conflict_type != target.conflict_type || c.severity >= target.severity)
        })
    }

    fn generate(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflict: &Conflict,
        tried: &Tried,
    ) -> Vec<Resolution> {
        let movable = movable(snapshot, plan, conflict);
        let mut out = Vec::new();
        match conflict.conflict_type {
            ConflictType::TimeOverlap | ConflictType::Availability => {
                for a in &movable {
                    out.extend(self.reschedule(snapshot, plan, conflict, a, tried));
                    out.extend(self.reassign(snapshot, plan, conflict, a, tried));
                }
            }
            ConflictType::CapacityExceeded => {
                for a in &movable {
                    out.extend(self.reschedule(snapshot, plan, conflict, a, tried));
                    out.extend(self.reassign(snapshot, plan, conflict, a, tried));
                    out.extend(self.split(snapshot, plan, conflict, a));
                }
                out.push(overtime(conflict));
            }
            ConflictType::SkillMismatch => {
                for a in &movable {
                    match self.reassign(snapshot, plan, conflict, a, tried) {
                        Some(r) => out.push(r),
                        None => out.extend(self.manual_reassign(snapshot, plan, conflict, a, tried)),
                    }
                }
            }
            ConflictType::TravelDistance => {
                out.extend(self.resequence(snapshot, plan, conflict));
                if let Some(later) = movable.iter().max_by(|a, b| {
                    a.window
                        .start_ms
                        .cmp(&b.window.start_ms)
                        .then_with(|| b.id.cmp(&a.id))
                }) {
                    out.extend(self.reassign(snapshot, plan, conflict, later, tried));
                }
            }
            ConflictType::DeadlineRisk => {
                for a in &movable {
                    out.extend(self.pull_forward(snapshot, plan, conflict, a, tried));
                }
            }
            ConflictType::GeographicMismatch => {
                for a in &movable {
                    out.extend(self.reassign(snapshot, plan, conflict, a, tried));
                }
            }
            ConflictType::WorkloadImbalance => {
                out.extend(self.rebalance(snapshot, plan, conflict, tried));
            }
        }
        out
    }

    /// Same lead, another slot: same date first, then nearby dates.
    fn reschedule(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflict: &Conflict,
        a: &Assignment,
        tried: &Tried,
    ) -> Option<Resolution> {
        let job = snapshot.job(&a.job_id)?;
        let lead = snapshot.technician(&a.lead_id)?;
        let state = state_without(snapshot, plan, &[a.id.as_str()]);

        for date in nearby_dates(snapshot, job, a.date) {
            if tried.contains(&(lead.id.clone(), date)) {
                continue;
            }
            let eval = self
                .assigner
                .evaluate_for(&state, job, lead, date, a.duration_ms());
            let Some(slot) = eval.slot.as_ref().filter(|_| eval.is_feasible()) else {
                continue;
            };
            if date == a.date && slot.window == a.window {
                continue;
            }
            let moved = self.replacement(&state, job, a, &eval)?;
            let days = (date - a.date).num_days().abs() as f64;
            let customer = if days == 0.0 { 0.1 } else { 0.2 + 0.15 * days };
            return Some(
                Resolution::new(
                    &conflict.id,
                    ResolutionMethod::Reschedule,
                    ImpactEstimate::new(customer, 0.1, 0.1, 0.2),
                )
                .with_step(
                    format!(
                        "move '{}' to {} {} with {}",
                        job.id,
                        date,
                        slot.window.start_hhmm(),
                        lead.id
                    ),
                    Some(a.id.clone()),
                )
                .superseding(SupersedeInstruction::new(
                    &a.id,
                    Some(moved.id.clone()),
                    "rescheduled",
                ))
                .with_assignment(moved),
            );
        }
        None
    }

    /// Another lead picked by the auto-assigner: same date first.
    fn reassign(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflict: &Conflict,
        a: &Assignment,
        tried: &Tried,
    ) -> Option<Resolution> {
        let job = snapshot.job(&a.job_id)?;
        let state = state_without(snapshot, plan, &[a.id.as_str()]);
        let allow = |t: &Technician, d: NaiveDate| {
            t.id != a.lead_id && !tried.contains(&(t.id.clone(), d))
        };

        let others: Vec<NaiveDate> = candidate_dates(snapshot, job)
            .into_iter()
            .filter(|d| *d != a.date)
            .collect();
        let best = self
            .assigner
            .best_candidate_for(&state, job, &[a.date], a.duration_ms(), allow)
            .or_else(|_| {
                self.assigner
                    .best_candidate_for(&state, job, &others, a.duration_ms(), allow)
            })
            .ok()?;
        let moved = self.replacement(&state, job, a, &best)?;

        let proximity = best.score.term("proximity").map_or(0.0, |t| t.score);
        let customer = if best.date == a.date { 0.2 } else { 0.4 };
        Some(
            Resolution::new(
                &conflict.id,
                ResolutionMethod::AutoReassign,
                ImpactEstimate::new(customer, 0.4, 0.1 + 0.5 * (1.0 - proximity), 0.3),
            )
            .with_step(
                format!(
                    "reassign '{}' from {} to {} on {} {}",
                    job.id,
                    a.lead_id,
                    best.technician_id,
                    best.date,
                    moved.window.start_hhmm()
                ),
                Some(a.id.clone()),
            )
            .superseding(SupersedeInstruction::new(
                &a.id,
                Some(moved.id.clone()),
                "reassigned",
            ))
            .with_assignment(moved),
        )
    }

    /// Best partially qualified lead on the same date, skills overridden.
    fn manual_reassign(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflict: &Conflict,
        a: &Assignment,
        tried: &Tried,
    ) -> Option<Resolution> {
        let job = snapshot.job(&a.job_id)?;
        let state = state_without(snapshot, plan, &[a.id.as_str()]);
        let overtime = snapshot.constraints.allow_overtime_assignment;

        let mut leads: Vec<(&Technician, f64)> = snapshot
            .technicians()
            .filter(|t| t.role == TechnicianRole::Lead && t.id != a.lead_id)
            .filter(|t| !tried.contains(&(t.id.clone(), a.date)))
            .map(|t| (t, t.skill_match_ratio(&job.required_skills)))
            .filter(|(_, ratio)| *ratio > 0.0)
            .collect();
        leads.sort_by(|x, y| y.1.total_cmp(&x.1).then_with(|| x.0.id.cmp(&y.0.id)));

        leads.into_iter().find_map(|(technician, ratio)| {
            let slot = state.find_slot(&technician.id, job, a.date, a.duration_ms())?;
            if !overtime
                && !state
                    .tracker
                    .fits(&technician.id, a.date, a.duration_ms(), slot.travel_delta_ms)
            {
                return None;
            }
            let mut moved = Assignment::new(&job.id, &technician.id, a.date, slot.window);
            moved.assistant_id = a
                .assistant_id
                .clone()
                .filter(|id| *id != technician.id);
            moved.skill_override = true;
            moved.efficiency_score = ratio;
            moved.workload_score =
                state.projected_utilization(&technician.id, a.date, a.duration_ms());
            if let Some(part) = a.split_part {
                moved = moved.with_split_part(part.index, part.count);
            }
            Some(
                Resolution::new(
                    &conflict.id,
                    ResolutionMethod::ManualReassign,
                    ImpactEstimate::new(0.3, 0.5, 0.3, 0.6),
                )
                .with_step(
                    format!(
                        "review: {} covers {:.0}% of the skills for '{}'",
                        technician.id,
                        ratio * 100.0,
                        job.id
                    ),
                    None,
                )
                .with_step(format!("reassign '{}' to {}", job.id, technician.id), Some(a.id.clone()))
                .superseding(SupersedeInstruction::new(
                    &a.id,
                    Some(moved.id.clone()),
                    "manually reassigned",
                ))
                .with_assignment(moved),
            )
        })
    }

    /// Splits a splittable job into the part that fits today and the rest
    /// on a following day, same lead.
    fn split(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflict: &Conflict,
        a: &Assignment,
    ) -> Option<Resolution> {
        let job = snapshot.job(&a.job_id)?;
        if !job.splittable || a.split_part.is_some() {
            return None;
        }
        let lead = snapshot.technician(&a.lead_id)?;
        let state = state_without(snapshot, plan, &[a.id.as_str()]);

        let granularity = snapshot.config.scheduling.slot_granularity_ms.max(1);
        let remaining = state.tracker.remaining_ms(&lead.id, a.date);
        let first_ms = remaining - remaining.rem_euclid(granularity);
        let rest_ms = a.duration_ms() - first_ms;
        if first_ms < job.min_split_ms.max(granularity) || rest_ms < job.min_split_ms.max(granularity) {
            return None;
        }

        let first_eval = self
            .assigner
            .evaluate_for(&state, job, lead, a.date, first_ms);
        if !first_eval.is_feasible() {
            return None;
        }
        let first = self.assigner.propose(&state, job, &first_eval)?.with_split_part(1, 2);

        let mut next_state = state.clone();
        next_state.place(first.clone());
        let search_days = snapshot.config.resolution.search_days.max(1) as u64;
        let second = (1..=search_days)
            .filter_map(|k| a.date.checked_add_days(Days::new(k)))
            .find_map(|date| {
                let eval = self
                    .assigner
                    .evaluate_for(&next_state, job, lead, date, rest_ms);
                eval.is_feasible()
                    .then(|| self.assigner.propose(&next_state, job, &eval))
                    .flatten()
            })?
            .with_split_part(2, 2);

        Some(
            Resolution::new(
                &conflict.id,
                ResolutionMethod::Split,
                ImpactEstimate::new(0.3, 0.2, 0.2, 0.3),
            )
            .with_step(
                format!(
                    "split '{}': {} h on {}, {} h on {}",
                    job.id,
                    first.duration_hours(),
                    first.date,
                    second.duration_hours(),
                    second.date
                ),
                Some(a.id.clone()),
            )
            .superseding(SupersedeInstruction::new(
                &a.id,
                Some(first.id.clone()),
                "split across days",
            ))
            .with_assignment(first)
            .with_assignment(second),
        )
    }

    /// Reorders one technician-day with 2-opt and lays it out again.
    fn resequence(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflict: &Conflict,
    ) -> Option<Resolution> {
        let tech_id = conflict.technician_id.as_deref()?;
        let technician = snapshot.technician(tech_id)?;
        let date = conflict.date;

        let mut route: Vec<&Assignment> = plan
            .iter()
            .filter(|a| a.is_active() && a.date == date && a.involves(tech_id))
            .collect();
        if route.iter().any(|a| a.lead_id != tech_id) {
            return None;
        }
        route.sort_by(|a, b| {
            a.window
                .start_ms
                .cmp(&b.window.start_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        let jobs: Vec<&Job> = route.iter().filter_map(|a| snapshot.job(&a.job_id)).collect();
        if jobs.len() != route.len() || jobs.len() < 2 {
            return None;
        }

        let order = two_opt(snapshot, technician, &jobs);
        let stops: Vec<(&Job, i64)> = order
            .iter()
            .map(|&i| (jobs[i], route[i].duration_ms()))
            .collect();
        let day_start = route[0].window.start_ms;
        let windows = retime(snapshot, technician, date, &stops, day_start)?;

        let mut resolution = Resolution::new(
            &conflict.id,
            ResolutionMethod::Reschedule,
            ImpactEstimate::default(),
        );
        let mut changed = 0usize;
        for (&i, window) in order.iter().zip(windows) {
            let a = route[i];
            if window == a.window {
                continue;
            }
            let moved = relocated(a, date, window);
            resolution = resolution
                .with_step(
                    format!("move '{}' to {}", a.job_id, window.start_hhmm()),
                    Some(a.id.clone()),
                )
                .superseding(SupersedeInstruction::new(
                    &a.id,
                    Some(moved.id.clone()),
                    "route resequenced",
                ))
                .with_assignment(moved);
            changed += 1;
        }
        if changed == 0 {
            return None;
        }
        resolution.impact = ImpactEstimate::new((0.05 * changed as f64).min(0.3), 0.1, 0.05, 0.2);
        Some(resolution)
    }

    /// Moves a deadline-risk assignment to an earlier date: same lead
    /// first, then any lead.
    fn pull_forward(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflict: &Conflict,
        a: &Assignment,
        tried: &Tried,
    ) -> Option<Resolution> {
        let job = snapshot.job(&a.job_id)?;
        let lead = snapshot.technician(&a.lead_id)?;
        let latest = job.deadline.map_or(a.date, |d| d.min(a.date));
        let mut dates: Vec<NaiveDate> = snapshot
            .start_date
            .iter_days()
            .take_while(|d| *d < a.date && *d <= latest)
            .collect();
        dates.reverse();
        if dates.is_empty() {
            return None;
        }
        let state = state_without(snapshot, plan, &[a.id.as_str()]);

        let same_lead = dates
            .iter()
            .filter(|d| !tried.contains(&(lead.id.clone(), **d)))
            .map(|d| {
                self.assigner
                    .evaluate_for(&state, job, lead, *d, a.duration_ms())
            })
            .find(CandidateEvaluation::is_feasible);
        let (method, best) = match same_lead {
            Some(eval) => (ResolutionMethod::Reschedule, eval),
            None => {
                let allow = |t: &Technician, d: NaiveDate| !tried.contains(&(t.id.clone(), d));
                let eval = self
                    .assigner
                    .best_candidate_for(&state, job, &dates, a.duration_ms(), allow)
                    .ok()?;
                (ResolutionMethod::AutoReassign, eval)
            }
        };
        let moved = self.replacement(&state, job, a, &best)?;
        let days = (a.date - best.date).num_days() as f64;
        let team = if method == ResolutionMethod::Reschedule { 0.1 } else { 0.4 };
        Some(
            Resolution::new(
                &conflict.id,
                method,
                ImpactEstimate::new(0.1 + 0.1 * days, team, 0.1, 0.2),
            )
            .with_step(
                format!(
                    "bring '{}' forward to {} with {}",
                    job.id, best.date, best.technician_id
                ),
                Some(a.id.clone()),
            )
            .superseding(SupersedeInstruction::new(
                &a.id,
                Some(moved.id.clone()),
                "moved ahead of deadline",
            ))
            .with_assignment(moved),
        )
    }

    /// Moves the least disruptive job of the busiest lead to a lead below
    /// the day's mean utilization.
    fn rebalance(
        &self,
        snapshot: &Snapshot<'_>,
        plan: &[Assignment],
        conflict: &Conflict,
        tried: &Tried,
    ) -> Option<Resolution> {
        let date = conflict.date;
        let state = PlanningState::new(snapshot, plan);
        let loads: Vec<(String, f64)> = state
            .tracker
            .utilizations_on(date)
            .into_iter()
            .filter(|(_, u)| u.is_finite())
            .collect();
        if loads.len() < 2 {
            return None;
        }
        let mean = loads.iter().map(|(_, u)| u).sum::<f64>() / loads.len() as f64;
        let (busiest, _) = loads
            .iter()
            .max_by(|x, y| x.1.total_cmp(&y.1).then_with(|| y.0.cmp(&x.0)))?;
        let under: BTreeSet<&str> = loads
            .iter()
            .filter(|(_, u)| *u < mean)
            .map(|(id, _)| id.as_str())
            .collect();

        let mut theirs: Vec<&Assignment> = plan
            .iter()
            .filter(|a| a.is_active() && a.date == date && a.lead_id == *busiest)
            .collect();
        sort_least_disruptive(snapshot, &mut theirs);

        theirs.into_iter().find_map(|a| {
            let job = snapshot.job(&a.job_id)?;
            let without = state_without(snapshot, plan, &[a.id.as_str()]);
            let allow = |t: &Technician, d: NaiveDate| {
                under.contains(t.id.as_str()) && !tried.contains(&(t.id.clone(), d))
            };
            let best = self
                .assigner
                .best_candidate_for(&without, job, &[date], a.duration_ms(), allow)
                .ok()?;
            let moved = self.replacement(&without, job, a, &best)?;
            let proximity = best.score.term("proximity").map_or(0.0, |t| t.score);
            Some(
                Resolution::new(
                    &conflict.id,
                    ResolutionMethod::AutoReassign,
                    ImpactEstimate::new(0.2, 0.3, 0.1 + 0.5 * (1.0 - proximity), 0.3),
                )
                .with_step(
                    format!(
                        "move '{}' from {} to {}",
                        job.id, busiest, best.technician_id
                    ),
                    Some(a.id.clone()),
                )
                .superseding(SupersedeInstruction::new(
                    &a.id,
                    Some(moved.id.clone()),
                    "workload rebalanced",
                ))
                .with_assignment(moved),
            )
        })
    }

    /// The assignment `candidate` yields for `a`'s job, keeping its split part.
    fn replacement(
        &self,
        state: &PlanningState<'_>,
        job: &Job,
        a: &Assignment,
        candidate: &CandidateEvaluation,
    ) -> Option<Assignment> {
        let proposed = self.assigner.propose(state, job, candidate)?;
        Some(match a.split_part {
            Some(part) => proposed.with_split_part(part.index, part.count),
            None => proposed,
        })
    }
}

/// `plan` with the resolution applied: superseded assignments dropped,
/// proposed ones added.
pub fn apply(plan: &[Assignment], resolution: &Resolution) -> Vec<Assignment> {
    let dropped: BTreeSet<&str> = resolution
        .superseded
        .iter()
        .map(|s| s.assignment_id.as_str())
        .chain(resolution.proposed_assignments.iter().map(|a| a.id.as_str()))
        .collect();
    plan.iter()
        .filter(|a| !dropped.contains(a.id.as_str()))
        .chain(&resolution.proposed_assignments)
        .cloned()
        .collect()
}

fn escalate(conflict: &Conflict) -> Resolution {
    Resolution::new(
        &conflict.id,
        ResolutionMethod::Escalate,
        ImpactEstimate::new(0.5, 0.5, 0.2, 0.8),
    )
    .with_step(
        format!("escalate '{}' to a dispatcher: {}", conflict.id, conflict.message),
        None,
    )
}

fn overtime(conflict: &Conflict) -> Resolution {
    let who = conflict.technician_id.as_deref().unwrap_or("technician");
    Resolution::new(
        &conflict.id,
        ResolutionMethod::Override,
        ImpactEstimate::new(0.0, 0.4, 0.8, 0.1),
    )
    .with_step(format!("approve overtime for {who} on {}", conflict.date), None)
}

fn method_rank(method: ResolutionMethod) -> u8 {
    match method {
        ResolutionMethod::Reschedule => 0,
        ResolutionMethod::AutoReassign => 1,
        ResolutionMethod::Split => 2,
        ResolutionMethod::ManualReassign => 3,
        ResolutionMethod::Override => 4,
        ResolutionMethod::Escalate => 5,
    }
}

/// Identity of a candidate for de-duplication across rounds.
fn signature(resolution: &Resolution) -> String {
    let proposed: Vec<&str> = resolution
        .proposed_assignments
        .iter()
        .map(|a| a.id.as_str())
        .collect();
    let superseded: Vec<&str> = resolution
        .superseded
        .iter()
        .map(|s| s.assignment_id.as_str())
        .collect();
    format!(
        "{:?}|{}|{}",
        resolution.method,
        proposed.join(","),
        superseded.join(",")
    )
}

fn state_without<'a>(
    snapshot: &'a Snapshot<'a>,
    plan: &[Assignment],
    ids: &[&str],
) -> PlanningState<'a> {
    let mut state = PlanningState::new(snapshot, plan);
    for id in ids {
        state.remove(id);
    }
    state
}

/// Conflict assignments present in the plan, least disruptive first.
fn movable<'p>(snapshot: &Snapshot<'_>, plan: &'p [Assignment], conflict: &Conflict) -> Vec<&'p Assignment> {
    let mut out: Vec<&Assignment> = plan
        .iter()
        .filter(|a| a.is_active() && conflict.involves(&a.id))
        .collect();
    sort_least_disruptive(snapshot, &mut out);
    out
}

fn sort_least_disruptive(snapshot: &Snapshot<'_>, assignments: &mut [&Assignment]) {
    let rank = |a: &Assignment| snapshot.job(&a.job_id).map_or(0, |j| j.priority.rank());
    assignments.sort_by(|a, b| {
        rank(*a)
            .cmp(&rank(*b))
            .then_with(|| a.duration_ms().cmp(&b.duration_ms()))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// `around` first, then alternately later and earlier days up to the
/// search distance. Never before the range start or after the deadline;
/// a job with a fixed date stays on it.
fn nearby_dates(snapshot: &Snapshot<'_>, job: &Job, around: NaiveDate) -> Vec<NaiveDate> {
    if job.scheduled_date.is_some() {
        return vec![around];
    }
    let search_days = snapshot.config.resolution.search_days.max(0) as u64;
    let mut dates = vec![around];
    for k in 1..=search_days {
        let later = around.checked_add_days(Days::new(k));
        let earlier = around.checked_sub_days(Days::new(k));
        dates.extend(later.into_iter().chain(earlier).filter(|d| *d >= snapshot.start_date));
    }
    dates.retain(|d| job.deadline.map_or(true, |deadline| *d <= deadline));
    dates
}

/// Copy of `a` on a new date and window, keeping crew, scores and flags.
/// Leg warnings name the old neighbours and are dropped.
fn relocated(a: &Assignment, date: NaiveDate, window: TimeWindow) -> Assignment {
    let mut m = Assignment::new(&a.job_id, &a.lead_id, date, window);
    m.assistant_id = a.assistant_id.clone();
    m.workload_score = a.workload_score;
    m.efficiency_score = a.efficiency_score;
    m.skill_override = a.skill_override;
    m.warnings = a
        .warnings
        .iter()
        .filter(|w| !matches!(w, AssignmentWarning::ApproximateDistance { .. }))
        .cloned()
        .collect();
    match a.split_part {
        Some(part) => m.with_split_part(part.index, part.count),
        None => m,
    }
}
