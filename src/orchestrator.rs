//! Public entry points.
//!
//! [`SchedulingOrchestrator`] validates a request, builds the per-call
//! [`Snapshot`], and drives the assignment, detection and resolution
//! engines. It fails only for malformed input; unplaceable jobs and
//! unresolvable conflicts come back inside the result.
//!
//! Every call is a pure function of its request: nothing is persisted and
//! no state survives between calls, so independent calls may run in
//! parallel.

use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use tracing::{debug, info, instrument};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::geo::{haversine_m, Cluster};
use crate::models::{
    Assignment, AutoAssignmentCriteria, BulkAssignmentResult, CommitInstruction, Job,
    SchedulingRequest, SchedulingResult, SupersedeInstruction, Technician,
};
use crate::resolution::{apply, ConflictResolutionEngine};
use crate::scheduler::{metrics, AutoAssignmentEngine, PlanningState};
use crate::snapshot::Snapshot;
use crate::validation::validate_request;

/// Stateless driver for scheduling passes.
#[derive(Debug, Clone, Default)]
pub struct SchedulingOrchestrator {
    config: EngineConfig,
}

impl SchedulingOrchestrator {
    /// Creates an orchestrator with `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Creates an orchestrator from TOML configuration.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(Self::new(EngineConfig::from_toml_str(text)?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Places every job that has no active assignment, then detects
    /// conflicts over existing and proposed assignments.
    ///
    /// Conflicts are reported, not resolved.
    #[instrument(skip(self, request), fields(
        jobs = request.jobs.len(),
        technicians = request.technicians.len()
    ))]
    pub fn run_auto_assignment(&self, request: &SchedulingRequest) -> Result<SchedulingResult> {
        self.check(request)?;
        let snapshot = Snapshot::new(request, &self.config);
        let jobs = pending_jobs(request);
        Ok(self
            .engine(request, &request.criteria)
            .run(&snapshot, &request.existing_assignments, &jobs))
    }

    /// Generates ranked resolutions for every conflict over `result`.
    ///
    /// With `request.auto_resolve_conflicts` set, conflicts are worked in
    /// impact order and the suggested verified resolution of each one still
    /// present is applied; conflicts marked not auto-resolvable are skipped
    /// unless `override_conflicts` is true. Conflicts are recomputed at the
    /// end; replaced existing assignments come back as supersede
    /// instructions.
    #[instrument(skip(self, request, result), fields(
        assignments = result.assignments.len(),
        conflicts = result.conflicts.len()
    ))]
    pub fn resolve_conflicts(
        &self,
        request: &SchedulingRequest,
        result: SchedulingResult,
        override_conflicts: bool,
    ) -> Result<SchedulingResult> {
        self.check(request)?;
        let snapshot = Snapshot::new(request, &self.config);
        let resolver = ConflictResolutionEngine::new(self.engine(request, &request.criteria));
        let detector = resolver.assigner().detector();

        let existing: BTreeSet<&str> = request
            .existing_assignments
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        let mut superseded = result.superseded;
        let dropped: BTreeSet<String> = superseded
            .iter()
            .map(|s| s.assignment_id.clone())
            .collect();
        let mut plan: Vec<Assignment> = request
            .existing_assignments
            .iter()
            .filter(|a| a.is_active() && !dropped.contains(&a.id))
            .cloned()
            .chain(result.assignments)
            .collect();

        let initial = detector.scan(&snapshot, &plan);
        let mut resolutions = Vec::new();
        let mut escalated = BTreeSet::new();
        let mut applied = 0usize;
        for target in &initial {
            let current = if applied == 0 {
                Some(target.clone())
            } else {
                detector
                    .scan(&snapshot, &plan)
                    .into_iter()
                    .find(|c| c.id == target.id)
            };
            let Some(conflict) = current else {
                debug!(conflict = %target.id, "cleared by an earlier resolution");
                continue;
            };

            let outcome = resolver.resolve(&snapshot, &plan, &conflict);
            if outcome.escalated {
                escalated.insert(conflict.id.clone());
            }
            let allowed = conflict.auto_resolvable || override_conflicts;
            let chosen = outcome
                .suggested()
                .filter(|r| r.verified && r.changes_assignments())
                .cloned();
            resolutions.extend(outcome.resolutions);

            let Some(chosen) = chosen.filter(|_| request.auto_resolve_conflicts && allowed) else {
                continue;
            };
            plan = apply(&plan, &chosen);
            for instruction in &chosen.superseded {
                if existing.contains(instruction.assignment_id.as_str()) {
                    superseded.push(instruction.clone());
                } else {
                    // A proposal replaced again: keep earlier instructions pointing at the survivor.
                    for earlier in &mut superseded {
                        if earlier.replaced_by.as_deref() == Some(instruction.assignment_id.as_str()) {
                            earlier.replaced_by = instruction.replaced_by.clone();
                        }
                    }
                }
            }
            applied += 1;
            info!(conflict = %conflict.id, method = ?chosen.method, "resolution applied");
        }

        let mut conflicts = detector.scan(&snapshot, &plan);
        for c in &mut conflicts {
            if escalated.contains(&c.id) {
                c.auto_resolvable = false;
            }
        }
        let (metrics, daily_schedules) = metrics::evaluate(&snapshot, &plan);
        let mut assignments: Vec<Assignment> = plan
            .into_iter()
            .filter(|a| !existing.contains(a.id.as_str()))
            .collect();
        assignments.sort_by(|a, b| a.id.cmp(&b.id));

        info!(
            resolutions = resolutions.len(),
            applied,
            escalated = escalated.len(),
            remaining = conflicts.len(),
            "resolution pass complete"
        );
        Ok(SchedulingResult {
            assignments,
            unassigned_jobs: result.unassigned_jobs,
            conflicts,
            resolutions,
            superseded,
            metrics,
            daily_schedules,
        })
    }

    /// Re-plans exactly `job_ids`, scoring with `criteria`.
    ///
    /// Jobs that already hold an assignment get a new proposal plus a
    /// supersede instruction; when no new slot is found the old assignment
    /// stays. A dry run tells the caller not to commit.
    #[instrument(skip(self, request, job_ids, criteria), fields(requested = job_ids.len()))]
    pub fn run_bulk(
        &self,
        request: &SchedulingRequest,
        job_ids: &[String],
        criteria: &AutoAssignmentCriteria,
        dry_run: bool,
    ) -> Result<BulkAssignmentResult> {
        self.check(request)?;
        let snapshot = Snapshot::new(request, &self.config);

        let mut requested: Vec<String> = Vec::with_capacity(job_ids.len());
        for id in job_ids {
            if snapshot.job(id).is_none() {
                return Err(EngineError::UnknownJob(id.clone()));
            }
            if !requested.contains(id) {
                requested.push(id.clone());
            }
        }
        let jobs: Vec<&Job> = requested.iter().filter_map(|id| snapshot.job(id)).collect();

        let engine = self.engine(request, criteria);
        let mut state = PlanningState::new(&snapshot, &request.existing_assignments);
        let mut previous: BTreeMap<String, Vec<Assignment>> = BTreeMap::new();
        for job in &jobs {
            let ids: Vec<String> = state
                .assignments_for_job(&job.id)
                .map(|a| a.id.clone())
                .collect();
            for id in ids {
                if let Some(old) = state.remove(&id) {
                    previous.entry(job.id.clone()).or_default().push(old);
                }
            }
        }

        let pass = engine.assign(&mut state, &jobs);
        let placed: BTreeMap<&str, &str> = pass
            .proposed
            .iter()
            .map(|a| (a.job_id.as_str(), a.id.as_str()))
            .collect();

        let mut superseded = Vec::new();
        for (job_id, olds) in &previous {
            match placed.get(job_id.as_str()) {
                Some(new_id) => superseded.extend(
                    olds.iter()
                        .filter(|old| old.id != *new_id)
                        .map(|old| {
                            SupersedeInstruction::new(
                                &old.id,
                                Some(new_id.to_string()),
                                "replaced by bulk assignment",
                            )
                        }),
                ),
                None => {
                    for old in olds {
                        state.place(old.clone());
                    }
                }
            }
        }

        let plan = state.to_vec();
        let conflicts = engine.detector().scan(&snapshot, &plan);
        let (metrics, daily_schedules) = metrics::evaluate(&snapshot, &plan);
        let (assigned_job_ids, failed_job_ids): (Vec<String>, Vec<String>) = requested
            .iter()
            .cloned()
            .partition(|id| placed.contains_key(id.as_str()));

        info!(
            assigned = assigned_job_ids.len(),
            failed = failed_job_ids.len(),
            superseded = superseded.len(),
            dry_run,
            "bulk run complete"
        );
        Ok(BulkAssignmentResult {
            result: SchedulingResult {
                assignments: pass.proposed,
                unassigned_jobs: pass.unassigned,
                conflicts,
                superseded,
                metrics,
                daily_schedules,
                ..Default::default()
            },
            requested_job_ids: requested,
            assigned_job_ids,
            failed_job_ids,
            dry_run,
            commit: if dry_run {
                CommitInstruction::DoNotCommit
            } else {
                CommitInstruction::Commit
            },
        })
    }

    /// Like [`run_auto_assignment`](Self::run_auto_assignment), with jobs
    /// partitioned into geographic clusters planned on separate threads.
    ///
    /// Each technician joins the cluster whose centroid is nearest its home
    /// base (ties by cluster ID). Results are merged and detection runs once
    /// more over the whole roster, which is where cross-cluster workload
    /// imbalance shows up.
    #[instrument(skip(self, request), fields(
        jobs = request.jobs.len(),
        technicians = request.technicians.len()
    ))]
    pub fn run_partitioned(
        &self,
        request: &SchedulingRequest,
        cluster_radius_m: f64,
    ) -> Result<SchedulingResult> {
        self.check(request)?;
        let snapshot = Snapshot::new(request, &self.config);
        let pending: Vec<Job> = pending_jobs(request).into_iter().cloned().collect();
        let clusters = snapshot.geo.cluster(&pending, cluster_radius_m);
        let engine = self.engine(request, &request.criteria);

        let parts: Vec<(&Cluster, SchedulingRequest)> = crews(&clusters, &request.technicians)
            .into_iter()
            .map(|(cluster, crew)| {
                let ids: BTreeSet<&str> = crew.iter().map(|t| t.id.as_str()).collect();
                let existing = request
                    .existing_assignments
                    .iter()
                    .filter(|a| a.is_active() && a.technician_ids().any(|t| ids.contains(t)))
                    .cloned()
                    .collect();
                let sub = SchedulingRequest {
                    technicians: crew,
                    existing_assignments: existing,
                    ..request.clone()
                };
                (cluster, sub)
            })
            .collect();

        let config = &self.config;
        let engine_ref = &engine;
        let results: Vec<SchedulingResult> = thread::scope(|scope| {
            let handles: Vec<_> = parts
                .iter()
                .map(|(cluster, sub)| {
                    scope.spawn(move || {
                        let snapshot = Snapshot::new(sub, config);
                        let jobs: Vec<&Job> = cluster
                            .job_ids
                            .iter()
                            .filter_map(|id| snapshot.job(id))
                            .collect();
                        debug!(
                            cluster = %cluster.id,
                            jobs = jobs.len(),
                            technicians = sub.technicians.len(),
                            "planning cluster"
                        );
                        engine_ref.run(&snapshot, &sub.existing_assignments, &jobs)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let mut assignments = Vec::new();
        let mut unassigned_jobs = Vec::new();
        for r in results {
            assignments.extend(r.assignments);
            unassigned_jobs.extend(r.unassigned_jobs);
        }
        let plan: Vec<Assignment> = request
            .existing_assignments
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .chain(assignments.iter().cloned())
            .collect();
        let conflicts = engine.detector().scan(&snapshot, &plan);
        let (metrics, daily_schedules) = metrics::evaluate(&snapshot, &plan);

        info!(
            clusters = clusters.len(),
            assigned = assignments.len(),
            unassigned = unassigned_jobs.len(),
            conflicts = conflicts.len(),
            "partitioned run complete"
        );
        Ok(SchedulingResult {
            assignments,
            unassigned_jobs,
            conflicts,
            metrics,
            daily_schedules,
            ..Default::default()
        })
    }

    /// Rejects malformed requests and configuration.
    fn check(&self, request: &SchedulingRequest) -> Result<()> {
        if request.end_date < request.start_date {
            return Err(EngineError::DegenerateDateRange {
                start: request.start_date,
                end: request.end_date,
            });
        }
        validate_request(request).map_err(EngineError::InvalidInput)?;
        self.config.validate()?;
        Ok(())
    }

    fn engine(
        &self,
        request: &SchedulingRequest,
        criteria: &AutoAssignmentCriteria,
    ) -> AutoAssignmentEngine {
        AutoAssignmentEngine::new(criteria).with_timeout(request.timeout)
    }
}

/// Jobs without an active existing assignment.
fn pending_jobs(request: &SchedulingRequest) -> Vec<&Job> {
    let active: Vec<&Assignment> = request
        .existing_assignments
        .iter()
        .filter(|a| a.is_active())
        .collect();
    let placed: BTreeSet<&str> = active.iter().map(|a| a.job_id.as_str()).collect();
    let active_ids: BTreeSet<&str> = active.iter().map(|a| a.id.as_str()).collect();
    request
        .jobs
        .iter()
        .filter(|j| !placed.contains(j.id.as_str()))
        .filter(|j| {
            j.current_assignment
                .as_deref()
                .map_or(true, |id| !active_ids.contains(id))
        })
        .collect()
}

/// Pairs each cluster with the technicians based nearest its centroid.
fn crews<'c>(clusters: &'c [Cluster], technicians: &[Technician]) -> Vec<(&'c Cluster, Vec<Technician>)> {
    let mut crews: Vec<(&Cluster, Vec<Technician>)> =
        clusters.iter().map(|c| (c, Vec::new())).collect();
    let mut order: Vec<usize> = (0..clusters.len()).collect();
    order.sort_by(|&a, &b| clusters[a].id.cmp(&clusters[b].id));

    for tech in technicians {
        let mut nearest: Option<(usize, f64)> = None;
        for &i in &order {
            let d = haversine_m(tech.home_base, clusters[i].centroid);
            if nearest.map_or(true, |(_, best)| d < best) {
                nearest = Some((i, d));
            }
        }
        if let Some((i, _)) = nearest {
            crews[i].1.push(tech.clone());
        }
    }
    crews
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AssignmentStatus, Calendar, ConflictType, GeoPoint, ResolutionMethod, TimeWindow,
        UnassignedReason, HOUR_MS,
    };
    use chrono::NaiveDate;
    use std::time::Duration;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn here() -> GeoPoint {
        GeoPoint::new(40.0, -74.0)
    }

    fn tech(id: &str) -> Technician {
        Technician::new(id, here()).with_calendar(Calendar::weekdays(8, 17))
    }

    #[test]
    fn test_degenerate_range_rejected() {
        let req = SchedulingRequest::new(
            Vec::new(),
            Vec::new(),
            monday(),
            monday().pred_opt().unwrap(),
        );
        let err = SchedulingOrchestrator::default()
            .run_auto_assignment(&req)
            .unwrap_err();
        assert!(matches!(err, EngineError::DegenerateDateRange { .. }));
    }

    #[test]
    fn test_invalid_input_rejected() {
        let req = SchedulingRequest::for_day(
            vec![Job::new("J1", here()), Job::new("J1", here())],
            vec![tech("T1")],
            monday(),
        );
        let err = SchedulingOrchestrator::default()
            .run_auto_assignment(&req)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(ref errors) if errors.len() == 1));
    }

    #[test]
    fn test_bad_config_rejected() {
        let err = SchedulingOrchestrator::from_toml_str("[resolution]\nmax_iterations = 9\n")
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_existing_assignments_kept() {
        let held = Assignment::new("J1", "T1", monday(), TimeWindow::hours(8, 10)).committed();
        let req = SchedulingRequest::for_day(
            vec![Job::new("J1", here()), Job::new("J2", here())],
            vec![tech("T1")],
            monday(),
        )
        .with_existing_assignments(vec![held]);

        let result = SchedulingOrchestrator::default()
            .run_auto_assignment(&req)
            .unwrap();
        assert_eq!(result.assignments.len(), 1);
        let j2 = result.assignment_for_job("J2").unwrap();
        // After J1 plus the 15 min buffer.
        assert_eq!(j2.window.start_ms, 10 * HOUR_MS + 15 * 60_000);
        assert!(result.is_conflict_free());
    }

    #[test]
    fn test_timeout_reports_every_job() {
        let req = SchedulingRequest::for_day(
            vec![Job::new("J1", here()), Job::new("J2", here())],
            vec![tech("T1")],
            monday(),
        )
        .with_timeout(Duration::ZERO);
        let result = SchedulingOrchestrator::default()
            .run_auto_assignment(&req)
            .unwrap();
        assert!(result.assignments.is_empty());
        assert!(result
            .unassigned_jobs
            .iter()
            .all(|u| u.reason == UnassignedReason::TimedOut));
    }

    fn overlapping() -> (SchedulingRequest, SchedulingResult) {
        let req = SchedulingRequest::for_day(
            vec![Job::new("J1", here()), Job::new("J2", here())],
            vec![tech("T1"), tech("T2")],
            monday(),
        )
        .with_existing_assignments(vec![
            Assignment::new("J1", "T1", monday(), TimeWindow::hours(8, 10)).committed(),
            Assignment::new("J2", "T1", monday(), TimeWindow::hours(9, 11)).committed(),
        ]);
        let result = SchedulingOrchestrator::default()
            .run_auto_assignment(&req)
            .unwrap();
        (req, result)
    }

    #[test]
    fn test_resolutions_not_applied_without_flag() {
        let (req, result) = overlapping();
        assert!(result
            .conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::TimeOverlap));

        let resolved = SchedulingOrchestrator::default()
            .resolve_conflicts(&req, result, false)
            .unwrap();
        assert!(!resolved.resolutions.is_empty());
        assert!(resolved.resolutions.iter().any(|r| r.suggested));
        assert!(resolved.superseded.is_empty());
        assert!(resolved.assignments.is_empty());
        assert!(resolved
            .conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::TimeOverlap));
    }

    #[test]
    fn test_auto_resolve_supersedes_existing() {
        let (req, result) = overlapping();
        let req = req.with_auto_resolve(true);

        let resolved = SchedulingOrchestrator::default()
            .resolve_conflicts(&req, result, false)
            .unwrap();
        assert!(!resolved
            .conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::TimeOverlap));
        assert!(!resolved.superseded.is_empty());
        for s in &resolved.superseded {
            let by = s.replaced_by.as_deref().unwrap();
            assert!(resolved.assignments.iter().any(|a| a.id == by));
        }
    }

    #[test]
    fn test_bulk_dry_run_supersedes() {
        let old = Assignment::new("J1", "T1", monday(), TimeWindow::hours(14, 16)).committed();
        let req = SchedulingRequest::for_day(
            vec![Job::new("J1", here()), Job::new("J2", here())],
            vec![tech("T1")],
            monday(),
        )
        .with_existing_assignments(vec![old.clone()]);

        let bulk = SchedulingOrchestrator::default()
            .run_bulk(
                &req,
                &["J1".to_string(), "J1".to_string()],
                &AutoAssignmentCriteria::default(),
                true,
            )
            .unwrap();
        assert_eq!(bulk.requested_job_ids, vec!["J1".to_string()]);
        assert_eq!(bulk.assigned_job_ids, vec!["J1".to_string()]);
        assert!(bulk.is_complete());
        assert_eq!(bulk.commit, CommitInstruction::DoNotCommit);

        let new = bulk.result.assignment_for_job("J1").unwrap();
        assert_eq!(new.window, TimeWindow::hours(8, 9));
        assert_eq!(new.status, AssignmentStatus::Proposed);
        assert_eq!(bulk.result.superseded.len(), 1);
        assert_eq!(bulk.result.superseded[0].assignment_id, old.id);
        assert_eq!(bulk.result.superseded[0].replaced_by.as_deref(), Some(new.id.as_str()));
        // J2 was not requested.
        assert!(bulk.result.assignment_for_job("J2").is_none());
    }

    #[test]
    fn test_bulk_unknown_job() {
        let req = SchedulingRequest::for_day(vec![Job::new("J1", here())], vec![tech("T1")], monday());
        let err = SchedulingOrchestrator::default()
            .run_bulk(&req, &["J9".to_string()], &AutoAssignmentCriteria::default(), false)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownJob(ref id) if id == "J9"));
    }

    #[test]
    fn test_partitioned_keeps_crews_local() {
        let east = GeoPoint::new(40.0, -74.0);
        let west = GeoPoint::new(34.0, -118.0);
        let req = SchedulingRequest::for_day(
            vec![Job::new("E1", east), Job::new("W1", west)],
            vec![
                Technician::new("TE", east).with_calendar(Calendar::weekdays(8, 17)),
                Technician::new("TW", west).with_calendar(Calendar::weekdays(8, 17)),
            ],
            monday(),
        );
        let result = SchedulingOrchestrator::default()
            .run_partitioned(&req, 50_000.0)
            .unwrap();
        assert_eq!(result.assignment_for_job("E1").unwrap().lead_id, "TE");
        assert_eq!(result.assignment_for_job("W1").unwrap().lead_id, "TW");
        assert!(result.unassigned_jobs.is_empty());
    }

    #[test]
    fn test_partitioned_cluster_without_crew() {
        let east = GeoPoint::new(40.0, -74.0);
        let west = GeoPoint::new(34.0, -118.0);
        let req = SchedulingRequest::for_day(
            vec![Job::new("E1", east), Job::new("W1", west)],
            vec![Technician::new("TE", east)],
            monday(),
        );
        let result = SchedulingOrchestrator::default()
            .run_partitioned(&req, 50_000.0)
            .unwrap();
        assert!(result.assignment_for_job("E1").is_some());
        assert_eq!(
            result.unassigned("W1").unwrap().reason,
            UnassignedReason::NoTechnicians
        );
    }

    #[test]
    fn test_override_conflicts_applies_manual_fix() {
        let req = SchedulingRequest::for_day(
            vec![Job::new("J1", here()).with_skill("fiber").with_skill("splicing")],
            vec![tech("T1"), tech("T2").with_skill("fiber")],
            monday(),
        )
        .with_existing_assignments(vec![
            Assignment::new("J1", "T1", monday(), TimeWindow::hours(8, 9)).committed(),
        ])
        .with_auto_resolve(true);
        let orchestrator = SchedulingOrchestrator::default();
        let result = orchestrator.run_auto_assignment(&req).unwrap();

        // Skill mismatches need an operator unless overridden.
        let kept = orchestrator
            .resolve_conflicts(&req, result.clone(), false)
            .unwrap();
        assert!(kept.superseded.is_empty());
        assert!(kept
            .resolutions
            .iter()
            .any(|r| r.method == ResolutionMethod::ManualReassign && r.suggested));

        let forced = orchestrator.resolve_conflicts(&req, result, true).unwrap();
        assert_eq!(forced.superseded.len(), 1);
        assert_eq!(forced.assignments[0].lead_id, "T2");
        assert!(forced.assignments[0].skill_override);
        assert!(!forced
            .conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::SkillMismatch));
    }
}
