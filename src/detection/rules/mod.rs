//! Built-in detection rules, one per conflict type.
//!
//! | Rule | Scope | Severity |
//! |------|-------|----------|
//! | [`TimeOverlap`] | assignment pair | high |
//! | [`Capacity`] | technician-day | medium > 100%, high > 125%, critical > 150% |
//! | [`Travel`] | consecutive pair | medium over threshold, critical if the next start is missed |
//! | [`SkillMismatch`] | assignment | high, needs reassignment |
//! | [`Availability`] | assignment | high |
//! | [`DeadlineRisk`] | assignment | critical late, high on the day with no earlier date, medium on the day, low inside a wider buffer |
//! | [`GeographicMismatch`] | assignment | medium |
//! | [`WorkloadImbalance`] | day | low, medium past twice the tolerance |
//!
//! Capacity bands other than 100% come from
//! [`DetectionConfig`](crate::config::DetectionConfig).

use super::{DetectionContext, DetectionRule};
use crate::models::{Conflict, ConflictType, Severity};

/// Two assignments of one technician closer than the buffer.
#[derive(Debug, Clone, Copy)]
pub struct TimeOverlap;

impl DetectionRule for TimeOverlap {
    fn name(&self) -> &'static str {
        "time-overlap"
    }

    fn conflict_type(&self) -> ConflictType {
        ConflictType::TimeOverlap
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Conflict> {
        let buffer = ctx.snapshot.config.detection.buffer_ms;
        let mut out = Vec::new();
        for (tech, date, route) in ctx.routes() {
            for (i, a) in route.iter().enumerate() {
                // Route is sorted by start: stop once b starts past a's buffer.
                for b in route[i + 1..]
                    .iter()
                    .take_while(|b| b.window.start_ms < a.window.end_ms + buffer)
                {
                    if a.window.overlaps_with_buffer(&b.window, buffer) {
                        out.push(
                            Conflict::new(
                                ConflictType::TimeOverlap,
                                Severity::High,
                                date,
                                vec![a.id.clone(), b.id.clone()],
                                format!(
                                    "{tech} is booked on '{}' and '{}' less than {} min apart",
                                    a.job_id,
                                    b.job_id,
                                    buffer / 60_000
                                ),
                            )
                            .with_technician(tech),
                        );
                    }
                }
            }
        }
        out
    }
}

/// Technician-day over its hour or job limit.
#[derive(Debug, Clone, Copy)]
pub struct Capacity;

impl DetectionRule for Capacity {
    fn name(&self) -> &'static str {
        "capacity"
    }

    fn conflict_type(&self) -> ConflictType {
        ConflictType::CapacityExceeded
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Conflict> {
        let cfg = &ctx.snapshot.config.detection;
        let mut out = Vec::new();
        for (tech, date, route) in ctx.routes() {
            let Some(technician) = ctx.technician(tech) else {
                continue;
            };
            let utilization = ctx.tracker.utilization(tech, date);
            let jobs = ctx.tracker.load(tech, date).job_count;

            let hours_severity = if utilization > cfg.capacity_critical_ratio {
                Some(Severity::Critical)
            } else if utilization > cfg.capacity_high_ratio {
                Some(Severity::High)
            } else if utilization > 1.0 + 1e-9 {
                Some(Severity::Medium)
            } else {
                None
            };
            let jobs_severity = (jobs > technician.capacity.max_jobs).then_some(Severity::Medium);

            let Some(mut severity) = hours_severity.max(jobs_severity) else {
                continue;
            };
            if ctx.allow_overtime {
                severity = Severity::Low;
            }

            out.push(
                Conflict::new(
                    ConflictType::CapacityExceeded,
                    severity,
                    date,
                    route.iter().map(|a| a.id.clone()).collect(),
                    format!(
                        "{tech} is at {:.0}% of {:.1} h with {jobs}/{} jobs",
                        utilization * 100.0,
                        technician.capacity.max_hours,
                        technician.capacity.max_jobs
                    ),
                )
                .for_technician_day(tech),
            );
        }
        out
    }
}

/// Long or infeasible drives between consecutive stops.
#[derive(Debug, Clone, Copy)]
pub struct Travel;

impl DetectionRule for Travel {
    fn name(&self) -> &'static str {
        "travel"
    }

    fn conflict_type(&self) -> ConflictType {
        ConflictType::TravelDistance
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Conflict> {
        let threshold = ctx.snapshot.config.detection.travel_time_threshold_ms;
        let mut out = Vec::new();
        for (tech, date, route) in ctx.routes() {
            for pair in route.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                let Some(leg) = ctx.leg(prev, next) else {
                    continue;
                };
                let severity = if prev.window.end_ms + leg.duration_ms > next.window.start_ms {
                    Severity::Critical
                } else if leg.duration_ms > threshold {
                    Severity::Medium
                } else {
                    continue;
                };
                out.push(
                    Conflict::new(
                        ConflictType::TravelDistance,
                        severity,
                        date,
                        vec![prev.id.clone(), next.id.clone()],
                        format!(
                            "{tech} drives {:.1} km / {} min from '{}' to '{}'{}",
                            leg.distance_m / 1000.0,
                            leg.duration_ms / 60_000,
                            prev.job_id,
                            next.job_id,
                            if leg.approximate { " (estimated)" } else { "" }
                        ),
                    )
                    .with_technician(tech),
                );
            }
        }
        out
    }
}

/// Lead lacks a required skill without an explicit override.
#[derive(Debug, Clone, Copy)]
pub struct SkillMismatch;

impl DetectionRule for SkillMismatch {
    fn name(&self) -> &'static str {
        "skill-mismatch"
    }

    fn conflict_type(&self) -> ConflictType {
        ConflictType::SkillMismatch
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Conflict> {
        ctx.assignments
            .iter()
            .filter(|a| !a.skill_override)
            .filter_map(|a| {
                let job = ctx.job(a)?;
                let lead = ctx.technician(&a.lead_id)?;
                let missing: Vec<&str> = job
                    .required_skills
                    .iter()
                    .filter(|s| !lead.has_skill(s))
                    .map(String::as_str)
                    .collect();
                if missing.is_empty() {
                    return None;
                }
                Some(
                    Conflict::new(
                        ConflictType::SkillMismatch,
                        Severity::High,
                        a.date,
                        vec![a.id.clone()],
                        format!("{} lacks {} for '{}'", lead.id, missing.join(", "), job.id),
                    )
                    .with_technician(&lead.id)
                    .with_auto_resolvable(false),
                )
            })
            .collect()
    }
}

/// Assignment outside a technician's declared availability.
#[derive(Debug, Clone, Copy)]
pub struct Availability;

impl DetectionRule for Availability {
    fn name(&self) -> &'static str {
        "availability"
    }

    fn conflict_type(&self) -> ConflictType {
        ConflictType::Availability
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Conflict> {
        let mut out = Vec::new();
        for a in &ctx.assignments {
            let unavailable: Vec<&str> = a
                .technician_ids()
                .filter(|id| {
                    ctx.technician(id)
                        .is_some_and(|t| !t.calendar.is_available(a.date, &a.window))
                })
                .collect();
            let Some(first) = unavailable.first() else {
                continue;
            };
            out.push(
                Conflict::new(
                    ConflictType::Availability,
                    Severity::High,
                    a.date,
                    vec![a.id.clone()],
                    format!(
                        "{} not available {} at {}",
                        unavailable.join(" and "),
                        a.date,
                        a.window.start_hhmm()
                    ),
                )
                .with_technician(*first),
            );
        }
        out
    }
}

/// Assignment on or past its job's deadline, or inside the buffer.
///
/// A deadline-day booking is high only when it cannot move earlier: the job
/// is pinned to that date or it is the first planning date. Low appears only
/// when `deadline_buffer_days` is above 1.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineRisk;

impl DetectionRule for DeadlineRisk {
    fn name(&self) -> &'static str {
        "deadline-risk"
    }

    fn conflict_type(&self) -> ConflictType {
        ConflictType::DeadlineRisk
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Conflict> {
        let buffer_days = ctx.snapshot.config.detection.deadline_buffer_days;
        ctx.assignments
            .iter()
            .filter_map(|a| {
                let job = ctx.job(a)?;
                let deadline = job.deadline?;
                let slack = (deadline - a.date).num_days();
                let pinned = job.scheduled_date.is_some() || a.date <= ctx.snapshot.start_date;
                let severity = match slack {
                    s if s < 0 => Severity::Critical,
                    0 if pinned => Severity::High,
                    0 => Severity::Medium,
                    s if s < buffer_days => Severity::Low,
                    _ => return None,
                };
                let message = if slack < 0 {
                    format!("'{}' is scheduled {} day(s) after its deadline {deadline}", job.id, -slack)
                } else {
                    format!("'{}' leaves {slack} day(s) before its deadline {deadline}", job.id)
                };
                Some(
                    Conflict::new(
                        ConflictType::DeadlineRisk,
                        severity,
                        a.date,
                        vec![a.id.clone()],
                        message,
                    )
                    .with_technician(&a.lead_id),
                )
            })
            .collect()
    }
}

/// Job site outside the lead's travel radius.
#[derive(Debug, Clone, Copy)]
pub struct GeographicMismatch;

impl DetectionRule for GeographicMismatch {
    fn name(&self) -> &'static str {
        "geographic-mismatch"
    }

    fn conflict_type(&self) -> ConflictType {
        ConflictType::GeographicMismatch
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Conflict> {
        ctx.assignments
            .iter()
            .filter_map(|a| {
                let job = ctx.job(a)?;
                let lead = ctx.technician(&a.lead_id)?;
                let leg = ctx.snapshot.home_leg(lead, job);
                if leg.distance_m <= lead.travel_radius_m {
                    return None;
                }
                Some(
                    Conflict::new(
                        ConflictType::GeographicMismatch,
                        Severity::Medium,
                        a.date,
                        vec![a.id.clone()],
                        format!(
                            "'{}' is {:.1} km from {}'s base, radius {:.1} km",
                            job.id,
                            leg.distance_m / 1000.0,
                            lead.id,
                            lead.travel_radius_m / 1000.0
                        ),
                    )
                    .with_technician(&lead.id),
                )
            })
            .collect()
    }
}

/// Uneven utilization across the working roster, once per day.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadImbalance;

impl DetectionRule for WorkloadImbalance {
    fn name(&self) -> &'static str {
        "workload-imbalance"
    }

    fn conflict_type(&self) -> ConflictType {
        ConflictType::WorkloadImbalance
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Vec<Conflict> {
        let tolerance = ctx.snapshot.config.detection.imbalance_cv_tolerance;
        let mut out = Vec::new();
        for date in ctx.dates() {
            let Some((mean, cv)) = ctx.tracker.utilization_spread(date) else {
                continue;
            };
            if cv <= tolerance {
                continue;
            }
            let severity = if cv > 2.0 * tolerance {
                Severity::Medium
            } else {
                Severity::Low
            };
            let busy: Vec<String> = ctx
                .tracker
                .utilizations_on(date)
                .into_iter()
                .filter(|(_, u)| *u > mean)
                .map(|(id, _)| id)
                .collect();
            let ids: Vec<String> = busy
                .iter()
                .flat_map(|tech| ctx.route(tech, date).iter().map(|a| a.id.clone()))
                .collect();
            if ids.is_empty() {
                continue;
            }
            out.push(
                Conflict::new(
                    ConflictType::WorkloadImbalance,
                    severity,
                    date,
                    ids,
                    format!(
                        "utilization CV {cv:.2} over {tolerance:.2}; above mean: {}",
                        busy.join(", ")
                    ),
                )
                .for_day(),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::geo::DistanceMatrix;
    use crate::models::{
        Assignment, Calendar, GeoPoint, Job, SchedulingRequest, Technician, TimeWindow, HOUR_MS,
        MINUTE_MS,
    };
    use crate::snapshot::Snapshot;
    use chrono::NaiveDate;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn window(start_min: i64, end_min: i64) -> TimeWindow {
        TimeWindow::new(start_min * MINUTE_MS, end_min * MINUTE_MS)
    }

    fn request(jobs: Vec<Job>, techs: Vec<Technician>) -> SchedulingRequest {
        SchedulingRequest::for_day(jobs, techs, monday())
    }

    fn run<R: DetectionRule>(rule: R, req: &SchedulingRequest, assignments: &[Assignment]) -> Vec<Conflict> {
        let config = EngineConfig::default();
        let snap = Snapshot::new(req, &config);
        let ctx = DetectionContext::new(&snap, assignments);
        rule.detect(&ctx)
    }

    fn site(id: &str) -> Job {
        Job::new(id, GeoPoint::new(40.0, -74.0))
    }

    #[test]
    fn test_overlap_pair() {
        let req = request(vec![site("J1"), site("J2")], vec![Technician::new("T1", GeoPoint::new(40.0, -74.0))]);
        let a = Assignment::new("J1", "T1", monday(), window(540, 600));
        let b = Assignment::new("J2", "T1", monday(), window(610, 660)); // 10 min gap < 15
        let conflicts = run(TimeOverlap, &req, &[a.clone(), b.clone()]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, Severity::High);
        assert!(conflicts[0].involves(&a.id) && conflicts[0].involves(&b.id));

        let c = Assignment::new("J2", "T1", monday(), window(615, 660)); // exactly the buffer
        assert!(run(TimeOverlap, &req, &[a, c]).is_empty());
    }

    #[test]
    fn test_capacity_bands() {
        let req = request(
            vec![site("J1"), site("J2")],
            vec![Technician::new("T1", GeoPoint::new(40.0, -74.0)).with_capacity(4.0, 6)],
        );
        let a = Assignment::new("J1", "T1", monday(), TimeWindow::hours(8, 11));
        let b = Assignment::new("J2", "T1", monday(), TimeWindow::hours(12, 14));
        // 5 h of 4 h = 125%: medium (high band starts above 1.25)
        let conflicts = run(Capacity, &req, &[a.clone(), b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, Severity::Medium);
        assert_eq!(conflicts[0].id, "capacity_exceeded:T1:2024-06-03");

        let c = Assignment::new("J2", "T1", monday(), TimeWindow::hours(12, 16));
        // 7 h of 4 h = 175%
        assert_eq!(run(Capacity, &req, &[a, c])[0].severity, Severity::Critical);
    }

    #[test]
    fn test_capacity_with_overtime_is_low() {
        let req = request(
            vec![site("J1")],
            vec![Technician::new("T1", GeoPoint::new(40.0, -74.0)).with_capacity(2.0, 6)],
        )
        .with_overtime(true);
        let a = Assignment::new("J1", "T1", monday(), TimeWindow::hours(8, 12));
        assert_eq!(run(Capacity, &req, &[a])[0].severity, Severity::Low);
    }

    #[test]
    fn test_travel_threshold_and_missed_start() {
        let jobs = vec![site("J1"), site("J2")];
        let techs = vec![Technician::new("T1", GeoPoint::new(40.0, -74.0))];
        let matrix = DistanceMatrix::new().with_entry("J1", "J2", 90_000.0, 80 * MINUTE_MS);
        let req = request(jobs, techs).with_distance_matrix(matrix);

        let a = Assignment::new("J1", "T1", monday(), window(480, 540));
        let far_enough = Assignment::new("J2", "T1", monday(), window(660, 720));
        let too_soon = Assignment::new("J2", "T1", monday(), window(570, 630));

        let c = run(Travel, &req, &[a.clone(), far_enough]);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].severity, Severity::Medium);

        let c = run(Travel, &req, &[a, too_soon]);
        assert_eq!(c[0].severity, Severity::Critical);
    }

    #[test]
    fn test_skill_mismatch_unless_overridden() {
        let req = request(
            vec![site("J1").with_skill("fiber")],
            vec![Technician::new("T1", GeoPoint::new(40.0, -74.0)).with_skill("networking")],
        );
        let a = Assignment::new("J1", "T1", monday(), TimeWindow::hours(9, 10));
        let c = run(SkillMismatch, &req, &[a.clone()]);
        assert_eq!(c.len(), 1);
        assert!(!c[0].auto_resolvable);

        let mut overridden = a;
        overridden.skill_override = true;
        assert!(run(SkillMismatch, &req, &[overridden]).is_empty());
    }

    #[test]
    fn test_availability() {
        let req = request(
            vec![site("J1")],
            vec![Technician::new("T1", GeoPoint::new(40.0, -74.0)).with_calendar(Calendar::weekdays(8, 12))],
        );
        let inside = Assignment::new("J1", "T1", monday(), TimeWindow::hours(9, 10));
        let outside = Assignment::new("J1", "T1", monday(), TimeWindow::hours(11, 13));
        assert!(run(Availability, &req, &[inside]).is_empty());
        assert_eq!(run(Availability, &req, &[outside]).len(), 1);
    }

    #[test]
    fn test_deadline_severity_scales() {
        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
        let req = request(
            vec![
                site("late").with_deadline(day(2)),
                site("today").with_deadline(day(3)),
                site("fine").with_deadline(day(4)),
            ],
            vec![Technician::new("T1", GeoPoint::new(40.0, -74.0))],
        );
        let assignments = vec![
            Assignment::new("late", "T1", monday(), TimeWindow::hours(8, 9)),
            Assignment::new("today", "T1", monday(), TimeWindow::hours(10, 11)),
            Assignment::new("fine", "T1", monday(), TimeWindow::hours(12, 13)),
        ];
        let mut c = run(DeadlineRisk, &req, &assignments);
        c.sort_by(|a, b| b.severity.cmp(&a.severity));
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].severity, Severity::Critical);
        assert_eq!(c[1].severity, Severity::High);
    }

    #[test]
    fn test_deadline_day_with_earlier_dates_is_medium() {
        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
        let tech = Technician::new("T1", GeoPoint::new(40.0, -74.0));
        let req = SchedulingRequest::new(
            vec![
                site("movable").with_deadline(day(5)),
                site("pinned").with_deadline(day(5)).with_scheduled_date(day(5)),
            ],
            vec![tech.clone()],
            monday(),
            day(5),
        );
        let assignments = vec![
            Assignment::new("movable", "T1", day(5), TimeWindow::hours(8, 9)),
            Assignment::new("pinned", "T1", day(5), TimeWindow::hours(10, 11)),
        ];
        let c = run(DeadlineRisk, &req, &assignments);
        let severity_of = |job: &str| {
            c.iter()
                .find(|c| c.assignment_ids[0].starts_with(&format!("{job}/")))
                .map(|c| c.severity)
        };
        assert_eq!(severity_of("movable"), Some(Severity::Medium));
        assert_eq!(severity_of("pinned"), Some(Severity::High));

        // a wider buffer flags the day before as low
        let config = EngineConfig::from_toml_str("[detection]\ndeadline_buffer_days = 2\n").unwrap();
        let early = SchedulingRequest::new(
            vec![site("J1").with_deadline(day(5))],
            vec![tech],
            monday(),
            day(5),
        );
        let snap = Snapshot::new(&early, &config);
        let plan = [Assignment::new("J1", "T1", day(4), TimeWindow::hours(8, 9))];
        let c = DeadlineRisk.detect(&DetectionContext::new(&snap, &plan));
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].severity, Severity::Low);
        assert!(run(DeadlineRisk, &early, &plan).is_empty());
    }

    #[test]
    fn test_geographic_mismatch() {
        let req = request(
            vec![Job::new("J1", GeoPoint::new(41.0, -74.0))],
            vec![Technician::new("T1", GeoPoint::new(40.0, -74.0)).with_travel_radius_m(50_000.0)],
        );
        let a = Assignment::new("J1", "T1", monday(), TimeWindow::hours(9, 10));
        let c = run(GeographicMismatch, &req, &[a]);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].severity, Severity::Medium);
    }

    #[test]
    fn test_imbalance_once_per_day() {
        let base = GeoPoint::new(40.0, -74.0);
        let req = request(
            vec![site("J1"), site("J2"), site("J3")],
            vec![Technician::new("T1", base), Technician::new("T2", base)],
        );
        let assignments = vec![
            Assignment::new("J1", "T1", monday(), TimeWindow::hours(8, 11)),
            Assignment::new("J2", "T1", monday(), TimeWindow::hours(12, 15)),
            Assignment::new("J3", "T2", monday(), TimeWindow::hours(8, 9)),
        ];
        // 6/8 vs 1/8: CV = 0.714
        let c = run(WorkloadImbalance, &req, &assignments);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].severity, Severity::Medium);
        assert_eq!(c[0].id, "workload_imbalance:2024-06-03");
        assert_eq!(c[0].assignment_ids.len(), 2);
        assert!(c[0].assignment_ids.iter().all(|id| id.contains("/T1/")));
    }

    #[test]
    fn test_balanced_day_is_quiet() {
        let base = GeoPoint::new(40.0, -74.0);
        let req = request(
            vec![site("J1"), site("J2")],
            vec![Technician::new("T1", base), Technician::new("T2", base)],
        );
        let assignments = vec![
            Assignment::new("J1", "T1", monday(), TimeWindow::hours(8, 10)),
            Assignment::new("J2", "T2", monday(), TimeWindow::new(8 * HOUR_MS, 10 * HOUR_MS + 30 * MINUTE_MS)),
        ];
        assert!(run(WorkloadImbalance, &req, &assignments).is_empty());
    }
}
