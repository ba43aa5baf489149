//! Conflict detection.
//!
//! Conflicts are recomputed from the assignment set on every scan. Each
//! [`DetectionRule`] looks for one [`ConflictType`] independently; the
//! [`ConflictDetector`] runs all of them, scores impact, and returns a
//! deduplicated list sorted by descending impact.
//!
//! # Impact
//! ```text
//! impact = w_severity · severity_rank
//!        + w_affected · |affected assignments|
//!        + w_priority · max priority_rank of affected jobs
//! ```
//! with weights from [`ImpactWeights`](crate::config::ImpactWeights).

mod detector;
pub mod rules;

pub use detector::ConflictDetector;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::geo::TravelEstimate;
use crate::models::{Assignment, Conflict, ConflictType, Job, Technician};
use crate::scheduler::WorkloadTracker;
use crate::snapshot::Snapshot;

/// A conflict detection rule.
pub trait DetectionRule: Send + Sync + Debug {
    /// Rule name.
    fn name(&self) -> &'static str;

    /// Conflict type this rule reports.
    fn conflict_type(&self) -> ConflictType;

    /// Scans the context. Impact scores are filled in by the detector.
    fn detect(&self, context: &DetectionContext<'_>) -> Vec<Conflict>;
}

/// One technician's stops on one date, ordered by start time.
pub type Route<'a> = Vec<&'a Assignment>;

/// Everything a rule may inspect during one scan.
#[derive(Debug)]
pub struct DetectionContext<'a> {
    pub snapshot: &'a Snapshot<'a>,
    /// Active assignments, sorted by ID.
    pub assignments: Vec<&'a Assignment>,
    /// Workload rebuilt from `assignments`.
    pub tracker: WorkloadTracker,
    /// Allow overtime without raising capacity severity.
    pub allow_overtime: bool,
    routes: BTreeMap<(String, NaiveDate), Route<'a>>,
}

impl<'a> DetectionContext<'a> {
    /// Builds a context over `assignments`; replaced ones are ignored.
    pub fn new(snapshot: &'a Snapshot<'a>, assignments: &'a [Assignment]) -> Self {
        let mut active: Vec<&Assignment> = assignments.iter().filter(|a| a.is_active()).collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));

        let mut routes: BTreeMap<(String, NaiveDate), Route<'a>> = BTreeMap::new();
        for a in active.iter().copied() {
            for tech in a.technician_ids() {
                routes.entry((tech.to_string(), a.date)).or_default().push(a);
            }
        }
        for route in routes.values_mut() {
            route.sort_by(|a, b| {
                a.window
                    .start_ms
                    .cmp(&b.window.start_ms)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        let mut tracker = WorkloadTracker::rebuild(
            snapshot.technicians(),
            active.iter().copied(),
            snapshot.config.scheduling.include_travel_in_capacity,
        );
        if snapshot.config.scheduling.include_travel_in_capacity {
            for ((tech, date), route) in &routes {
                let travel: i64 = route
                    .windows(2)
                    .filter_map(|pair| snapshot.leg_by_id(&pair[0].job_id, &pair[1].job_id))
                    .map(|leg| leg.duration_ms)
                    .sum();
                tracker.adjust_travel(tech, *date, travel);
            }
        }

        Self {
            snapshot,
            assignments: active,
            tracker,
            allow_overtime: snapshot.constraints.allow_overtime_assignment,
            routes,
        }
    }

    /// Every (technician, date) route, in key order.
    pub fn routes<'s>(
        &'s self,
    ) -> impl Iterator<Item = (&'s str, NaiveDate, &'s [&'a Assignment])> + 's {
        self.routes
            .iter()
            .map(|((tech, date), route)| (tech.as_str(), *date, route.as_slice()))
    }

    /// One technician's route on a date.
    pub fn route(&self, technician_id: &str, date: NaiveDate) -> &[&'a Assignment] {
        self.routes
            .get(&(technician_id.to_string(), date))
            .map_or(&[], |r| r.as_slice())
    }

    /// Dates with at least one assignment, sorted.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.assignments.iter().map(|a| a.date).collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// The job behind an assignment.
    pub fn job(&self, assignment: &Assignment) -> Option<&'a Job> {
        self.snapshot.job(&assignment.job_id)
    }

    /// Looks up a technician.
    pub fn technician(&self, id: &str) -> Option<&'a Technician> {
        self.snapshot.technician(id)
    }

    /// Travel between two consecutive stops.
    pub fn leg(&self, from: &Assignment, to: &Assignment) -> Option<TravelEstimate> {
        self.snapshot.leg_by_id(&from.job_id, &to.job_id)
    }

    /// Looks up an assignment by ID.
    pub fn assignment(&self, id: &str) -> Option<&'a Assignment> {
        self.assignments
            .binary_search_by(|a| a.id.as_str().cmp(id))
            .ok()
            .map(|i| self.assignments[i])
    }
}
