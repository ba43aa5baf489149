//! Mutable planning state of one pass.
//!
//! [`PlanningState`] holds the assignments placed so far, each
//! technician's daily route, and the [`WorkloadTracker`]. It is cheap to
//! clone so resolution candidates can be tried on a copy.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::WorkloadTracker;
use crate::geo::TravelEstimate;
use crate::models::{Assignment, Job, TimeWindow};
use crate::snapshot::Snapshot;

/// One stop on a technician's route.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub assignment_id: String,
    pub job_id: String,
    pub window: TimeWindow,
}

/// An open slot for a job on one technician-day.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub window: TimeWindow,
    /// Leg into the job (from the previous stop, or home base).
    pub inbound: TravelEstimate,
    /// Location ID the inbound leg starts from.
    pub inbound_from: String,
    /// Leg to the following stop, if any.
    pub outbound: Option<(String, TravelEstimate)>,
    /// Change in between-stop driving time caused by inserting the job (ms).
    pub travel_delta_ms: i64,
}

/// Assignments and routes built up during one pass.
#[derive(Debug, Clone)]
pub struct PlanningState<'a> {
    snapshot: &'a Snapshot<'a>,
    pub tracker: WorkloadTracker,
    routes: BTreeMap<(String, NaiveDate), Vec<Stop>>,
    assignments: BTreeMap<String, Assignment>,
}

impl<'a> PlanningState<'a> {
    /// Seeds the state with the active `existing` assignments.
    pub fn new(snapshot: &'a Snapshot<'a>, existing: &[Assignment]) -> Self {
        let mut state = Self {
            snapshot,
            tracker: WorkloadTracker::new(
                snapshot.technicians(),
                snapshot.config.scheduling.include_travel_in_capacity,
            ),
            routes: BTreeMap::new(),
            assignments: BTreeMap::new(),
        };
        for a in existing.iter().filter(|a| a.is_active()) {
            state.place(a.clone());
        }
        state
    }

    /// The snapshot this state plans against.
    pub fn snapshot(&self) -> &'a Snapshot<'a> {
        self.snapshot
    }

    /// Adds an assignment to the routes of its lead and assistant.
    pub fn place(&mut self, assignment: Assignment) {
        for tech in assignment.technician_ids() {
            let before = self.route_travel_ms(tech, assignment.date);
            let route = self
                .routes
                .entry((tech.to_string(), assignment.date))
                .or_default();
            let pos = route
                .iter()
                .position(|s| {
                    (s.window.start_ms, s.assignment_id.as_str())
                        > (assignment.window.start_ms, assignment.id.as_str())
                })
                .unwrap_or(route.len());
            route.insert(
                pos,
                Stop {
                    assignment_id: assignment.id.clone(),
                    job_id: assignment.job_id.clone(),
                    window: assignment.window,
                },
            );
            let after = self.route_travel_ms(tech, assignment.date);
            self.tracker.adjust_travel(tech, assignment.date, after - before);
        }
        self.tracker.record(&assignment);
        self.assignments.insert(assignment.id.clone(), assignment);
    }

    /// Removes an assignment; returns it if it was present.
    pub fn remove(&mut self, assignment_id: &str) -> Option<Assignment> {
        let assignment = self.assignments.remove(assignment_id)?;
        for tech in assignment.technician_ids() {
            let before = self.route_travel_ms(tech, assignment.date);
            let key = (tech.to_string(), assignment.date);
            if let Some(route) = self.routes.get_mut(&key) {
                route.retain(|s| s.assignment_id != assignment_id);
                if route.is_empty() {
                    self.routes.remove(&key);
                }
            }
            let after = self.route_travel_ms(tech, assignment.date);
            self.tracker.adjust_travel(tech, assignment.date, after - before);
        }
        self.tracker.release(&assignment);
        Some(assignment)
    }

    /// Looks up a placed assignment.
    pub fn assignment(&self, id: &str) -> Option<&Assignment> {
        self.assignments.get(id)
    }

    /// All placed assignments, sorted by ID.
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.values()
    }

    /// Placed assignments of one job.
    pub fn assignments_for_job<'s>(
        &'s self,
        job_id: &'s str,
    ) -> impl Iterator<Item = &'s Assignment> + 's {
        self.assignments.values().filter(move |a| a.job_id == job_id)
    }

    /// Clones every placed assignment, sorted by ID.
    pub fn to_vec(&self) -> Vec<Assignment> {
        self.assignments.values().cloned().collect()
    }

    /// A technician's stops on a date, by start time.
    pub fn route(&self, technician_id: &str, date: NaiveDate) -> &[Stop] {
        self.routes
            .get(&(technician_id.to_string(), date))
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// Driving time between consecutive stops (ms).
    pub fn route_travel_ms(&self, technician_id: &str, date: NaiveDate) -> i64 {
        self.route(technician_id, date)
            .windows(2)
            .filter_map(|pair| self.snapshot.leg_by_id(&pair[0].job_id, &pair[1].job_id))
            .map(|leg| leg.duration_ms)
            .sum()
    }

    /// Utilization of a technician-day if `extra_ms` more were booked.
    pub fn projected_utilization(&self, technician_id: &str, date: NaiveDate, extra_ms: i64) -> f64 {
        let capacity = self.tracker.capacity_ms(technician_id);
        let used = self.tracker.used_ms(technician_id, date) + extra_ms;
        if capacity <= 0 {
            return if used > 0 { f64::INFINITY } else { 0.0 };
        }
        used as f64 / capacity as f64
    }

    /// Whether `window` fits into the technician's route without breaking
    /// the buffer or the drive from the previous stop and to the next one.
    pub fn window_clear(
        &self,
        technician_id: &str,
        date: NaiveDate,
        job: &Job,
        window: &TimeWindow,
    ) -> bool {
        self.neighbours(technician_id, date, job, window).is_some()
    }

    /// Earliest slot for `job` on a technician-day, or `None`.
    ///
    /// Candidate starts are each availability window's start and the end of
    /// every stop plus buffer and travel, rounded up to the slot granularity.
    pub fn find_slot(
        &self,
        technician_id: &str,
        job: &Job,
        date: NaiveDate,
        duration_ms: i64,
    ) -> Option<Slot> {
        let technician = self.snapshot.technician(technician_id)?;
        let buffer = self.snapshot.config.detection.buffer_ms;
        let granularity = self.snapshot.config.scheduling.slot_granularity_ms;
        let route = self.route(technician_id, date);

        let mut starts: Vec<i64> = technician
            .calendar
            .windows_on(date)
            .iter()
            .map(|w| w.start_ms)
            .collect();
        for stop in route {
            let travel = self
                .snapshot
                .leg_by_id(&stop.job_id, &job.id)
                .map_or(0, |l| l.duration_ms);
            starts.push(stop.window.end_ms + buffer + travel);
        }
        let mut starts: Vec<i64> = starts
            .into_iter()
            .map(|s| round_up(s, granularity))
            .collect();
        starts.sort_unstable();
        starts.dedup();

        starts.into_iter().find_map(|start| {
            let window = TimeWindow::new(start, start + duration_ms);
            if !technician.calendar.is_available(date, &window) {
                return None;
            }
            let (prev, next) = self.neighbours(technician_id, date, job, &window)?;

            let (inbound_from, inbound) = match prev {
                Some(stop) => (
                    stop.job_id.clone(),
                    self.snapshot.leg_by_id(&stop.job_id, &job.id)?,
                ),
                None => (
                    technician.id.clone(),
                    self.snapshot.home_leg(technician, job),
                ),
            };
            let outbound = match next {
                Some(stop) => Some((
                    stop.job_id.clone(),
                    self.snapshot.leg_by_id(&job.id, &stop.job_id)?,
                )),
                None => None,
            };
            let replaced = match (prev, next) {
                (Some(p), Some(n)) => self
                    .snapshot
                    .leg_by_id(&p.job_id, &n.job_id)
                    .map_or(0, |l| l.duration_ms),
                _ => 0,
            };
            let travel_delta_ms = prev.map_or(0, |_| inbound.duration_ms)
                + outbound.as_ref().map_or(0, |(_, l)| l.duration_ms)
                - replaced;

            Some(Slot {
                window,
                inbound,
                inbound_from,
                outbound,
                travel_delta_ms,
            })
        })
    }

    /// Stops immediately before and after `window`, if the window is clear.
    fn neighbours(
        &self,
        technician_id: &str,
        date: NaiveDate,
        job: &Job,
        window: &TimeWindow,
    ) -> Option<(Option<&Stop>, Option<&Stop>)> {
        let buffer = self.snapshot.config.detection.buffer_ms;
        let route = self.route(technician_id, date);
        if route.iter().any(|s| s.window.overlaps(window)) {
            return None;
        }
        let prev = route.iter().rev().find(|s| s.window.end_ms <= window.start_ms);
        let next = route.iter().find(|s| s.window.start_ms >= window.end_ms);

        if let Some(p) = prev {
            let travel = self
                .snapshot
                .leg_by_id(&p.job_id, &job.id)
                .map_or(0, |l| l.duration_ms);
            if window.start_ms - p.window.end_ms < buffer + travel {
                return None;
            }
        }
        if let Some(n) = next {
            let travel = self
                .snapshot
                .leg_by_id(&job.id, &n.job_id)
                .map_or(0, |l| l.duration_ms);
            if n.window.start_ms - window.end_ms < buffer + travel {
                return None;
            }
        }
        Some((prev, next))
    }
}

/// Rounds `value` up to a multiple of `step`.
pub(crate) fn round_up(value: i64, step: i64) -> i64 {
    if step <= 1 {
        return value;
    }
    (value + step - 1).div_euclid(step) * step
}
