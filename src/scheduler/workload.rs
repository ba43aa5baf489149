//! Per-technician, per-day capacity accounting.
//!
//! The tracker is rebuilt from the snapshot at the start of every pass and
//! updated in O(1) as tentative assignments are added or removed. It never
//! outlives the pass that created it.
//!
//! Utilization above 1.0 is reported as overloaded, not rejected.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Assignment, Calendar, Technician, HOUR_MS};

/// Raw accumulated load for one technician-day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayLoad {
    /// Time on site (ms).
    pub assigned_ms: i64,
    /// Number of jobs.
    pub job_count: u32,
    /// Driving time between stops (ms).
    pub travel_ms: i64,
}

/// Workload summary for one technician-day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub assigned_hours: f64,
    pub job_count: u32,
    /// Used time over daily capacity, in percent. May exceed 100.
    pub utilization_percentage: f64,
    /// Over the hour or job limit.
    pub overloaded: bool,
}

#[derive(Debug, Clone)]
struct Profile {
    capacity_ms: i64,
    max_jobs: u32,
    calendar: Calendar,
}

/// Capacity ledger for one pass.
#[derive(Debug, Clone)]
pub struct WorkloadTracker {
    profiles: HashMap<String, Profile>,
    loads: HashMap<(String, NaiveDate), DayLoad>,
    include_travel: bool,
}

impl WorkloadTracker {
    /// Creates an empty tracker for a roster.
    pub fn new<'t>(
        technicians: impl IntoIterator<Item = &'t Technician>,
        include_travel: bool,
    ) -> Self {
        let profiles = technicians
            .into_iter()
            .map(|t| {
                (
                    t.id.clone(),
                    Profile {
                        capacity_ms: t.capacity_ms(),
                        max_jobs: t.capacity.max_jobs,
                        calendar: t.calendar.clone(),
                    },
                )
            })
            .collect();
        Self {
            profiles,
            loads: HashMap::new(),
            include_travel,
        }
    }

    /// Creates a tracker and records every active assignment.
    pub fn rebuild<'t, 'a>(
        technicians: impl IntoIterator<Item = &'t Technician>,
        assignments: impl IntoIterator<Item = &'a Assignment>,
        include_travel: bool,
    ) -> Self {
        let mut tracker = Self::new(technicians, include_travel);
        for a in assignments.into_iter().filter(|a| a.is_active()) {
            tracker.record(a);
        }
        tracker
    }

    /// Adds on-site time and one job.
    pub fn add(&mut self, technician_id: &str, date: NaiveDate, duration_ms: i64) {
        let load = self.entry(technician_id, date);
        load.assigned_ms += duration_ms;
        load.job_count += 1;
    }

    /// Removes on-site time and one job.
    pub fn remove(&mut self, technician_id: &str, date: NaiveDate, duration_ms: i64) {
        let load = self.entry(technician_id, date);
        load.assigned_ms = (load.assigned_ms - duration_ms).max(0);
        load.job_count = load.job_count.saturating_sub(1);
    }

    /// Adjusts driving time by `delta_ms` (may be negative).
    pub fn adjust_travel(&mut self, technician_id: &str, date: NaiveDate, delta_ms: i64) {
        let load = self.entry(technician_id, date);
        load.travel_ms = (load.travel_ms + delta_ms).max(0);
    }

    /// Records an assignment for its lead and assistant.
    pub fn record(&mut self, assignment: &Assignment) {
        for tech in assignment.technician_ids() {
            self.add(tech, assignment.date, assignment.duration_ms());
        }
    }

    /// Reverses [`record`](Self::record).
    pub fn release(&mut self, assignment: &Assignment) {
        for tech in assignment.technician_ids() {
            self.remove(tech, assignment.date, assignment.duration_ms());
        }
    }

    fn entry(&mut self, technician_id: &str, date: NaiveDate) -> &mut DayLoad {
        self.loads
            .entry((technician_id.to_string(), date))
            .or_default()
    }

    /// Raw load for a technician-day.
    pub fn load(&self, technician_id: &str, date: NaiveDate) -> DayLoad {
        self.loads
            .get(&(technician_id.to_string(), date))
            .copied()
            .unwrap_or_default()
    }

    /// Time counted against capacity (ms).
    pub fn used_ms(&self, technician_id: &str, date: NaiveDate) -> i64 {
        let load = self.load(technician_id, date);
        if self.include_travel {
            load.assigned_ms + load.travel_ms
        } else {
            load.assigned_ms
        }
    }

    /// Daily capacity (ms); 0 for unknown technicians.
    pub fn capacity_ms(&self, technician_id: &str) -> i64 {
        self.profiles
            .get(technician_id)
            .map(|p| p.capacity_ms)
            .unwrap_or(0)
    }

    /// Capacity still free on a day (ms). Negative when overloaded.
    pub fn remaining_ms(&self, technician_id: &str, date: NaiveDate) -> i64 {
        self.capacity_ms(technician_id) - self.used_ms(technician_id, date)
    }

    /// Used time over capacity (1.0 = full).
    pub fn utilization(&self, technician_id: &str, date: NaiveDate) -> f64 {
        let capacity = self.capacity_ms(technician_id);
        let used = self.used_ms(technician_id, date);
        if capacity <= 0 {
            return if used > 0 { f64::INFINITY } else { 0.0 };
        }
        used as f64 / capacity as f64
    }

    /// Whether the day is over its hour or job limit.
    pub fn is_overloaded(&self, technician_id: &str, date: NaiveDate) -> bool {
        let max_jobs = self
            .profiles
            .get(technician_id)
            .map(|p| p.max_jobs)
            .unwrap_or(0);
        self.remaining_ms(technician_id, date) < 0
            || self.load(technician_id, date).job_count > max_jobs
    }

    /// Workload summary for a technician-day.
    pub fn workload(&self, technician_id: &str, date: NaiveDate) -> Workload {
        let load = self.load(technician_id, date);
        Workload {
            assigned_hours: load.assigned_ms as f64 / HOUR_MS as f64,
            job_count: load.job_count,
            utilization_percentage: self.utilization(technician_id, date) * 100.0,
            overloaded: self.is_overloaded(technician_id, date),
        }
    }

    /// Whether one more job of `duration_ms` (plus `travel_ms` if travel
    /// counts) stays within both daily limits.
    pub fn fits(
        &self,
        technician_id: &str,
        date: NaiveDate,
        duration_ms: i64,
        travel_ms: i64,
    ) -> bool {
        let Some(profile) = self.profiles.get(technician_id) else {
            return false;
        };
        let extra = if self.include_travel {
            duration_ms + travel_ms
        } else {
            duration_ms
        };
        self.used_ms(technician_id, date) + extra <= profile.capacity_ms
            && self.load(technician_id, date).job_count < profile.max_jobs
    }

    /// Utilization of every technician who works on `date`, sorted by ID.
    pub fn utilizations_on(&self, date: NaiveDate) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .profiles
            .iter()
            .filter(|(_, p)| p.calendar.works_on(date))
            .map(|(id, _)| (id.clone(), self.utilization(id, date)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Median utilization across technicians working on `date`.
    pub fn median_utilization(&self, date: NaiveDate) -> f64 {
        let mut values: Vec<f64> = self
            .utilizations_on(date)
            .into_iter()
            .map(|(_, u)| u)
            .collect();
        if values.is_empty() {
            return 0.0;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        }
    }

    /// Mean and coefficient of variation of utilization on `date`.
    ///
    /// `None` with fewer than two working technicians or an idle day.
    pub fn utilization_spread(&self, date: NaiveDate) -> Option<(f64, f64)> {
        let values: Vec<f64> = self
            .utilizations_on(date)
            .into_iter()
            .map(|(_, u)| u)
            .filter(|u| u.is_finite())
            .collect();
        if values.len() < 2 {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        if mean <= 0.0 {
            return None;
        }
        let variance = values.iter().map(|u| (u - mean).powi(2)).sum::<f64>() / n;
        Some((mean, variance.sqrt() / mean))
    }

    /// Dates with any recorded load, sorted.
    pub fn active_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .loads
            .iter()
            .filter(|(_, l)| l.job_count > 0)
            .map(|((_, d), _)| *d)
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }
}
