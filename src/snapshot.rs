//! Read-only inputs of one pass.
//!
//! A [`Snapshot`] indexes the request's jobs and technicians by ID, owns
//! the pass-local [`GeoModel`], and carries the configuration every engine
//! reads. It is built once per call and shared by reference; engines keep
//! their mutable state elsewhere.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::geo::{GeoModel, Location, TravelEstimate};
use crate::models::{AssignmentConstraints, Job, SchedulingRequest, Technician};

/// Indexed, read-only view of a request.
#[derive(Debug)]
pub struct Snapshot<'a> {
    jobs: BTreeMap<&'a str, &'a Job>,
    technicians: BTreeMap<&'a str, &'a Technician>,
    /// Distance lookups for this pass.
    pub geo: GeoModel,
    pub config: &'a EngineConfig,
    pub constraints: AssignmentConstraints,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl<'a> Snapshot<'a> {
    /// Indexes a request.
    pub fn new(request: &'a SchedulingRequest, config: &'a EngineConfig) -> Self {
        Self {
            jobs: request.jobs.iter().map(|j| (j.id.as_str(), j)).collect(),
            technicians: request
                .technicians
                .iter()
                .map(|t| (t.id.as_str(), t))
                .collect(),
            geo: GeoModel::new(request.distance_matrix.clone(), config.geo.clone()),
            config,
            constraints: request.constraints.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
        }
    }

    /// Looks up a job.
    pub fn job(&self, id: &str) -> Option<&'a Job> {
        self.jobs.get(id).copied()
    }

    /// Looks up a technician.
    pub fn technician(&self, id: &str) -> Option<&'a Technician> {
        self.technicians.get(id).copied()
    }

    /// All jobs, sorted by ID.
    pub fn jobs(&self) -> impl Iterator<Item = &'a Job> + '_ {
        self.jobs.values().copied()
    }

    /// All technicians, sorted by ID.
    pub fn technicians(&self) -> impl Iterator<Item = &'a Technician> + '_ {
        self.technicians.values().copied()
    }

    /// Planning dates, inclusive.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start_date
            .iter_days()
            .take_while(|d| *d <= self.end_date)
            .collect()
    }

    /// Leg between two job sites.
    pub fn job_leg(&self, from: &Job, to: &Job) -> TravelEstimate {
        self.geo.travel(Location::job(from), Location::job(to))
    }

    /// Leg from a technician's home base to a job site.
    pub fn home_leg(&self, technician: &Technician, job: &Job) -> TravelEstimate {
        self.geo.travel(Location::home(technician), Location::job(job))
    }

    /// Leg between two job sites by ID; `None` if either job is unknown.
    pub fn leg_by_id(&self, from_job: &str, to_job: &str) -> Option<TravelEstimate> {
        Some(self.job_leg(self.job(from_job)?, self.job(to_job)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::DistanceMatrix;
    use crate::models::GeoPoint;

    #[test]
    fn test_indexes_and_legs() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let request = SchedulingRequest::new(
            vec![
                Job::new("J2", GeoPoint::new(0.0, 0.1)),
                Job::new("J1", GeoPoint::new(0.0, 0.0)),
            ],
            vec![Technician::new("T1", GeoPoint::new(0.0, 0.0))],
            d,
            d.succ_opt().unwrap(),
        )
        .with_distance_matrix(DistanceMatrix::new().with_entry("J1", "J2", 500.0, 60_000));
        let config = EngineConfig::default();
        let snap = Snapshot::new(&request, &config);

        assert_eq!(snap.jobs().map(|j| j.id.as_str()).collect::<Vec<_>>(), vec!["J1", "J2"]);
        assert_eq!(snap.dates().len(), 2);
        let leg = snap.leg_by_id("J2", "J1").unwrap();
        assert_eq!(leg.duration_ms, 60_000);
        assert!(!leg.approximate);
        assert!(snap.leg_by_id("J1", "J9").is_none());

        let tech = snap.technician("T1").unwrap();
        let home = snap.home_leg(tech, snap.job("J1").unwrap());
        assert!(home.distance_m < 1e-6);
    }
}
