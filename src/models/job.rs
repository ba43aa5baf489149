//! Job (installation) model.
//!
//! A job is one field installation to be performed at a customer site:
//! a location, the skills it needs, how long it takes, and how urgent it is.
//! Jobs are immutable during an optimization pass.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::calendar::HOUR_MS;

/// A geographic coordinate in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl GeoPoint {
    /// Creates a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether the coordinate is finite and inside the valid lat/lng ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Job priority.
///
/// Ordered: `Low < Medium < High < Urgent`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Numeric rank (1 = low .. 4 = urgent).
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }

    /// Rank normalized to (0, 1]: low 0.25, urgent 1.0.
    pub fn weight(self) -> f64 {
        f64::from(self.rank()) / 4.0
    }
}

/// A field installation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: String,
    /// Human-readable name (customer / site).
    pub name: String,
    /// Site location (already geocoded).
    pub location: GeoPoint,
    /// Skills the lead technician must hold.
    pub required_skills: Vec<String>,
    /// Customer priority.
    pub priority: Priority,
    /// Estimated on-site duration (ms).
    pub duration_ms: i64,
    /// Latest acceptable installation date. `None` = no deadline.
    pub deadline: Option<NaiveDate>,
    /// Date fixed with the customer. `None` = any date in the request range.
    pub scheduled_date: Option<NaiveDate>,
    /// Technicians the customer asked for.
    pub preferred_technicians: Vec<String>,
    /// Whether an assistant must accompany the lead.
    pub requires_assistant: bool,
    /// Whether the job may be split across days.
    pub splittable: bool,
    /// Minimum duration (ms) of each split part.
    pub min_split_ms: i64,
    /// Current assignment ID, if the job is already assigned.
    pub current_assignment: Option<String>,
}

impl Job {
    /// Creates a new job at the given location.
    pub fn new(id: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            location,
            required_skills: Vec::new(),
            priority: Priority::Medium,
            duration_ms: HOUR_MS,
            deadline: None,
            scheduled_date: None,
            preferred_technicians: Vec::new(),
            requires_assistant: false,
            splittable: false,
            min_split_ms: 0,
            current_assignment: None,
        }
    }

    /// Sets the job name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a required skill.
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.required_skills.push(skill.into());
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the estimated duration (ms).
    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Sets the estimated duration in hours.
    pub fn with_duration_hours(self, hours: f64) -> Self {
        self.with_duration_ms((hours * HOUR_MS as f64).round() as i64)
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Pins the job to a date.
    pub fn with_scheduled_date(mut self, date: NaiveDate) -> Self {
        self.scheduled_date = Some(date);
        self
    }

    /// Adds a preferred technician.
    pub fn with_preferred_technician(mut self, technician_id: impl Into<String>) -> Self {
        self.preferred_technicians.push(technician_id.into());
        self
    }

    /// Requires an assistant on site.
    pub fn with_assistant(mut self) -> Self {
        self.requires_assistant = true;
        self
    }

    /// Allows splitting with a minimum part size.
    pub fn with_splitting(mut self, min_split_ms: i64) -> Self {
        self.splittable = true;
        self.min_split_ms = min_split_ms;
        self
    }

    /// Marks the job as already assigned.
    pub fn with_current_assignment(mut self, assignment_id: impl Into<String>) -> Self {
        self.current_assignment = Some(assignment_id.into());
        self
    }

    /// Estimated duration in hours.
    pub fn duration_hours(&self) -> f64 {
        self.duration_ms as f64 / HOUR_MS as f64
    }

    /// Whether the job is already assigned.
    pub fn is_assigned(&self) -> bool {
        self.current_assignment.is_some()
    }

    /// Whether `technician_id` is preferred. `None` if there are no preferences.
    pub fn prefers(&self, technician_id: &str) -> Option<bool> {
        if self.preferred_technicians.is_empty() {
            None
        } else {
            Some(self.preferred_technicians.iter().any(|t| t == technician_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builder() {
        let deadline = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let job = Job::new("J1", GeoPoint::new(52.52, 13.40))
            .with_name("ACME HQ")
            .with_skill("fiber")
            .with_priority(Priority::Urgent)
            .with_duration_hours(2.5)
            .with_deadline(deadline)
            .with_preferred_technician("T1")
            .with_assistant();

        assert_eq!(job.id, "J1");
        assert_eq!(job.name, "ACME HQ");
        assert_eq!(job.required_skills, vec!["fiber"]);
        assert_eq!(job.priority, Priority::Urgent);
        assert_eq!(job.duration_ms, 9_000_000);
        assert!((job.duration_hours() - 2.5).abs() < 1e-10);
        assert_eq!(job.deadline, Some(deadline));
        assert!(job.requires_assistant);
        assert!(!job.is_assigned());
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert!((Priority::Urgent.weight() - 1.0).abs() < 1e-10);
        assert!((Priority::Low.weight() - 0.25).abs() < 1e-10);
    }

    #[test]
    fn test_prefers() {
        let plain = Job::new("J1", GeoPoint::new(0.0, 0.0));
        assert_eq!(plain.prefers("T1"), None);

        let picky = plain.with_preferred_technician("T1");
        assert_eq!(picky.prefers("T1"), Some(true));
        assert_eq!(picky.prefers("T2"), Some(false));
    }

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(45.0, -122.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
