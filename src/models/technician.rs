//! Technician model.
//!
//! Technicians are the crew members that perform jobs. Each has a role,
//! a skill set, a home base, an availability calendar, a daily capacity
//! and a travel radius. The engine never mutates technician records.

use serde::{Deserialize, Serialize};

use super::{Calendar, GeoPoint};

/// A field technician.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technician {
    /// Unique technician identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Crew role.
    pub role: TechnicianRole,
    /// Skills with proficiency levels.
    pub skills: Vec<Skill>,
    /// Where the technician starts and ends each day.
    pub home_base: GeoPoint,
    /// Availability schedule.
    pub calendar: Calendar,
    /// Per-day workload limits.
    pub capacity: DailyCapacity,
    /// Maximum distance from home base the technician will serve (meters).
    pub travel_radius_m: f64,
}

/// Crew role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicianRole {
    /// Can run a job on their own.
    Lead,
    /// Accompanies a lead on jobs that need two people.
    Assistant,
}

/// A skill with proficiency level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    /// Skill name (e.g., "fiber", "networking", "electrical").
    pub name: String,
    /// Proficiency level (0.0 to 1.0, where 1.0 = expert).
    pub level: f64,
}

/// Daily workload limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyCapacity {
    /// Maximum scheduled hours per day.
    pub max_hours: f64,
    /// Maximum number of jobs per day.
    pub max_jobs: u32,
}

impl Default for DailyCapacity {
    fn default() -> Self {
        Self {
            max_hours: 8.0,
            max_jobs: 6,
        }
    }
}

impl Technician {
    /// Creates a lead technician based at `home_base`.
    pub fn new(id: impl Into<String>, home_base: GeoPoint) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            role: TechnicianRole::Lead,
            skills: Vec::new(),
            home_base,
            calendar: Calendar::new(),
            capacity: DailyCapacity::default(),
            travel_radius_m: 80_000.0,
        }
    }

    /// Creates an assistant technician.
    pub fn assistant(id: impl Into<String>, home_base: GeoPoint) -> Self {
        Self::new(id, home_base).with_role(TechnicianRole::Assistant)
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the role.
    pub fn with_role(mut self, role: TechnicianRole) -> Self {
        self.role = role;
        self
    }

    /// Adds a skill at full proficiency.
    pub fn with_skill(self, name: impl Into<String>) -> Self {
        self.with_skill_level(name, 1.0)
    }

    /// Adds a skill with a proficiency level.
    pub fn with_skill_level(mut self, name: impl Into<String>, level: f64) -> Self {
        self.skills.push(Skill::new(name, level));
        self
    }

    /// Sets the availability calendar.
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Sets the daily capacity.
    pub fn with_capacity(mut self, max_hours: f64, max_jobs: u32) -> Self {
        self.capacity = DailyCapacity {
            max_hours,
            max_jobs,
        };
        self
    }

    /// Sets the travel radius (meters).
    pub fn with_travel_radius_m(mut self, radius_m: f64) -> Self {
        self.travel_radius_m = radius_m;
        self
    }

    /// Whether this technician has a given skill.
    pub fn has_skill(&self, name: &str) -> bool {
        self.skills.iter().any(|s| s.name == name)
    }

    /// Returns the proficiency level for a skill (0.0 if not found).
    pub fn skill_level(&self, name: &str) -> f64 {
        self.skills
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.level)
            .unwrap_or(0.0)
    }

    /// Fraction of `required` skills this technician holds.
    ///
    /// Returns 1.0 when nothing is required.
    pub fn skill_match_ratio(&self, required: &[String]) -> f64 {
        if required.is_empty() {
            return 1.0;
        }
        let held = required.iter().filter(|s| self.has_skill(s)).count();
        held as f64 / required.len() as f64
    }

    /// Whether the technician holds every skill in `required`.
    pub fn covers_skills(&self, required: &[String]) -> bool {
        required.iter().all(|s| self.has_skill(s))
    }

    /// Daily capacity in ms.
    pub fn capacity_ms(&self) -> i64 {
        (self.capacity.max_hours * super::calendar::HOUR_MS as f64).round() as i64
    }
}

impl Skill {
    /// Creates a new skill.
    pub fn new(name: impl Into<String>, level: f64) -> Self {
        Self {
            name: name.into(),
            level: level.clamp(0.0, 1.0),
        }
    }
}
