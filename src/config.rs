//! Engine configuration.
//!
//! Every threshold the engine uses lives here with a sensible default.
//! Call sites historically disagreed on some of these numbers, so none
//! of them are hard-coded in the engines.
//!
//! Configuration may be loaded from TOML; missing keys keep their defaults:
//!
//! ```
//! use u_crew::config::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     [detection]
//!     travel_time_threshold_ms = 4200000
//! "#).unwrap();
//! assert_eq!(config.detection.travel_time_threshold_ms, 4_200_000);
//! assert_eq!(config.detection.buffer_ms, 900_000);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{HOUR_MS, MINUTE_MS};

/// Hard ceiling on resolution iterations per conflict.
pub const MAX_RESOLUTION_ITERATIONS: u32 = 3;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub geo: GeoConfig,
    pub scheduling: SchedulingConfig,
    pub resolution: ResolutionConfig,
    pub impact: ImpactWeights,
}

/// Conflict detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum gap between two jobs of one technician (ms).
    pub buffer_ms: i64,
    /// Travel time between consecutive stops that raises a conflict (ms).
    pub travel_time_threshold_ms: i64,
    /// Coefficient of variation of daily utilization that raises an imbalance.
    pub imbalance_cv_tolerance: f64,
    /// Days of slack wanted before a deadline.
    pub deadline_buffer_days: i64,
    /// Utilization ratio from which capacity overage is high severity.
    pub capacity_high_ratio: f64,
    /// Utilization ratio from which capacity overage is critical.
    pub capacity_critical_ratio: f64,
}

/// Distance estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Average driving speed for fallback estimates (km/h).
    pub average_speed_kmh: f64,
    /// Multiplier from great-circle to road distance.
    pub road_factor: f64,
}

/// Slot placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Start times are rounded up to this granularity (ms).
    pub slot_granularity_ms: i64,
    /// Count driving time against daily capacity.
    pub include_travel_in_capacity: bool,
}

/// Conflict resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Iterations per conflict before escalating (1..=3).
    pub max_iterations: u32,
    /// How many days either side a reschedule may move a job.
    pub search_days: i64,
}

/// Weights of the conflict impact score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactWeights {
    /// Per severity rank (1..=4).
    pub severity: f64,
    /// Per affected assignment.
    pub affected: f64,
    /// Per priority rank (1..=4) of the most important affected job.
    pub priority: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            buffer_ms: 15 * MINUTE_MS,
            travel_time_threshold_ms: HOUR_MS,
            imbalance_cv_tolerance: 0.3,
            deadline_buffer_days: 1,
            capacity_high_ratio: 1.25,
            capacity_critical_ratio: 1.5,
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: 50.0,
            road_factor: 1.2,
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_granularity_ms: 5 * MINUTE_MS,
            include_travel_in_capacity: false,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_RESOLUTION_ITERATIONS,
            search_days: 3,
        }
    }
}

impl Default for ImpactWeights {
    fn default() -> Self {
        Self {
            severity: 10.0,
            affected: 2.0,
            priority: 5.0,
        }
    }
}

impl EngineConfig {
    /// Parses TOML and validates the result.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        if d.buffer_ms < 0 {
            return Err(ConfigError::invalid("detection.buffer_ms", "must not be negative"));
        }
        if d.travel_time_threshold_ms <= 0 {
            return Err(ConfigError::invalid(
                "detection.travel_time_threshold_ms",
                "must be positive",
            ));
        }
        if !(d.imbalance_cv_tolerance > 0.0) {
            return Err(ConfigError::invalid(
                "detection.imbalance_cv_tolerance",
                "must be positive",
            ));
        }
        if d.deadline_buffer_days < 0 {
            return Err(ConfigError::invalid(
                "detection.deadline_buffer_days",
                "must not be negative",
            ));
        }
        if !(d.capacity_high_ratio > 1.0 && d.capacity_critical_ratio >= d.capacity_high_ratio) {
            return Err(ConfigError::invalid(
                "detection.capacity_critical_ratio",
                "need 1.0 < capacity_high_ratio <= capacity_critical_ratio",
            ));
        }
        if !(self.geo.average_speed_kmh > 0.0) {
            return Err(ConfigError::invalid("geo.average_speed_kmh", "must be positive"));
        }
        if !(self.geo.road_factor >= 1.0) {
            return Err(ConfigError::invalid("geo.road_factor", "must be at least 1.0"));
        }
        if self.scheduling.slot_granularity_ms <= 0 {
            return Err(ConfigError::invalid(
                "scheduling.slot_granularity_ms",
                "must be positive",
            ));
        }
        if !(1..=MAX_RESOLUTION_ITERATIONS).contains(&self.resolution.max_iterations) {
            return Err(ConfigError::invalid(
                "resolution.max_iterations",
                format!("must be between 1 and {MAX_RESOLUTION_ITERATIONS}"),
            ));
        }
        if self.resolution.search_days < 0 {
            return Err(ConfigError::invalid(
                "resolution.search_days",
                "must not be negative",
            ));
        }
        Ok(())
    }
}
