//! Distances, travel times and geographic clustering.
//!
//! [`GeoModel`] answers "how far and how long from A to B". Supplied
//! [`DistanceMatrix`] entries win; otherwise the great-circle distance is
//! scaled by a road factor, converted to time at an average speed, and
//! flagged as approximate. Fallback estimates are cached per pass and the
//! cache entry is dropped automatically when either endpoint moves.
//!
//! # Reference
//! Sinnott (1984), "Virtues of the Haversine", Sky and Telescope 68(2)

mod cluster;
mod matrix;

pub use cluster::{cluster_jobs, Cluster};
pub use matrix::{DistanceMatrix, MatrixEntry};

use serde::{Deserialize, Serialize};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::config::GeoConfig;
use crate::models::{GeoPoint, Job, Technician};

/// Mean Earth radius (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance and driving time for one leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelEstimate {
    /// Road distance (meters).
    pub distance_m: f64,
    /// Driving time (ms).
    pub duration_ms: i64,
    /// Estimated from coordinates rather than taken from the matrix.
    pub approximate: bool,
}

impl TravelEstimate {
    /// A zero-length leg.
    pub fn zero() -> Self {
        Self {
            distance_m: 0.0,
            duration_ms: 0,
            approximate: false,
        }
    }

    /// Driving time in seconds.
    pub fn duration_secs(&self) -> i64 {
        self.duration_ms / 1000
    }
}

/// What a [`Location`] ID names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocationKind {
    /// A job site, keyed by job ID.
    Site,
    /// A technician's home base, keyed by technician ID.
    Home,
}

/// A point with the ID used for matrix lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location<'a> {
    pub id: &'a str,
    pub kind: LocationKind,
    pub point: GeoPoint,
}

impl<'a> Location<'a> {
    /// Creates a site location.
    pub fn new(id: &'a str, point: GeoPoint) -> Self {
        Self {
            id,
            kind: LocationKind::Site,
            point,
        }
    }

    /// A job site.
    pub fn job(job: &'a Job) -> Self {
        Self::new(&job.id, job.location)
    }

    /// A technician's home base.
    pub fn home(technician: &'a Technician) -> Self {
        Self {
            kind: LocationKind::Home,
            ..Self::new(&technician.id, technician.home_base)
        }
    }

    fn key(&self) -> (LocationKind, String) {
        (self.kind, self.id.to_string())
    }

    fn same_place(&self, other: &Location<'_>) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

type LegKey = ((LocationKind, String), (LocationKind, String));

#[derive(Debug, Clone, Copy)]
struct CachedLeg {
    from: GeoPoint,
    to: GeoPoint,
    estimate: TravelEstimate,
}

/// Distance and duration lookups for one pass.
#[derive(Debug)]
pub struct GeoModel {
    matrix: DistanceMatrix,
    config: GeoConfig,
    cache: Mutex<HashMap<LegKey, CachedLeg>>,
}

impl GeoModel {
    /// Creates a model over a supplied matrix.
    pub fn new(matrix: DistanceMatrix, config: GeoConfig) -> Self {
        Self {
            matrix,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A model with no matrix: every leg is a great-circle estimate.
    pub fn estimate_only(config: GeoConfig) -> Self {
        Self::new(DistanceMatrix::new(), config)
    }

    /// The supplied matrix.
    pub fn matrix(&self) -> &DistanceMatrix {
        &self.matrix
    }

    /// `(meters, seconds)` between two locations.
    pub fn distance(&self, from: Location<'_>, to: Location<'_>) -> (f64, i64) {
        let leg = self.travel(from, to);
        (leg.distance_m, leg.duration_secs())
    }

    /// Travel estimate between two locations.
    pub fn travel(&self, from: Location<'_>, to: Location<'_>) -> TravelEstimate {
        if from.same_place(&to) {
            return TravelEstimate::zero();
        }
        if let Some((distance_m, duration_ms)) = self.matrix.get(from.id, to.id) {
            return TravelEstimate {
                distance_m,
                duration_ms,
                approximate: false,
            };
        }

        // Fallback legs are symmetric; cache under the ordered key.
        let (from_key, to_key) = (from.key(), to.key());
        let (key, a, b) = if from_key <= to_key {
            ((from_key, to_key), from.point, to.point)
        } else {
            ((to_key, from_key), to.point, from.point)
        };

        let mut cache = self.cache.lock();
        if let Some(hit) = cache.get(&key) {
            if hit.from == a && hit.to == b {
                return hit.estimate;
            }
        }
        let estimate = self.estimate(a, b);
        cache.insert(
            key,
            CachedLeg {
                from: a,
                to: b,
                estimate,
            },
        );
        estimate
    }

    /// Great-circle based estimate between two points.
    pub fn estimate(&self, a: GeoPoint, b: GeoPoint) -> TravelEstimate {
        let distance_m = haversine_m(a, b) * self.config.road_factor;
        let speed_m_per_ms = self.config.average_speed_kmh * 1000.0 / 3_600_000.0;
        TravelEstimate {
            distance_m,
            duration_ms: (distance_m / speed_m_per_ms).round() as i64,
            approximate: true,
        }
    }

    /// Forgets everything known about `location_id` after it moved.
    pub fn invalidate(&mut self, location_id: &str) {
        self.matrix.invalidate(location_id);
        self.cache
            .get_mut()
            .retain(|(a, b), _| a.1 != location_id && b.1 != location_id);
    }

    /// Groups jobs into geographic clusters (see [`cluster_jobs`]).
    pub fn cluster(&self, jobs: &[Job], max_radius_m: f64) -> Vec<Cluster> {
        cluster_jobs(jobs, max_radius_m)
    }

    /// Number of cached fallback legs.
    pub fn cached_legs(&self) -> usize {
        self.cache.lock().len()
    }
}

/// Great-circle distance between two points (meters).
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}
