//! Sparse distance matrix.
//!
//! Keys are location IDs: job IDs for job sites and technician IDs for
//! home bases. Entries are symmetric unless both directions are given.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One known leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub from: String,
    pub to: String,
    /// Road distance (meters).
    pub distance_m: f64,
    /// Driving time (ms).
    pub duration_ms: i64,
}

/// Sparse map of location pairs to (distance, duration).
///
/// Serialized as a flat list of [`MatrixEntry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<MatrixEntry>", into = "Vec<MatrixEntry>")]
pub struct DistanceMatrix {
    entries: HashMap<(String, String), (f64, i64)>,
}

impl DistanceMatrix {
    /// Creates an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a leg.
    pub fn with_entry(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        distance_m: f64,
        duration_ms: i64,
    ) -> Self {
        self.insert(from, to, distance_m, duration_ms);
        self
    }

    /// Inserts or replaces a leg.
    pub fn insert(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        distance_m: f64,
        duration_ms: i64,
    ) {
        self.entries
            .insert((from.into(), to.into()), (distance_m, duration_ms));
    }

    /// Looks up a leg, falling back to the reverse direction.
    pub fn get(&self, from: &str, to: &str) -> Option<(f64, i64)> {
        self.entries
            .get(&(from.to_string(), to.to_string()))
            .or_else(|| self.entries.get(&(to.to_string(), from.to_string())))
            .copied()
    }

    /// Drops every leg touching `location_id` (its location changed).
    pub fn invalidate(&mut self, location_id: &str) {
        self.entries
            .retain(|(from, to), _| from != location_id && to != location_id);
    }

    /// Number of stored legs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the matrix has no legs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<MatrixEntry>> for DistanceMatrix {
    fn from(list: Vec<MatrixEntry>) -> Self {
        let mut matrix = Self::new();
        for e in list {
            matrix.insert(e.from, e.to, e.distance_m, e.duration_ms);
        }
        matrix
    }
}

impl From<DistanceMatrix> for Vec<MatrixEntry> {
    fn from(matrix: DistanceMatrix) -> Self {
        let mut list: Vec<MatrixEntry> = matrix
            .entries
            .into_iter()
            .map(|((from, to), (distance_m, duration_ms))| MatrixEntry {
                from,
                to,
                distance_m,
                duration_ms,
            })
            .collect();
        list.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        list
    }
}
