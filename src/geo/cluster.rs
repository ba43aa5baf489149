//! Deterministic geographic clustering of jobs.
//!
//! Seeds a cluster with the lowest-ID unclustered job, then repeatedly
//! absorbs the unclustered job nearest the running centroid while it stays
//! within `max_radius_m`. The output depends only on job IDs and
//! coordinates, never on input order.

use serde::{Deserialize, Serialize};

use super::haversine_m;
use crate::models::{GeoPoint, Job};

/// A group of nearby jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// `cluster-{n}`, numbered in creation order from 1.
    pub id: String,
    /// Member job IDs, sorted.
    pub job_ids: Vec<String>,
    /// Mean position of the members.
    pub centroid: GeoPoint,
    /// Largest great-circle distance from the centroid to a member (meters).
    pub radius_m: f64,
}

impl Cluster {
    /// Number of member jobs.
    pub fn len(&self) -> usize {
        self.job_ids.len()
    }

    /// Whether the cluster has no members.
    pub fn is_empty(&self) -> bool {
        self.job_ids.is_empty()
    }

    /// Whether `job_id` belongs to this cluster.
    pub fn contains(&self, job_id: &str) -> bool {
        self.job_ids.binary_search_by(|id| id.as_str().cmp(job_id)).is_ok()
    }
}

fn centroid(points: &[GeoPoint]) -> GeoPoint {
    let n = points.len().max(1) as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lng = points.iter().map(|p| p.lng).sum::<f64>() / n;
    GeoPoint::new(lat, lng)
}

/// Groups `jobs` into clusters no wider than `max_radius_m` from their centroid.
pub fn cluster_jobs(jobs: &[Job], max_radius_m: f64) -> Vec<Cluster> {
    let mut pending: Vec<&Job> = jobs.iter().collect();
    pending.sort_by(|a, b| a.id.cmp(&b.id));
    pending.dedup_by(|a, b| a.id == b.id);

    let mut clusters = Vec::new();
    while !pending.is_empty() {
        let seed = pending.remove(0);
        let mut members = vec![seed];
        let mut points = vec![seed.location];
        let mut center = seed.location;

        loop {
            let nearest = pending
                .iter()
                .enumerate()
                .map(|(i, j)| (i, haversine_m(center, j.location)))
                .filter(|(_, d)| *d <= max_radius_m)
                // pending is sorted by id, so the first minimum wins ties
                .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                    Some((_, bd)) if bd <= d => best,
                    _ => Some((i, d)),
                });

            let Some((idx, _)) = nearest else { break };
            let candidate = pending[idx];
            let mut next_points = points.clone();
            next_points.push(candidate.location);
            let next_center = centroid(&next_points);

            // Moving the centroid must not push an existing member out of range.
            let fits = next_points
                .iter()
                .all(|p| haversine_m(next_center, *p) <= max_radius_m);
            if !fits {
                break;
            }

            pending.remove(idx);
            members.push(candidate);
            points = next_points;
            center = next_center;
        }

        let radius_m = points
            .iter()
            .map(|p| haversine_m(center, *p))
            .fold(0.0, f64::max);
        let mut job_ids: Vec<String> = members.iter().map(|j| j.id.clone()).collect();
        job_ids.sort();

        clusters.push(Cluster {
            id: format!("cluster-{}", clusters.len() + 1),
            job_ids,
            centroid: center,
            radius_m,
        });
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, lat: f64, lng: f64) -> Job {
        Job::new(id, GeoPoint::new(lat, lng))
    }

    #[test]
    fn test_two_towns() {
        let jobs = vec![
            job("J1", 40.00, -74.00),
            job("J2", 40.01, -74.01),
            job("J3", 41.00, -75.00),
            job("J4", 41.01, -75.00),
            job("J5", 40.02, -74.00),
        ];
        let clusters = cluster_jobs(&jobs, 10_000.0);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, "cluster-1");
        assert_eq!(clusters[0].job_ids, vec!["J1", "J2", "J5"]);
        assert_eq!(clusters[1].job_ids, vec!["J3", "J4"]);
        assert!(clusters[0].radius_m <= 10_000.0);
        assert!(clusters[1].contains("J4"));
        assert!(!clusters[1].contains("J1"));
    }

    #[test]
    fn test_order_independent() {
        let mut jobs = vec![
            job("A", 10.0, 10.0),
            job("B", 10.05, 10.0),
            job("C", 12.0, 10.0),
        ];
        let forward = cluster_jobs(&jobs, 20_000.0);
        jobs.reverse();
        let backward = cluster_jobs(&jobs, 20_000.0);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_zero_radius_singletons() {
        let jobs = vec![job("A", 0.0, 0.0), job("B", 0.1, 0.0)];
        let clusters = cluster_jobs(&jobs, 0.0);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_jobs(&[], 1000.0).is_empty());
    }
}
