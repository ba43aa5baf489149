//! Daily route resequencing.
//!
//! [`two_opt`] improves the visiting order of one technician-day by
//! reversing segments while the home → stops → home distance drops;
//! [`retime`] then lays the stops out back to back in that order.
//!
//! # Reference
//! Croes (1958), "A Method for Solving Traveling-Salesman Problems"

use chrono::NaiveDate;

use crate::models::{Job, Technician, TimeWindow};
use crate::scheduler::round_up;
use crate::snapshot::Snapshot;

/// Home → stops → home distance (meters).
pub fn route_distance(snapshot: &Snapshot<'_>, technician: &Technician, jobs: &[&Job]) -> f64 {
    let (Some(first), Some(last)) = (jobs.first(), jobs.last()) else {
        return 0.0;
    };
    snapshot.home_leg(technician, first).distance_m
        + jobs
            .windows(2)
            .map(|pair| snapshot.job_leg(pair[0], pair[1]).distance_m)
            .sum::<f64>()
        + snapshot.home_leg(technician, last).distance_m
}

/// Visiting order (indices into `jobs`) after 2-opt improvement.
///
/// First-improvement; stops when a full sweep finds no shorter reversal.
pub fn two_opt(snapshot: &Snapshot<'_>, technician: &Technician, jobs: &[&Job]) -> Vec<usize> {
    let n = jobs.len();
    let mut order: Vec<usize> = (0..n).collect();
    if n < 3 {
        return order;
    }
    let distance = |order: &[usize]| {
        let seq: Vec<&Job> = order.iter().map(|&i| jobs[i]).collect();
        route_distance(snapshot, technician, &seq)
    };

    let mut best = distance(&order);
    let mut improved = true;
    let mut sweeps = 0;
    while improved && sweeps < n * n {
        improved = false;
        sweeps += 1;
        for i in 0..n - 1 {
            for k in i + 1..n {
                let mut candidate = order.clone();
                candidate[i..=k].reverse();
                let d = distance(&candidate);
                if d < best - 1e-9 {
                    order = candidate;
                    best = d;
                    improved = true;
                }
            }
        }
    }
    order
}

/// Earliest back-to-back windows for `stops` (job, on-site ms) in order,
/// starting no earlier than `day_start_ms`.
///
/// Each stop waits for the buffer and the drive from the previous one and
/// must fit inside one availability window. `None` if a stop does not fit.
pub fn retime(
    snapshot: &Snapshot<'_>,
    technician: &Technician,
    date: NaiveDate,
    stops: &[(&Job, i64)],
    day_start_ms: i64,
) -> Option<Vec<TimeWindow>> {
    let buffer = snapshot.config.detection.buffer_ms;
    let granularity = snapshot.config.scheduling.slot_granularity_ms;
    let available = technician.calendar.windows_on(date);

    let mut windows = Vec::with_capacity(stops.len());
    let mut cursor = day_start_ms;
    let mut prev: Option<&Job> = None;
    for &(job, duration_ms) in stops {
        let earliest = match prev {
            Some(p) => cursor + buffer + snapshot.job_leg(p, job).duration_ms,
            None => cursor,
        };
        let window = available.iter().find_map(|w| {
            let start = round_up(earliest.max(w.start_ms), granularity);
            let window = TimeWindow::new(start, start + duration_ms);
            w.covers(&window).then_some(window)
        })?;
        cursor = window.end_ms;
        prev = Some(job);
        windows.push(window);
    }
    Some(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::geo::DistanceMatrix;
    use crate::models::{Calendar, GeoPoint, SchedulingRequest, HOUR_MS, MINUTE_MS};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    // Home at 0, stops on a line at 10, 20, 30 km.
    fn request() -> SchedulingRequest {
        let p = GeoPoint::new(0.0, 0.0);
        let km = |a: f64, b: f64| ((a - b).abs() * 1000.0, ((a - b).abs() * 60_000.0) as i64);
        let pos = [("H", 0.0), ("A", 10.0), ("B", 20.0), ("C", 30.0)];
        let mut matrix = DistanceMatrix::new();
        for (i, (from, a)) in pos.iter().enumerate() {
            for (to, b) in &pos[i + 1..] {
                let (d, t) = km(*a, *b);
                matrix.insert(*from, *to, d, t);
            }
        }
        SchedulingRequest::for_day(
            vec![Job::new("A", p), Job::new("B", p), Job::new("C", p)],
            vec![Technician::new("H", p).with_calendar(Calendar::weekdays(8, 17))],
            monday(),
        )
        .with_distance_matrix(matrix)
    }

    #[test]
    fn test_two_opt_uncrosses() {
        let req = request();
        let config = EngineConfig::default();
        let snap = Snapshot::new(&req, &config);
        let tech = snap.technician("H").unwrap();
        let jobs = vec![
            snap.job("C").unwrap(),
            snap.job("A").unwrap(),
            snap.job("B").unwrap(),
        ];

        // H-C-A-B-H = 30 + 20 + 10 + 20 km
        assert!((route_distance(&snap, tech, &jobs) - 80_000.0).abs() < 1e-6);
        let order = two_opt(&snap, tech, &jobs);
        let seq: Vec<&Job> = order.iter().map(|&i| jobs[i]).collect();
        assert!((route_distance(&snap, tech, &seq) - 60_000.0).abs() < 1e-6);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_two_opt_keeps_short_routes() {
        let req = request();
        let config = EngineConfig::default();
        let snap = Snapshot::new(&req, &config);
        let tech = snap.technician("H").unwrap();
        let jobs = vec![snap.job("B").unwrap(), snap.job("A").unwrap()];
        assert_eq!(two_opt(&snap, tech, &jobs), vec![0, 1]);
    }

    #[test]
    fn test_retime_back_to_back() {
        let req = request();
        let config = EngineConfig::default();
        let snap = Snapshot::new(&req, &config);
        let tech = snap.technician("H").unwrap();
        let stops = vec![
            (snap.job("A").unwrap(), HOUR_MS),
            (snap.job("B").unwrap(), HOUR_MS),
        ];
        let windows = retime(&snap, tech, monday(), &stops, 8 * HOUR_MS).unwrap();
        assert_eq!(windows[0], TimeWindow::hours(8, 9));
        // 9:00 + 15 min buffer + 10 min drive
        assert_eq!(windows[1].start_ms, 9 * HOUR_MS + 25 * MINUTE_MS);
    }

    #[test]
    fn test_retime_fails_past_calendar() {
        let req = request();
        let config = EngineConfig::default();
        let snap = Snapshot::new(&req, &config);
        let tech = snap.technician("H").unwrap();
        let stops = vec![
            (snap.job("A").unwrap(), 5 * HOUR_MS),
            (snap.job("B").unwrap(), 5 * HOUR_MS),
        ];
        assert!(retime(&snap, tech, monday(), &stops, 8 * HOUR_MS).is_none());
    }
}
