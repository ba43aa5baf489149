//! Plan quality metrics.
//!
//! Computes [`OptimizationMetrics`] and the per-date breakdown from a set
//! of assignments.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Travel distance / time | Sum over technician-days of home → stops → home |
//! | Workload variance | Population variance of daily utilization |
//! | Utilization rate | Mean daily utilization |
//! | Improvement | Travel saved vs. one round trip from home per assignment, in percent |
//! | Approximate legs | Legs estimated from great-circle distance |
//!
//! Utilization statistics cover every technician-day in the planning range
//! on which the technician works; on-site time only.
//!
//! # Reference
//! Toth & Vigo (2014), "Vehicle Routing", Ch. 1: route cost measures

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::{
    Assignment, DailySchedule, OptimizationMetrics, TechnicianDay, HOUR_MS,
};
use crate::snapshot::Snapshot;

#[derive(Debug, Default)]
struct RouteCost {
    distance_m: f64,
    duration_ms: i64,
    approximate_legs: usize,
}

/// Computes metrics and daily schedules over the active `assignments`.
pub fn evaluate(
    snapshot: &Snapshot<'_>,
    assignments: &[Assignment],
) -> (OptimizationMetrics, Vec<DailySchedule>) {
    let mut routes: BTreeMap<(NaiveDate, &str), Vec<&Assignment>> = BTreeMap::new();
    for a in assignments.iter().filter(|a| a.is_active()) {
        for tech in a.technician_ids() {
            routes.entry((a.date, tech)).or_default().push(a);
        }
    }
    for route in routes.values_mut() {
        route.sort_by(|a, b| {
            a.window
                .start_ms
                .cmp(&b.window.start_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    let mut metrics = OptimizationMetrics {
        assignment_count: assignments.iter().filter(|a| a.is_active()).count(),
        ..Default::default()
    };
    let mut baseline_m = 0.0;
    let mut daily: BTreeMap<NaiveDate, Vec<TechnicianDay>> = BTreeMap::new();

    for ((date, tech), route) in &routes {
        let cost = route_cost(snapshot, tech, route);
        metrics.total_travel_distance_m += cost.distance_m;
        metrics.total_travel_time_ms += cost.duration_ms;
        metrics.approximate_legs += cost.approximate_legs;
        baseline_m += baseline_distance(snapshot, tech, route);

        let on_site_ms: i64 = route.iter().map(|a| a.duration_ms()).sum();
        let capacity_ms = snapshot.technician(tech).map_or(0, |t| t.capacity_ms());
        daily.entry(*date).or_default().push(TechnicianDay {
            technician_id: tech.to_string(),
            assignment_ids: route.iter().map(|a| a.id.clone()).collect(),
            scheduled_hours: on_site_ms as f64 / HOUR_MS as f64,
            travel_distance_m: cost.distance_m,
            utilization: ratio(on_site_ms, capacity_ms),
        });
    }

    if baseline_m > 0.0 {
        metrics.improvement_percentage =
            (baseline_m - metrics.total_travel_distance_m) / baseline_m * 100.0;
    }

    let utilizations = working_utilizations(snapshot, &routes);
    if !utilizations.is_empty() {
        let n = utilizations.len() as f64;
        let mean = utilizations.iter().sum::<f64>() / n;
        metrics.utilization_rate = mean;
        metrics.workload_variance =
            utilizations.iter().map(|u| (u - mean).powi(2)).sum::<f64>() / n;
    }

    let schedules = daily
        .into_iter()
        .map(|(date, technicians)| DailySchedule { date, technicians })
        .collect();
    (metrics, schedules)
}

fn route_cost(snapshot: &Snapshot<'_>, technician_id: &str, route: &[&Assignment]) -> RouteCost {
    let mut cost = RouteCost::default();
    let Some(technician) = snapshot.technician(technician_id) else {
        return cost;
    };
    let jobs: Vec<_> = route.iter().filter_map(|a| snapshot.job(&a.job_id)).collect();
    let (Some(first), Some(last)) = (jobs.first(), jobs.last()) else {
        return cost;
    };

    let legs = std::iter::once(snapshot.home_leg(technician, first))
        .chain(jobs.windows(2).map(|pair| snapshot.job_leg(pair[0], pair[1])))
        .chain(std::iter::once(snapshot.home_leg(technician, last)));
    for leg in legs {
        cost.distance_m += leg.distance_m;
        cost.duration_ms += leg.duration_ms;
        if leg.approximate {
            cost.approximate_legs += 1;
        }
    }
    cost
}

fn baseline_distance(snapshot: &Snapshot<'_>, technician_id: &str, route: &[&Assignment]) -> f64 {
    let Some(technician) = snapshot.technician(technician_id) else {
        return 0.0;
    };
    route
        .iter()
        .filter_map(|a| snapshot.job(&a.job_id))
        .map(|job| 2.0 * snapshot.home_leg(technician, job).distance_m)
        .sum()
}

fn working_utilizations(
    snapshot: &Snapshot<'_>,
    routes: &BTreeMap<(NaiveDate, &str), Vec<&Assignment>>,
) -> Vec<f64> {
    let mut out = Vec::new();
    for date in snapshot.dates() {
        for technician in snapshot.technicians() {
            let capacity_ms = technician.capacity_ms();
            if capacity_ms <= 0 || !technician.calendar.works_on(date) {
                continue;
            }
            let on_site_ms: i64 = routes
                .get(&(date, technician.id.as_str()))
                .map_or(0, |r| r.iter().map(|a| a.duration_ms()).sum());
            out.push(ratio(on_site_ms, capacity_ms));
        }
    }
    out
}

fn ratio(used_ms: i64, capacity_ms: i64) -> f64 {
    if capacity_ms <= 0 {
        0.0
    } else {
        used_ms as f64 / capacity_ms as f64
    }
}
