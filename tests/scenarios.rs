//! End-to-end scheduling scenarios through the orchestrator.

use chrono::NaiveDate;
use u_crew::config::EngineConfig;
use u_crew::geo::DistanceMatrix;
use u_crew::models::{
    Assignment, AutoAssignmentCriteria, Calendar, CommitInstruction, Conflict, ConflictType,
    GeoPoint, Job, OptimizationGoal, Priority, SchedulingRequest, Severity, Technician,
    TimeWindow, UnassignedReason, HOUR_MS, MINUTE_MS,
};
use u_crew::scheduler::{AutoAssignmentEngine, PlanningState};
use u_crew::snapshot::Snapshot;
use u_crew::{EngineError, SchedulingOrchestrator};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

fn depot() -> GeoPoint {
    GeoPoint::new(40.71, -74.00)
}

fn technician(id: &str) -> Technician {
    Technician::new(id, depot()).with_calendar(Calendar::weekdays(8, 17))
}

fn of_type(conflicts: &[Conflict], kind: ConflictType) -> Vec<&Conflict> {
    conflicts.iter().filter(|c| c.conflict_type == kind).collect()
}

const MILE_M: f64 = 1_609.344;

#[test]
fn test_skill_constrained_roster() {
    let request = SchedulingRequest::for_day(
        vec![
            Job::new("A", GeoPoint::new(40.72, -74.01)).with_skill("fiber"),
            Job::new("B", GeoPoint::new(40.70, -73.99)).with_skill("networking"),
        ],
        vec![
            technician("T1").with_skill("networking"),
            technician("T2").with_skill("networking").with_skill("fiber"),
            technician("T3").with_skill("fiber"),
        ],
        monday(),
    );

    let result = SchedulingOrchestrator::default()
        .run_auto_assignment(&request)
        .unwrap();
    let a = result.assignment_for_job("A").unwrap();
    let b = result.assignment_for_job("B").unwrap();
    assert!(a.lead_id == "T2" || a.lead_id == "T3");
    assert!(b.lead_id == "T1" || b.lead_id == "T2");

    if a.lead_id == b.lead_id {
        assert!(!a.window.overlaps(&b.window));
    }
    assert!(of_type(&result.conflicts, ConflictType::TimeOverlap).is_empty());
    assert!(of_type(&result.conflicts, ConflictType::CapacityExceeded).is_empty());
    assert!(of_type(&result.conflicts, ConflictType::SkillMismatch).is_empty());
}

#[test]
fn test_full_day_rejects_more_work() {
    let request = SchedulingRequest::for_day(
        vec![
            Job::new("HELD", depot()).with_duration_hours(7.0),
            Job::new("NEW", depot()).with_duration_hours(2.0),
        ],
        vec![Technician::new("T1", depot()).with_capacity(8.0, 6)],
        monday(),
    )
    .with_overtime(false)
    .with_existing_assignments(vec![Assignment::new(
        "HELD",
        "T1",
        monday(),
        TimeWindow::hours(8, 15),
    )
    .committed()]);

    let config = EngineConfig::default();
    let snapshot = Snapshot::new(&request, &config);
    let state = PlanningState::new(&snapshot, &request.existing_assignments);
    let evaluation = AutoAssignmentEngine::default().evaluate(
        &state,
        snapshot.job("NEW").unwrap(),
        snapshot.technician("T1").unwrap(),
        monday(),
    );
    assert!(!evaluation.is_feasible());
    assert!((evaluation.score.total - 0.0).abs() < 1e-10);

    let result = SchedulingOrchestrator::default()
        .run_auto_assignment(&request)
        .unwrap();
    assert!(result.assignments.is_empty());
    assert_eq!(
        result.unassigned("NEW").map(|u| u.reason),
        Some(UnassignedReason::CapacityExceeded)
    );
}

#[test]
fn test_overtime_allows_more_work() {
    let request = SchedulingRequest::for_day(
        vec![
            Job::new("HELD", depot()).with_duration_hours(7.0),
            Job::new("NEW", depot()).with_duration_hours(2.0),
        ],
        vec![Technician::new("T1", depot()).with_capacity(8.0, 6)],
        monday(),
    )
    .with_overtime(true)
    .with_existing_assignments(vec![Assignment::new(
        "HELD",
        "T1",
        monday(),
        TimeWindow::hours(8, 15),
    )
    .committed()]);

    let result = SchedulingOrchestrator::default()
        .run_auto_assignment(&request)
        .unwrap();
    let new = result.assignment_for_job("NEW").unwrap();
    assert!(new.window.start_ms >= 15 * HOUR_MS + 15 * MINUTE_MS);
    let capacity = of_type(&result.conflicts, ConflictType::CapacityExceeded);
    assert_eq!(capacity.len(), 1);
    assert_eq!(capacity[0].severity, Severity::Low);
}

fn travel_pair(distance_m: f64, minutes: i64, second_start_ms: i64) -> SchedulingRequest {
    let far = GeoPoint::new(40.71, -74.00 + distance_m / 84_000.0);
    SchedulingRequest::for_day(
        vec![Job::new("J1", depot()), Job::new("J2", far)],
        vec![technician("T1")],
        monday(),
    )
    .with_distance_matrix(DistanceMatrix::new().with_entry(
        "J1",
        "J2",
        distance_m,
        minutes * MINUTE_MS,
    ))
    .with_existing_assignments(vec![
        Assignment::new("J1", "T1", monday(), TimeWindow::hours(8, 9)).committed(),
        Assignment::new(
            "J2",
            "T1",
            monday(),
            TimeWindow::new(second_start_ms, second_start_ms + HOUR_MS),
        )
        .committed(),
    ])
}

#[test]
fn test_short_hop_no_travel_conflict() {
    let request = travel_pair(MILE_M, 10, 9 * HOUR_MS + 30 * MINUTE_MS);
    let result = SchedulingOrchestrator::default()
        .run_auto_assignment(&request)
        .unwrap();
    assert!(of_type(&result.conflicts, ConflictType::TravelDistance).is_empty());
    assert!(of_type(&result.conflicts, ConflictType::TimeOverlap).is_empty());
}

#[test]
fn test_long_haul_travel_conflict() {
    let config = EngineConfig::from_toml_str(
        "[detection]\ntravel_time_threshold_ms = 4200000\n",
    )
    .unwrap();
    let request = travel_pair(40.0 * MILE_M, 80, 11 * HOUR_MS);
    let result = SchedulingOrchestrator::new(config)
        .run_auto_assignment(&request)
        .unwrap();

    let travel = of_type(&result.conflicts, ConflictType::TravelDistance);
    assert_eq!(travel.len(), 1);
    assert_eq!(travel[0].severity, Severity::Medium);
    assert_eq!(travel[0].technician_id.as_deref(), Some("T1"));
    assert!(travel[0].involves(&request.existing_assignments[0].id));
    assert!(travel[0].involves(&request.existing_assignments[1].id));
}

#[test]
fn test_bulk_dry_run_reports_commit_boundary() {
    let request = SchedulingRequest::for_day(
        vec![
            Job::new("J1", depot()).with_priority(Priority::High),
            Job::new("J2", depot()),
            Job::new("J3", depot()).with_skill("crane"),
        ],
        vec![technician("T1"), technician("T2")],
        monday(),
    )
    .with_existing_assignments(vec![Assignment::new(
        "J1",
        "T1",
        monday(),
        TimeWindow::hours(15, 16),
    )
    .committed()]);
    let ids: Vec<String> = ["J1", "J3"].iter().map(|s| s.to_string()).collect();
    let criteria = AutoAssignmentCriteria::for_goal(OptimizationGoal::MinimizeTravel);

    let bulk = SchedulingOrchestrator::default()
        .run_bulk(&request, &ids, &criteria, true)
        .unwrap();
    assert!(bulk.dry_run);
    assert_eq!(bulk.commit, CommitInstruction::DoNotCommit);
    assert_eq!(bulk.requested_job_ids, ids);
    assert_eq!(bulk.assigned_job_ids, vec!["J1".to_string()]);
    assert_eq!(bulk.failed_job_ids, vec!["J3".to_string()]);
    assert!(!bulk.is_complete());
    assert_eq!(
        bulk.result.unassigned("J3").map(|u| u.reason),
        Some(UnassignedReason::MissingSkills)
    );

    let old_id = &request.existing_assignments[0].id;
    assert_eq!(bulk.result.superseded.len(), 1);
    assert_eq!(&bulk.result.superseded[0].assignment_id, old_id);
    // The input is never touched.
    assert_eq!(request.existing_assignments[0].window, TimeWindow::hours(15, 16));

    let committed = SchedulingOrchestrator::default()
        .run_bulk(&request, &ids, &criteria, false)
        .unwrap();
    assert_eq!(committed.commit, CommitInstruction::Commit);
    assert_eq!(committed.result.assignments, bulk.result.assignments);
}

#[test]
fn test_double_booking_resolved_end_to_end() {
    let request = SchedulingRequest::for_day(
        vec![Job::new("J1", depot()), Job::new("J2", depot()), Job::new("J3", depot())],
        vec![technician("T1"), technician("T2")],
        monday(),
    )
    .with_existing_assignments(vec![
        Assignment::new("J1", "T1", monday(), TimeWindow::hours(9, 11)).committed(),
        Assignment::new("J2", "T1", monday(), TimeWindow::hours(10, 12)).committed(),
    ])
    .with_auto_resolve(true);

    let orchestrator = SchedulingOrchestrator::default();
    let result = orchestrator.run_auto_assignment(&request).unwrap();
    assert!(result.assignment_for_job("J3").is_some());
    let overlap = of_type(&result.conflicts, ConflictType::TimeOverlap);
    assert_eq!(overlap.len(), 1);
    // The missed drive between the two ranks first; fixing it may clear the overlap too.
    let first = result.conflicts[0].id.clone();

    let resolved = orchestrator.resolve_conflicts(&request, result, false).unwrap();
    let ranked = resolved.resolutions_for(&first);
    assert!(!ranked.is_empty());
    assert!(ranked[0].suggested);
    assert!(ranked[0].verified);
    assert!(of_type(&resolved.conflicts, ConflictType::TimeOverlap).is_empty());
    assert!(!resolved.superseded.is_empty());
    for s in &resolved.superseded {
        assert!(request.existing_assignments.iter().any(|a| a.id == s.assignment_id));
    }
}

#[test]
fn test_partitioned_matches_sequential_locally() {
    let boston = GeoPoint::new(42.36, -71.06);
    let denver = GeoPoint::new(39.74, -104.99);
    let request = SchedulingRequest::for_day(
        vec![
            Job::new("B1", GeoPoint::new(42.37, -71.05)),
            Job::new("B2", GeoPoint::new(42.35, -71.07)),
            Job::new("D1", GeoPoint::new(39.75, -104.98)),
        ],
        vec![
            Technician::new("TB", boston).with_calendar(Calendar::weekdays(8, 17)),
            Technician::new("TD", denver).with_calendar(Calendar::weekdays(8, 17)),
        ],
        monday(),
    );
    let orchestrator = SchedulingOrchestrator::default();

    let partitioned = orchestrator.run_partitioned(&request, 30_000.0).unwrap();
    assert!(partitioned.unassigned_jobs.is_empty());
    assert_eq!(partitioned.assignments.len(), 3);
    assert_eq!(partitioned.assignment_for_job("B1").unwrap().lead_id, "TB");
    assert_eq!(partitioned.assignment_for_job("B2").unwrap().lead_id, "TB");
    assert_eq!(partitioned.assignment_for_job("D1").unwrap().lead_id, "TD");
    assert!(of_type(&partitioned.conflicts, ConflictType::TimeOverlap).is_empty());

    let sequential = orchestrator.run_auto_assignment(&request).unwrap();
    for a in &partitioned.assignments {
        assert_eq!(sequential.assignment_for_job(&a.job_id).unwrap().lead_id, a.lead_id);
    }
}

#[test]
fn test_partitioned_respects_assistant_bookings() {
    let north = GeoPoint::new(41.01, -74.00);
    let request = SchedulingRequest::for_day(
        vec![
            Job::new("A0", depot()).with_duration_ms(4 * HOUR_MS),
            Job::new("A1", GeoPoint::new(40.72, -74.00)),
            Job::new("B1", GeoPoint::new(41.02, -74.00)),
        ],
        vec![
            technician("L"),
            Technician::new("X", north).with_calendar(Calendar::weekdays(8, 17)),
        ],
        monday(),
    )
    .with_existing_assignments(vec![Assignment::new(
        "A0",
        "L",
        monday(),
        TimeWindow::hours(8, 12),
    )
    .with_assistant("X")
    .committed()]);
    let orchestrator = SchedulingOrchestrator::default();
    let buffer = EngineConfig::default().detection.buffer_ms;

    let partitioned = orchestrator.run_partitioned(&request, 5_000.0).unwrap();
    assert!(partitioned.unassigned_jobs.is_empty());
    let plan: Vec<&Assignment> = request
        .existing_assignments
        .iter()
        .chain(partitioned.assignments.iter())
        .collect();
    for (i, a) in plan.iter().enumerate() {
        for b in &plan[i + 1..] {
            if a.date == b.date && a.technician_ids().any(|t| b.involves(t)) {
                assert!(
                    !a.window.overlaps_with_buffer(&b.window, buffer),
                    "{} overlaps {}",
                    a.id,
                    b.id
                );
            }
        }
    }
    assert!(of_type(&partitioned.conflicts, ConflictType::TimeOverlap).is_empty());

    let sequential = orchestrator.run_auto_assignment(&request).unwrap();
    assert!(of_type(&sequential.conflicts, ConflictType::TimeOverlap).is_empty());
    assert_eq!(partitioned.assignments.len(), sequential.assignments.len());
}

#[test]
fn test_rejects_malformed_request() {
    let mut request = SchedulingRequest::for_day(
        vec![Job::new("J1", depot())],
        vec![technician("T1")],
        monday(),
    );
    request.jobs[0].duration_ms = 0;
    request.technicians.push(technician("T1"));

    match SchedulingOrchestrator::default().run_auto_assignment(&request) {
        Err(EngineError::InvalidInput(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected invalid input, got {other:?}"),
    }
}

#[test]
fn test_rejects_technician_sharing_a_job_id() {
    let request = SchedulingRequest::for_day(
        vec![Job::new("42", GeoPoint::new(45.0, -74.0))],
        vec![Technician::new("42", GeoPoint::new(40.5, -74.0)).with_travel_radius_m(80_000.0)],
        monday(),
    );

    match SchedulingOrchestrator::default().run_auto_assignment(&request) {
        Err(EngineError::InvalidInput(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].message.contains("collides"));
        }
        other => panic!("expected invalid input, got {other:?}"),
    }
}

#[test]
fn test_result_wire_shape() {
    let request = SchedulingRequest::for_day(
        vec![Job::new("J1", depot()), Job::new("J2", depot())],
        vec![technician("T1")],
        monday(),
    )
    .with_existing_assignments(vec![
        Assignment::new("J1", "T1", monday(), TimeWindow::hours(9, 11)).committed(),
        Assignment::new("J2", "T1", monday(), TimeWindow::hours(10, 12)).committed(),
    ]);
    let result = SchedulingOrchestrator::default()
        .run_auto_assignment(&request)
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["assignments"].as_array().unwrap().is_empty());
    let conflict = json["conflicts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["conflict_type"] == "time_overlap")
        .unwrap();
    assert_eq!(conflict["severity"], "high");
    assert_eq!(conflict["date"], "2024-06-03");
    assert!(json["metrics"].is_object());

    let back: u_crew::models::SchedulingResult = serde_json::from_value(json).unwrap();
    assert_eq!(back.conflicts.len(), result.conflicts.len());
    assert_eq!(back.conflicts[0].id, result.conflicts[0].id);
}
