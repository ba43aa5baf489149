//! Input validation for scheduling requests.
//!
//! Checks structural integrity of jobs, technicians and existing
//! assignments before a pass. Detects:
//! - Duplicate or empty IDs, and technician IDs that reuse a job ID
//! - Non-positive durations and out-of-range coordinates
//! - Negative capacities
//! - Assignments referencing unknown jobs or technicians
//!
//! Every problem is collected; the orchestrator rejects the whole call
//! when any is found.

use std::collections::HashSet;
use thiserror::Error;

use crate::models::SchedulingRequest;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A required field is empty.
    MissingField,
    /// A value is out of range.
    InvalidValue,
    /// A reference points to an entity that doesn't exist.
    UnknownReference,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a scheduling request.
///
/// Checks:
/// 1. No empty or duplicate job IDs
/// 2. Every job has a positive duration and a valid location
/// 3. No empty or duplicate technician IDs, and none equal to a job ID
/// 4. Every technician has a valid home base and non-negative capacity
/// 5. No empty or duplicate existing assignment IDs
/// 6. Existing assignments reference known jobs and technicians
/// 7. Existing assignment windows are non-empty
/// 8. `current_assignment` on a job references an existing assignment
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_request(request: &SchedulingRequest) -> ValidationResult {
    let mut errors = Vec::new();

    let mut job_ids = HashSet::new();
    for job in &request.jobs {
        if job.id.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                "Job with empty ID",
            ));
        } else if !job_ids.insert(job.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate job ID: {}", job.id),
            ));
        }
        if job.duration_ms <= 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidValue,
                format!("Job '{}' has non-positive duration", job.id),
            ));
        }
        if job.splittable && job.min_split_ms < 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidValue,
                format!("Job '{}' has negative minimum split", job.id),
            ));
        }
        if !job.location.is_valid() {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidValue,
                format!("Job '{}' has invalid coordinates", job.id),
            ));
        }
    }

    let mut technician_ids = HashSet::new();
    for tech in &request.technicians {
        if tech.id.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                "Technician with empty ID",
            ));
        } else if !technician_ids.insert(tech.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate technician ID: {}", tech.id),
            ));
        }
        // Home bases and job sites share the distance matrix key space.
        if job_ids.contains(tech.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Technician ID '{}' collides with a job ID", tech.id),
            ));
        }
        if !tech.home_base.is_valid() {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidValue,
                format!("Technician '{}' has invalid home base", tech.id),
            ));
        }
        if !(tech.capacity.max_hours >= 0.0) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidValue,
                format!("Technician '{}' has negative capacity", tech.id),
            ));
        }
    }

    let mut assignment_ids = HashSet::new();
    for a in &request.existing_assignments {
        if a.id.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                format!("Assignment for job '{}' has empty ID", a.job_id),
            ));
        } else if !assignment_ids.insert(a.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate assignment ID: {}", a.id),
            ));
        }
        if !job_ids.contains(a.job_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownReference,
                format!("Assignment '{}' references unknown job '{}'", a.id, a.job_id),
            ));
        }
        for tech in a.technician_ids() {
            if !technician_ids.contains(tech) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownReference,
                    format!("Assignment '{}' references unknown technician '{tech}'", a.id),
                ));
            }
        }
        if a.window.end_ms <= a.window.start_ms {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidValue,
                format!("Assignment '{}' has an empty time window", a.id),
            ));
        }
    }

    for job in &request.jobs {
        if let Some(current) = &job.current_assignment {
            if !assignment_ids.contains(current.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownReference,
                    format!("Job '{}' references unknown assignment '{current}'", job.id),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Assignment, GeoPoint, Job, Technician, TimeWindow};
    use chrono::NaiveDate;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn sample_request() -> SchedulingRequest {
        let p = GeoPoint::new(40.0, -74.0);
        SchedulingRequest::for_day(
            vec![Job::new("J1", p), Job::new("J2", p)],
            vec![Technician::new("T1", p), Technician::new("T2", p)],
            monday(),
        )
    }

    #[test]
    fn test_valid_request() {
        let req = sample_request().with_existing_assignments(vec![Assignment::new(
            "J1",
            "T1",
            monday(),
            TimeWindow::hours(8, 9),
        )]);
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_duplicate_job_id() {
        let mut req = sample_request();
        req.jobs.push(Job::new("J1", GeoPoint::new(0.0, 0.0)));

        let errors = validate_request(&req).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId && e.message.contains("job")));
    }

    #[test]
    fn test_duplicate_technician_id() {
        let mut req = sample_request();
        req.technicians.push(Technician::new("T2", GeoPoint::new(0.0, 0.0)));

        let errors = validate_request(&req).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId && e.message.contains("technician")));
    }

    #[test]
    fn test_technician_id_reusing_job_id() {
        let p = GeoPoint::new(40.0, -74.0);
        let req = SchedulingRequest::for_day(
            vec![Job::new("42", GeoPoint::new(45.0, -74.0))],
            vec![Technician::new("42", p), Technician::new("T1", p)],
            monday(),
        );

        let errors = validate_request(&req).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::DuplicateId);
        assert!(errors[0].message.contains("'42'"));
    }

    #[test]
    fn test_empty_id() {
        let mut req = sample_request();
        req.jobs.push(Job::new("", GeoPoint::new(0.0, 0.0)));

        let errors = validate_request(&req).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::MissingField));
    }

    #[test]
    fn test_invalid_values() {
        let mut req = sample_request();
        req.jobs[0].duration_ms = 0;
        req.jobs[1].location = GeoPoint::new(120.0, 0.0);
        req.technicians[0].capacity.max_hours = -1.0;

        let errors = validate_request(&req).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| e.kind == ValidationErrorKind::InvalidValue)
                .count(),
            3
        );
    }

    #[test]
    fn test_unknown_references() {
        let mut req = sample_request().with_existing_assignments(vec![Assignment::new(
            "J9",
            "T9",
            monday(),
            TimeWindow::hours(8, 9),
        )]);
        req.jobs[0].current_assignment = Some("missing".into());

        let errors = validate_request(&req).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| e.kind == ValidationErrorKind::UnknownReference)
                .count(),
            3
        );
    }

    #[test]
    fn test_empty_window() {
        let req = sample_request().with_existing_assignments(vec![Assignment::new(
            "J1",
            "T1",
            monday(),
            TimeWindow::new(9 * 3_600_000, 9 * 3_600_000),
        )]);

        let errors = validate_request(&req).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidValue));
    }

    #[test]
    fn test_multiple_errors_display() {
        let mut req = sample_request();
        req.jobs.push(Job::new("J1", GeoPoint::new(0.0, 0.0)));
        req.jobs[0].duration_ms = -5;

        let errors = validate_request(&req).unwrap_err();
        assert!(errors.len() >= 2);
        assert_eq!(errors[0].to_string(), errors[0].message);
    }
}
