//! Field-crew scheduling engine.
//!
//! Assigns field jobs to technicians across a planning horizon, detects
//! conflicts in the resulting plan, and proposes ranked resolutions. The
//! engine is a pure function of its inputs: callers hand in jobs,
//! technicians and existing assignments, and get back proposals plus
//! supersede instructions to persist as they see fit.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Job`, `Technician`, `Assignment`,
//!   `Calendar`, `Conflict`, `Resolution`, request and result shapes
//! - **`geo`**: Distance matrix lookups, haversine fallback, clustering
//! - **`scoring`**: Weighted, explainable candidate scores
//! - **`dispatching`**: Job ordering rules for the greedy pass
//! - **`scheduler`**: Greedy auto-assignment, capacity tracking, metrics
//! - **`detection`**: Conflict rules and impact ranking
//! - **`resolution`**: Candidate fixes, verification, escalation
//! - **`orchestrator`**: Public entry points
//! - **`validation`**: Input integrity checks (duplicate IDs, references)
//!
//! # Usage
//!
//! ```
//! use chrono::NaiveDate;
//! use u_crew::models::{Calendar, GeoPoint, Job, SchedulingRequest, Technician};
//! use u_crew::SchedulingOrchestrator;
//!
//! let monday = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
//! let depot = GeoPoint::new(40.71, -74.00);
//! let request = SchedulingRequest::for_day(
//!     vec![Job::new("J1", GeoPoint::new(40.73, -73.99)).with_skill("fiber")],
//!     vec![Technician::new("T1", depot)
//!         .with_skill("fiber")
//!         .with_calendar(Calendar::weekdays(8, 17))],
//!     monday,
//! );
//!
//! let result = SchedulingOrchestrator::default()
//!     .run_auto_assignment(&request)
//!     .unwrap();
//! assert_eq!(result.assignment_for_job("J1").unwrap().lead_id, "T1");
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Solomon (1987), "Algorithms for the Vehicle Routing and Scheduling
//!   Problems with Time Window Constraints"
//! - Croes (1958), "A Method for Solving Traveling-Salesman Problems"

pub mod config;
pub mod detection;
pub mod dispatching;
pub mod error;
pub mod geo;
pub mod models;
pub mod orchestrator;
pub mod resolution;
pub mod scheduler;
pub mod scoring;
pub mod snapshot;
pub mod validation;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use orchestrator::SchedulingOrchestrator;
