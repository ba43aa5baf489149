//! Field-crew scheduling domain models.
//!
//! Plain data types exchanged with the persistence and UI collaborators.
//! The engine reads jobs and technicians, proposes assignments, and
//! reports conflicts and resolutions; it never mutates the inputs.
//!
//! # Domain Mappings
//!
//! | u-crew | Installer business | Home healthcare | Utilities |
//! |--------|-------------------|-----------------|-----------|
//! | Job | Installation | Visit | Work order |
//! | Technician | Installer | Nurse | Field engineer |
//! | Assignment | Booking | Appointment | Dispatch |
//! | Conflict | Double booking | Missed visit | SLA breach risk |

mod assignment;
mod calendar;
mod conflict;
mod job;
mod request;
mod resolution;
mod result;
mod technician;

pub use assignment::{
    Assignment, AssignmentStatus, AssignmentWarning, SplitPart, SupersedeInstruction,
};
pub use calendar::{Calendar, TimeWindow, WeeklyWindow, DAY_MS, HOUR_MS, MINUTE_MS};
pub use conflict::{Conflict, ConflictType, Severity};
pub use job::{GeoPoint, Job, Priority};
pub use request::{
    AssignmentConstraints, AutoAssignmentCriteria, JobOrdering, OptimizationGoal,
    ScoringWeights, SchedulingRequest,
};
pub use resolution::{ImpactEstimate, Resolution, ResolutionMethod, ResolutionStep};
pub use result::{
    BulkAssignmentResult, CommitInstruction, DailySchedule, OptimizationMetrics,
    SchedulingResult, TechnicianDay, UnassignedJob, UnassignedReason,
};
pub use technician::{DailyCapacity, Skill, Technician, TechnicianRole};
