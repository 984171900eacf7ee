//! Job lifecycle state machine
//!
//! Job statuses: OPEN → ACCEPTED → IN_PROGRESS → IN_REVIEW → COMPLETED,
//! with CANCELLED reachable from every non-terminal status.

mod job_status;

pub use job_status::{validate_transition, JobStatus, TransitionError};
