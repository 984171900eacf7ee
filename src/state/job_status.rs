//! Job status enumeration and transition validation
//!
//! The progression is strictly linear; cancellation is the single
//! exception and is allowed from any non-terminal status. There are no
//! backward transitions and no self-transitions.

use serde::{Deserialize, Serialize};

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job is posted and waiting for a Helper to join
    Open,
    /// A Helper has joined via token consumption
    Accepted,
    /// The Helper is capturing content
    InProgress,
    /// Content uploaded, awaiting Requester review
    InReview,
    /// Requester approved the delivery
    Completed,
    /// Job was cancelled
    Cancelled,
}

impl JobStatus {
    /// All statuses, in lifecycle order. Used for exhaustive checks.
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Open,
        JobStatus::Accepted,
        JobStatus::InProgress,
        JobStatus::InReview,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ];

    /// Check if transition from this status to target is valid
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        match (self, target) {
            (JobStatus::Open, JobStatus::Accepted) => true,
            (JobStatus::Open, JobStatus::Cancelled) => true,

            (JobStatus::Accepted, JobStatus::InProgress) => true,
            (JobStatus::Accepted, JobStatus::Cancelled) => true,

            (JobStatus::InProgress, JobStatus::InReview) => true,
            (JobStatus::InProgress, JobStatus::Cancelled) => true,

            (JobStatus::InReview, JobStatus::Completed) => true,
            (JobStatus::InReview, JobStatus::Cancelled) => true,

            // Terminal statuses cannot transition; everything else
            // (self-transitions, skips, backward moves) is rejected.
            _ => false,
        }
    }

    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    /// Returns true if a Helper may still join (token consumption target)
    pub fn is_joinable(&self) -> bool {
        matches!(self, JobStatus::Open)
    }

    /// Returns the wire string for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "OPEN",
            JobStatus::Accepted => "ACCEPTED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::InReview => "IN_REVIEW",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(JobStatus::Open),
            "ACCEPTED" => Ok(JobStatus::Accepted),
            "IN_PROGRESS" => Ok(JobStatus::InProgress),
            "IN_REVIEW" => Ok(JobStatus::InReview),
            "COMPLETED" => Ok(JobStatus::Completed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            _ => Err(TransitionError::UnknownStatus(s.to_string())),
        }
    }
}

/// Errors for status transition validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("job is in terminal status {0}")]
    TerminalStatus(JobStatus),

    #[error("unknown job status: {0}")]
    UnknownStatus(String),
}

/// Validate a requested status transition.
///
/// Returns `Ok(())` exactly for the pairs in the transition table;
/// everything else gets a descriptive error. `from == to` is rejected
/// for every status, terminal ones included.
pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::TerminalStatus(from));
    }
    if !from.can_transition_to(to) {
        return Err(TransitionError::InvalidTransition { from, to });
    }
    Ok(())
}
