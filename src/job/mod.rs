//! Job and Assignment records
//!
//! A Job is one unit of requested capture work; an Assignment binds
//! exactly one Helper to it. Assignment uniqueness per job is the
//! store's constraint; records here are plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{validate_transition, JobStatus, TransitionError};

/// A unit of content-capture work posted by a Requester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier (ULID)
    pub job_id: String,

    /// Requester who posted the job
    pub requester_id: String,

    /// Current lifecycle status
    pub status: JobStatus,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// When the status was last updated
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in OPEN status
    pub fn new(job_id: String, requester_id: String) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            requester_id,
            status: JobStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new status, enforcing the lifecycle table
    pub fn transition(&mut self, target: JobStatus) -> Result<(), TransitionError> {
        validate_transition(self.status, target)?;
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// The 1:1 binding of a Helper to a Job
///
/// Created exactly once, at token consumption time; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// The job this assignment belongs to (unique across assignments)
    pub job_id: String,

    /// The Helper bound to the job
    pub helper_id: String,

    /// When the Helper joined
    pub created_at: DateTime<Utc>,
}

/// Generate a new job identifier
pub fn generate_job_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_open() {
        let job = Job::new(generate_job_id(), "req-1".to_string());
        assert_eq!(job.status, JobStatus::Open);
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_transition_updates_status_and_timestamp() {
        let mut job = Job::new("job-1".to_string(), "req-1".to_string());
        job.transition(JobStatus::Accepted).unwrap();
        assert_eq!(job.status, JobStatus::Accepted);
        assert!(job.updated_at >= job.created_at);
    }

    #[test]
    fn test_illegal_transition_leaves_job_untouched() {
        let mut job = Job::new("job-1".to_string(), "req-1".to_string());
        let before = job.updated_at;
        assert!(job.transition(JobStatus::Completed).is_err());
        assert_eq!(job.status, JobStatus::Open);
        assert_eq!(job.updated_at, before);
    }

    #[test]
    fn test_job_ids_unique_and_lowercase() {
        let a = generate_job_id();
        let b = generate_job_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_job_serialization_round_trip() {
        let job = Job::new("job-1".to_string(), "req-1".to_string());
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"status\":\"OPEN\""));
        let parsed: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.job_id, job.job_id);
        assert_eq!(parsed.status, job.status);
    }
}
