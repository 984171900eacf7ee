//! Storage port for the join core
//!
//! The manager never touches persistence directly; it talks to a
//! `JoinStore`. The contract that matters is that `consume_token` is
//! atomic: re-validate, mark used, insert the assignment, and advance
//! the job status as one unit, with a lost race surfacing as a
//! rejection rather than a second assignment.

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::job::{Assignment, Job};
use crate::token::{CheckReason, TokenIdentifier, TokenRecord};

/// Errors from the storage layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Token references a job the store does not know
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// Short code already belongs to another token (live or historical)
    #[error("short code {0} already taken")]
    ShortCodeTaken(String),

    /// Token string already present; nonce collision, practically unreachable
    #[error("token string already taken")]
    TokenTaken,

    /// Job id already present
    #[error("job {0} already exists")]
    DuplicateJob(String),

    /// Backend failure (I/O, serialization, connection)
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Outcome of the store's atomic consume operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The caller won: token marked used, assignment created, job ACCEPTED
    Consumed(Assignment),
    /// Validity re-check failed inside the critical section
    Rejected(CheckReason),
}

/// Persistence port for jobs, assignments, and join tokens
pub trait JoinStore: Send + Sync {
    /// Insert a new job record
    fn insert_job(&self, job: Job) -> Result<(), StoreError>;

    /// Fetch a job by id
    fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    /// Fetch the assignment for a job, if one exists
    fn assignment_for_job(&self, job_id: &str) -> Result<Option<Assignment>, StoreError>;

    /// Transition a job's status (non-join lifecycle steps: uploads,
    /// review, approval, cancellation)
    fn update_job_status(
        &self,
        job_id: &str,
        target: crate::state::JobStatus,
    ) -> Result<Job, StoreError>;

    /// Insert a freshly minted token. Fails with `ShortCodeTaken` or
    /// `TokenTaken` if either unique column is already present; the
    /// caller owns the retry.
    fn insert_token(&self, record: TokenRecord) -> Result<(), StoreError>;

    /// Resolve an identifier to its token record, without side effects
    fn find_token(&self, identifier: &TokenIdentifier) -> Result<Option<TokenRecord>, StoreError>;

    /// Atomically consume a token: re-evaluate validity as of `now`,
    /// then mark it used by `helper_id`, create the assignment, and
    /// advance the job to ACCEPTED. Exactly one concurrent caller per
    /// job can ever receive `Consumed`.
    fn consume_token(
        &self,
        token: &str,
        helper_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Delete tokens past their expiry; returns how many were removed.
    /// Best-effort housekeeping only.
    fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}
