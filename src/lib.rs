//! SnapCrew join core
//!
//! This crate implements the join core for SnapCrew, a marketplace that
//! connects Requesters (who need photo/video coverage of an event) with
//! Helpers (who capture and upload it): the job lifecycle state machine
//! and the single-use QR join-token manager that binds exactly one
//! Helper to a job under concurrent access.

pub mod config;
pub mod job;
pub mod join;
pub mod state;
pub mod store;
pub mod token;

pub use config::{ConfigError, JoinConfig};
pub use job::{generate_job_id, Assignment, Job};
pub use join::{JoinError, JoinManager};
pub use state::{validate_transition, JobStatus, TransitionError};
pub use store::{ConsumeOutcome, JoinStore, MemoryStore, StoreError};
pub use token::{CheckReason, IssuedToken, TokenCheck, TokenIdentifier, TokenRecord};
