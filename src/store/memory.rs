//! In-memory join store
//!
//! Single-process store backing both the test suite and the ops CLI.
//! Everything lives behind one `RwLock`; `consume_token` holds the
//! write lock across the whole re-validate-then-write sequence, which
//! serializes racing consumers and makes the loser re-observe the
//! winner's assignment.
//!
//! The whole store snapshots to JSON so the CLI can persist it between
//! invocations (write-then-rename, see `snapshot_to_file`).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{Assignment, Job};
use crate::state::validate_transition;
use crate::token::{evaluate_token, TokenIdentifier, TokenRecord};

use super::{ConsumeOutcome, JoinStore, StoreError};

/// Thread-safe in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Inner {
    /// Jobs by job_id
    jobs: HashMap<String, Job>,
    /// Assignments keyed by job_id; the key uniqueness IS the 1:1 constraint
    assignments: HashMap<String, Assignment>,
    /// Tokens by full token string
    tokens: HashMap<String, TokenRecord>,
    /// Short code -> token string index; never reused, even after expiry
    short_codes: HashMap<String, String>,
}

impl Inner {
    fn resolve(&self, identifier: &TokenIdentifier) -> Option<&TokenRecord> {
        match identifier {
            TokenIdentifier::Token(token) => self.tokens.get(token),
            TokenIdentifier::ShortCode(code) => {
                let token = self.short_codes.get(code)?;
                self.tokens.get(token)
            }
        }
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the full store contents to pretty JSON
    pub fn snapshot_json(&self) -> Result<String, StoreError> {
        let inner = self.read()?;
        serde_json::to_string_pretty(&*inner).map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Rebuild a store from a JSON snapshot
    pub fn from_snapshot_json(json: &str) -> Result<Self, StoreError> {
        let inner: Inner =
            serde_json::from_str(json).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
        })
    }

    /// Write the snapshot to a file, via temp-file-then-rename
    pub fn snapshot_to_file(&self, path: &Path) -> Result<(), StoreError> {
        let json = self.snapshot_json()?;
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &json).map_err(|e| StoreError::Backend(e.to_string()))?;
        std::fs::rename(&temp_path, path).map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Load a snapshot from a file; a missing file yields an empty store
    pub fn from_snapshot_file(path: &Path) -> Result<Self, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_snapshot_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

impl JoinStore for MemoryStore {
    fn insert_job(&self, job: Job) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.jobs.contains_key(&job.job_id) {
            return Err(StoreError::DuplicateJob(job.job_id));
        }
        inner.jobs.insert(job.job_id.clone(), job);
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.read()?.jobs.get(job_id).cloned())
    }

    fn assignment_for_job(&self, job_id: &str) -> Result<Option<Assignment>, StoreError> {
        Ok(self.read()?.assignments.get(job_id).cloned())
    }

    fn update_job_status(
        &self,
        job_id: &str,
        target: crate::state::JobStatus,
    ) -> Result<Job, StoreError> {
        let mut inner = self.write()?;
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::UnknownJob(job_id.to_string()))?;
        job.transition(target)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(job.clone())
    }

    fn insert_token(&self, record: TokenRecord) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if !inner.jobs.contains_key(&record.job_id) {
            return Err(StoreError::UnknownJob(record.job_id));
        }
        // Short codes are unique across ALL tokens, used and expired
        // included; the index is never pruned on consumption.
        if inner.short_codes.contains_key(&record.short_code) {
            return Err(StoreError::ShortCodeTaken(record.short_code));
        }
        if inner.tokens.contains_key(&record.token) {
            return Err(StoreError::TokenTaken);
        }
        inner
            .short_codes
            .insert(record.short_code.clone(), record.token.clone());
        inner.tokens.insert(record.token.clone(), record);
        Ok(())
    }

    fn find_token(&self, identifier: &TokenIdentifier) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.read()?.resolve(identifier).cloned())
    }

    fn consume_token(
        &self,
        token: &str,
        helper_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        // One write lock across re-validate + all three writes. Racing
        // consumers serialize here; the loser re-evaluates against the
        // winner's committed state.
        let mut inner = self.write()?;

        let record = match inner.tokens.get(token) {
            Some(record) => record.clone(),
            None => return Ok(ConsumeOutcome::Rejected(crate::token::CheckReason::NotFound)),
        };

        let job = inner.jobs.get(&record.job_id).cloned();
        let has_assignment = inner.assignments.contains_key(&record.job_id);
        if let Err(reason) = evaluate_token(&record, job.as_ref(), has_assignment, now) {
            return Ok(ConsumeOutcome::Rejected(reason));
        }

        // Validity implies the job exists and is joinable.
        let job = job.ok_or_else(|| StoreError::UnknownJob(record.job_id.clone()))?;
        validate_transition(job.status, crate::state::JobStatus::Accepted)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let assignment = Assignment {
            job_id: record.job_id.clone(),
            helper_id: helper_id.to_string(),
            created_at: now,
        };

        let stored = inner
            .tokens
            .get_mut(token)
            .ok_or_else(|| StoreError::Backend("token vanished mid-consume".to_string()))?;
        stored.used = true;
        stored.used_by = Some(helper_id.to_string());
        stored.used_at = Some(now);

        inner
            .assignments
            .insert(assignment.job_id.clone(), assignment.clone());

        let job_entry = inner
            .jobs
            .get_mut(&assignment.job_id)
            .ok_or_else(|| StoreError::UnknownJob(assignment.job_id.clone()))?;
        job_entry.status = crate::state::JobStatus::Accepted;
        job_entry.updated_at = now;

        Ok(ConsumeOutcome::Consumed(assignment))
    }

    fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = self.write()?;
        let expired: Vec<String> = inner
            .tokens
            .values()
            .filter(|t| t.is_expired(now))
            .map(|t| t.token.clone())
            .collect();
        for token in &expired {
            if let Some(record) = inner.tokens.remove(token) {
                inner.short_codes.remove(&record.short_code);
            }
        }
        Ok(expired.len())
    }
}
