//! Join token manager
//!
//! Orchestrates token issuance, pre-flight checks, and one-shot
//! consumption over the `JoinStore` port. Expected failures come back
//! as data (`TokenCheck::Invalid`, `Ok(None)`); only storage faults and
//! misconfiguration surface as `JoinError`.

use std::sync::Arc;

use chrono::Utc;

use crate::config::JoinConfig;
use crate::job::Assignment;
use crate::store::{ConsumeOutcome, JoinStore, StoreError};
use crate::token::{
    expiry_for, mint_token, sample_short_code, verify_auth_code, CheckReason, IssuedToken,
    TokenCheck, TokenIdentifier, TokenRecord,
};

/// Fatal errors from the join manager
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Ran out of short-code retry budget; the 900k space is congested
    /// or the RNG is misbehaving
    #[error("could not allocate a unique short code after {attempts} attempts")]
    ShortCodeSpaceExhausted { attempts: u32 },
}

/// Issues, checks, and consumes join tokens for one deployment
pub struct JoinManager {
    store: Arc<dyn JoinStore>,
    config: JoinConfig,
}

impl JoinManager {
    /// Create a manager over a store with explicit configuration
    pub fn new(store: Arc<dyn JoinStore>, config: JoinConfig) -> Self {
        Self { store, config }
    }

    /// Mint and persist a join token for a job.
    ///
    /// The OPEN precondition belongs to the caller; this only fails on
    /// unknown jobs or storage faults. Each call produces a distinct
    /// token and short code, each with its own expiry window.
    pub fn issue_token(&self, job_id: &str) -> Result<IssuedToken, JoinError> {
        let now = Utc::now();
        let token = mint_token(job_id, &self.config.secret);
        let expires_at = expiry_for(now, self.config.token_ttl_minutes);

        // The short-code space is 900,000 values and codes are never
        // reused, so collisions are rare but real. Resample on conflict.
        for _ in 0..self.config.short_code_attempts {
            let short_code = sample_short_code();
            let record = TokenRecord {
                job_id: job_id.to_string(),
                token: token.clone(),
                short_code: short_code.clone(),
                expires_at,
                used: false,
                used_by: None,
                used_at: None,
                created_at: now,
            };
            match self.store.insert_token(record) {
                Ok(()) => {
                    return Ok(IssuedToken {
                        job_id: job_id.to_string(),
                        token,
                        short_code,
                        expires_at,
                    })
                }
                Err(StoreError::ShortCodeTaken(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(JoinError::ShortCodeSpaceExhausted {
            attempts: self.config.short_code_attempts,
        })
    }

    /// Pre-flight a token or short code without consuming it.
    ///
    /// Never mutates `used`; a client may call this any number of times
    /// and the token stays redeemable. The answer is advisory only:
    /// consumption re-validates from scratch.
    pub fn check_token(&self, identifier: &str) -> Result<TokenCheck, JoinError> {
        let identifier = TokenIdentifier::classify(identifier);
        let Some(record) = self.store.find_token(&identifier)? else {
            return Ok(TokenCheck::Invalid {
                reason: CheckReason::NotFound,
            });
        };

        // Full tokens carry an authentication code; a record whose code
        // does not verify was not minted by this server for that job.
        if let TokenIdentifier::Token(raw) = &identifier {
            if !verify_auth_code(raw, &record.job_id, &self.config.secret) {
                return Ok(TokenCheck::Invalid {
                    reason: CheckReason::NotFound,
                });
            }
        }

        let job = self.store.get_job(&record.job_id)?;
        let has_assignment = self.store.assignment_for_job(&record.job_id)?.is_some();
        match crate::token::evaluate_token(&record, job.as_ref(), has_assignment, Utc::now()) {
            Ok(()) => Ok(TokenCheck::Valid {
                job_id: record.job_id,
            }),
            Err(reason) => Ok(TokenCheck::Invalid { reason }),
        }
    }

    /// Redeem a token into an Assignment for `helper_id`.
    ///
    /// Returns `Ok(None)` for every expected rejection: unknown or
    /// tampered identifier, expiry, reuse, lost race, job no longer
    /// joinable. The store's consume operation is the atomic unit;
    /// nothing here trusts an earlier `check_token` answer.
    pub fn consume_token(
        &self,
        identifier: &str,
        helper_id: &str,
    ) -> Result<Option<Assignment>, JoinError> {
        let identifier = TokenIdentifier::classify(identifier);
        let Some(record) = self.store.find_token(&identifier)? else {
            return Ok(None);
        };
        if let TokenIdentifier::Token(raw) = &identifier {
            if !verify_auth_code(raw, &record.job_id, &self.config.secret) {
                return Ok(None);
            }
        }

        match self.store.consume_token(&record.token, helper_id, Utc::now())? {
            ConsumeOutcome::Consumed(assignment) => Ok(Some(assignment)),
            ConsumeOutcome::Rejected(_) => Ok(None),
        }
    }

    /// Delete tokens past their expiry. Best-effort; validity never
    /// depends on this running.
    pub fn purge_expired(&self) -> Result<usize, JoinError> {
        Ok(self.store.purge_expired_tokens(Utc::now())?)
    }
}
