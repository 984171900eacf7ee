//! Join token minting and validity evaluation
//!
//! A token has two parts joined by `.`: a 128-bit random nonce (hex) and
//! a SHA-256 authentication code over (job id, nonce, server secret).
//! The nonce makes the token unguessable; the authentication code lets
//! the server recognize its own mint for a specific job without a store
//! round trip. Validation still consults the store for `used` and
//! `expires_at`.
//!
//! A 6-digit short code accompanies every token as a manual-entry
//! fallback; it carries no authentication code and is only as strong as
//! its lookup.

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::job::Job;

/// Nonce length in bytes (128 bits of entropy)
pub const NONCE_LEN: usize = 16;

/// Delimiter between nonce and authentication code
pub const TOKEN_DELIMITER: char = '.';

/// Short codes are sampled uniformly from this inclusive range
pub const SHORT_CODE_MIN: u32 = 100_000;
pub const SHORT_CODE_MAX: u32 = 999_999;

/// Persisted join token record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Owning job
    pub job_id: String,

    /// Full token string: "<nonce_hex>.<auth_code_hex>"
    pub token: String,

    /// 6-digit numeric short code
    pub short_code: String,

    /// Hard expiry; checked live at every validation
    pub expires_at: DateTime<Utc>,

    /// Set exactly once, at consumption
    pub used: bool,

    /// Helper who consumed the token
    pub used_by: Option<String>,

    /// When the token was consumed
    pub used_at: Option<DateTime<Utc>>,

    /// When the token was minted
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Check if the token has expired as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// What `issue_token` hands back to the caller, for QR rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub job_id: String,
    pub token: String,
    pub short_code: String,
    pub expires_at: DateTime<Utc>,
}

/// How a presented identifier should be looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenIdentifier {
    /// Full two-part token string
    Token(String),
    /// 6-digit short code
    ShortCode(String),
}

impl TokenIdentifier {
    /// Classify a raw identifier. Exactly six ASCII digits is a short
    /// code; anything else is treated as a full token string. Full
    /// tokens always contain a delimiter, so the shapes cannot collide.
    pub fn classify(raw: &str) -> Self {
        if raw.len() == 6 && raw.bytes().all(|b| b.is_ascii_digit()) {
            TokenIdentifier::ShortCode(raw.to_string())
        } else {
            TokenIdentifier::Token(raw.to_string())
        }
    }
}

/// Why a token failed validation, in check priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckReason {
    /// Identifier resolved to no token, or authentication code mismatch
    NotFound,
    /// Past expires_at
    Expired,
    /// Already consumed
    AlreadyUsed,
    /// Owning job already has a Helper
    JobTaken,
    /// Owning job is not in a joinable status
    JobUnavailable,
}

impl CheckReason {
    /// User-facing reason string
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckReason::NotFound => "Invalid token",
            CheckReason::Expired => "Token expired",
            CheckReason::AlreadyUsed => "Token already used",
            CheckReason::JobTaken => "Job already has a Helper",
            CheckReason::JobUnavailable => "Job is not available",
        }
    }
}

impl std::fmt::Display for CheckReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a non-consuming token check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCheck {
    Valid { job_id: String },
    Invalid { reason: CheckReason },
}

/// Compute the hex authentication code for (job id, nonce, secret).
///
/// Inputs are length-prefixed into the hash so no two field splits can
/// collide on the same byte stream.
pub fn auth_code(job_id: &str, nonce_hex: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [job_id, nonce_hex, secret] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Mint a fresh token string for a job: random nonce plus its
/// authentication code.
pub fn mint_token(job_id: &str, secret: &str) -> String {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let nonce_hex = hex::encode(nonce);
    let code = auth_code(job_id, &nonce_hex, secret);
    format!("{nonce_hex}{TOKEN_DELIMITER}{code}")
}

/// Sample a short code uniformly from [100000, 999999]
pub fn sample_short_code() -> String {
    OsRng.gen_range(SHORT_CODE_MIN..=SHORT_CODE_MAX).to_string()
}

/// Compute the expiry for a token issued at `issued_at`
pub fn expiry_for(issued_at: DateTime<Utc>, ttl_minutes: i64) -> DateTime<Utc> {
    issued_at + Duration::minutes(ttl_minutes)
}

/// Verify a full token string was minted by this server for `job_id`.
///
/// Splits on the delimiter and recomputes the authentication code.
/// Short codes carry no code and cannot be verified this way.
pub fn verify_auth_code(token: &str, job_id: &str, secret: &str) -> bool {
    let Some((nonce_hex, presented)) = token.split_once(TOKEN_DELIMITER) else {
        return false;
    };
    auth_code(job_id, nonce_hex, secret) == presented
}

/// Evaluate token validity against its owning job, in the documented
/// priority order. Pure; shared by the read-only check path and the
/// store's atomic consume path.
pub fn evaluate_token(
    record: &TokenRecord,
    job: Option<&Job>,
    has_assignment: bool,
    now: DateTime<Utc>,
) -> Result<(), CheckReason> {
    if record.is_expired(now) {
        return Err(CheckReason::Expired);
    }
    if record.used {
        return Err(CheckReason::AlreadyUsed);
    }
    if has_assignment {
        return Err(CheckReason::JobTaken);
    }
    match job {
        Some(job) if job.status.is_joinable() => Ok(()),
        _ => Err(CheckReason::JobUnavailable),
    }
}
