use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::common::crypto::CryptoError;

/// Signup flow errors.
///
/// Everything except `Crypto`, `Database` and `Internal` is recoverable by
/// the user; the HTTP layer maps each variant to a status code and a generic
/// message (internal detail never reaches the response body).
#[derive(Error, Debug)]
pub enum SignupError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("captcha verification failed")]
    CaptchaFailed,

    #[error("an active signup already exists for this email, document or phone")]
    DuplicateSignup,

    #[error("rate limited until {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("signup intent not found")]
    NotFound,

    #[error("operation not allowed in status {status}")]
    InvalidStatus { status: String },

    #[error("verification code expired")]
    OtpExpired,

    #[error("verification code invalid")]
    OtpInvalid { attempts_remaining: i32 },

    #[error("verification temporarily locked until {locked_until}")]
    OtpLocked { locked_until: DateTime<Utc> },

    #[error("signup blocked")]
    Blocked,

    /// Key mismatch or tampering. Must never be collapsed into a generic
    /// bad-input failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// True when the error is a storage-level unique constraint violation,
/// which the signup flow treats as a duplicate-intent race loser.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
