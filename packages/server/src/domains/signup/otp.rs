//! Pure OTP verification policy.
//!
//! `evaluate` is a total function of its inputs: the caller passes the
//! current sub-state and an explicit `now`, and persists whatever comes
//! back. Keeping the policy free of clock reads and storage makes the
//! lockout arithmetic testable on its own.

use chrono::{DateTime, Duration, Utc};

use crate::common::crypto::hmac_verify;

/// OTP sub-state as currently persisted on the intent.
#[derive(Debug, Clone, Default)]
pub struct OtpState<'a> {
    pub otp_hash: Option<&'a str>,
    pub expires_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Verification policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub max_attempts: i32,
    pub lockout_minutes: i64,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_minutes: 15,
        }
    }
}

/// Outcome of evaluating one submitted code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpOutcome {
    /// Code matches; caller resets the sub-state.
    Valid,
    /// Wrong code; caller persists the incremented attempt count.
    Invalid { attempts: i32 },
    /// No live code: never issued, expired, or a lockout elapsed without a
    /// fresh send.
    Expired,
    /// Too many attempts; caller persists `locked_until`.
    Locked { locked_until: DateTime<Utc> },
}

/// Evaluate a submitted OTP against the stored sub-state.
///
/// Precedence: active lock, then liveness of the stored code, then the
/// constant-time hash comparison, then attempt accounting.
pub fn evaluate(
    state: &OtpState<'_>,
    submitted: &str,
    secret: &[u8],
    now: DateTime<Utc>,
    policy: &OtpPolicy,
) -> OtpOutcome {
    if let Some(locked_until) = state.locked_until {
        if now < locked_until {
            return OtpOutcome::Locked { locked_until };
        }
    }

    let (hash, expires_at) = match (state.otp_hash, state.expires_at) {
        (Some(hash), Some(expires_at)) => (hash, expires_at),
        _ => return OtpOutcome::Expired,
    };
    if now > expires_at {
        return OtpOutcome::Expired;
    }

    if hmac_verify(secret, submitted, hash) {
        return OtpOutcome::Valid;
    }

    let attempts = state.attempts + 1;
    if attempts >= policy.max_attempts {
        OtpOutcome::Locked {
            locked_until: now + Duration::minutes(policy.lockout_minutes),
        }
    } else {
        OtpOutcome::Invalid { attempts }
    }
}
