//! Verify phone OTP action

use chrono::Utc;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domains::signup::errors::SignupError;
use crate::domains::signup::models::{SignupIntent, SignupIntentStatus};
use crate::domains::signup::otp::{self, OtpOutcome, OtpPolicy, OtpState};
use crate::kernel::ServerDeps;

/// Verify a submitted OTP.
///
/// The policy evaluation is pure (`otp::evaluate`); this action loads the
/// sub-state, runs it, and persists whatever came back. Repeated lockouts
/// beyond the strike budget block the intent as abusive.
pub async fn verify_phone_otp(
    intent_id: Uuid,
    submitted: &str,
    client_ip: IpAddr,
    user_agent: Option<&str>,
    deps: &ServerDeps,
) -> Result<SignupIntent, SignupError> {
    let decision = deps
        .rate_limiter
        .check_and_consume(
            &format!("signup:otp-verify:{}", client_ip),
            deps.limits.otp_verify_max,
            Duration::from_secs(deps.limits.otp_verify_window_secs),
        )
        .await;
    if !decision.allowed {
        return Err(SignupError::RateLimited {
            reset_at: decision.reset_at,
        });
    }

    let intent = super::load_active_intent(intent_id, &deps.db_pool).await?;
    if intent.status != SignupIntentStatus::PendingVerifications {
        return Err(SignupError::InvalidStatus {
            status: intent.status.as_str().to_string(),
        });
    }

    let now = Utc::now();
    let state = OtpState {
        otp_hash: intent.otp_hash.as_deref(),
        expires_at: intent.otp_expires_at,
        attempts: intent.otp_attempts,
        locked_until: intent.otp_locked_until,
    };
    let policy = OtpPolicy {
        max_attempts: deps.otp.max_attempts,
        lockout_minutes: deps.otp.lockout_minutes,
    };

    match otp::evaluate(&state, submitted, &deps.hmac_secret, now, &policy) {
        OtpOutcome::Valid => {
            let intent = SignupIntent::mark_phone_verified(intent.id, now, &deps.db_pool).await?;
            info!(intent_id = %intent.id, client_ip = %client_ip, "Phone verified");
            super::maybe_advance_to_verified(intent, &deps.db_pool).await
        }
        OtpOutcome::Invalid { attempts } => {
            SignupIntent::record_otp_failure(
                intent.id,
                attempts,
                None,
                intent.otp_lockout_strikes,
                &deps.db_pool,
            )
            .await?;
            Err(SignupError::OtpInvalid {
                attempts_remaining: (deps.otp.max_attempts - attempts).max(0),
            })
        }
        OtpOutcome::Expired => Err(SignupError::OtpExpired),
        OtpOutcome::Locked { locked_until } => {
            // A pre-existing lock echoes its own timestamp back; only a new
            // lock counts as a strike.
            let newly_locked = intent.otp_locked_until != Some(locked_until);
            if !newly_locked {
                return Err(SignupError::OtpLocked { locked_until });
            }

            let strikes = intent.otp_lockout_strikes + 1;
            if strikes >= deps.otp.max_lockout_strikes {
                SignupIntent::set_status(intent.id, SignupIntentStatus::Blocked, &deps.db_pool)
                    .await?;
                warn!(
                    intent_id = %intent.id,
                    client_ip = %client_ip,
                    user_agent = user_agent.unwrap_or("-"),
                    strikes,
                    "Signup intent blocked after repeated OTP lockouts"
                );
                return Err(SignupError::Blocked);
            }

            SignupIntent::record_otp_failure(
                intent.id,
                deps.otp.max_attempts,
                Some(locked_until),
                strikes,
                &deps.db_pool,
            )
            .await?;
            warn!(
                intent_id = %intent.id,
                client_ip = %client_ip,
                strikes,
                "OTP verification locked"
            );
            Err(SignupError::OtpLocked { locked_until })
        }
    }
}
