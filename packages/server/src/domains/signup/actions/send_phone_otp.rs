//! Send phone OTP action

use chrono::{Duration as ChronoDuration, Utc};
use std::net::IpAddr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::common::crypto::{decrypt_field, generate_otp, hmac_hex};
use crate::domains::signup::errors::SignupError;
use crate::domains::signup::models::{SignupIntent, SignupIntentStatus};
use crate::domains::signup::types::OtpSent;
use crate::kernel::ServerDeps;

/// Generate and dispatch a fresh OTP for an intent's phone.
///
/// Two throttles apply: the generic per-IP limiter, and the intent's own
/// rolling send window, which bounds SMS spend even when the generic
/// limiter is bypassed (different IPs, internal callers).
pub async fn send_phone_otp(
    intent_id: Uuid,
    client_ip: IpAddr,
    user_agent: Option<&str>,
    deps: &ServerDeps,
) -> Result<OtpSent, SignupError> {
    let decision = deps
        .rate_limiter
        .check_and_consume(
            &format!("signup:otp-send:{}", client_ip),
            deps.limits.otp_send_max,
            Duration::from_secs(deps.limits.otp_send_window_secs),
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
    if intent.phone_verified_at.is_some() {
        return Err(SignupError::Validation("phone is already verified".into()));
    }

    let now = Utc::now();

    // Intent-scoped send window, independent of the generic limiter.
    let window = ChronoDuration::minutes(deps.otp.send_window_minutes);
    let (send_count, window_start) = match intent.otp_send_window_start {
        Some(start) if now - start < window => (intent.otp_send_count + 1, start),
        _ => (1, now),
    };
    if send_count > deps.otp.max_sends_per_window {
        return Err(SignupError::RateLimited {
            reset_at: window_start + window,
        });
    }

    let otp = generate_otp(deps.otp.length);
    let otp_hash = hmac_hex(&deps.hmac_secret, &otp);
    let expires_at = now + ChronoDuration::minutes(deps.otp.ttl_minutes);

    let intent = SignupIntent::store_otp(
        intent.id,
        &otp_hash,
        expires_at,
        send_count,
        window_start,
        &deps.db_pool,
    )
    .await?;

    let phone = decrypt_field(&deps.encryption_key, &intent.phone_encrypted)?;
    let body = format!(
        "Your Vitalis verification code is {}. It expires in {} minutes.",
        otp, deps.otp.ttl_minutes
    );
    deps.messaging.send_message(&phone, &body).await?;

    info!(
        intent_id = %intent.id,
        client_ip = %client_ip,
        user_agent = user_agent.unwrap_or("-"),
        send_count,
        "Phone OTP dispatched"
    );

    Ok(OtpSent {
        intent_id: intent.id,
        expires_at,
        sends_remaining: (deps.otp.max_sends_per_window - send_count).max(0),
    })
}
