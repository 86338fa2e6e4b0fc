//! Signup actions - one file per operation.

pub mod create_intent;
pub mod refresh_email;
pub mod send_phone_otp;
pub mod start_checkout;
pub mod verify_phone_otp;

pub use create_intent::{create_intent, CreateIntentInput};
pub use refresh_email::{refresh_email_verification, resend_email_verification};
pub use send_phone_otp::send_phone_otp;
pub use start_checkout::start_checkout;
pub use verify_phone_otp::verify_phone_otp;

use sqlx::PgPool;

use super::errors::SignupError;
use super::models::{SignupIntent, SignupIntentStatus};

/// Advance to VERIFIED once email, phone and document are all verified.
/// The guarded UPDATE makes concurrent verification steps race-safe: only
/// one writer moves the row out of pending_verifications.
pub(crate) async fn maybe_advance_to_verified(
    intent: SignupIntent,
    pool: &PgPool,
) -> Result<SignupIntent, SignupError> {
    if intent.status == SignupIntentStatus::PendingVerifications
        && intent.verifications_complete()
    {
        if let Some(updated) = SignupIntent::advance_status(
            intent.id,
            SignupIntentStatus::PendingVerifications,
            SignupIntentStatus::Verified,
            pool,
        )
        .await?
        {
            tracing::info!(intent_id = %updated.id, "Signup intent fully verified");
            return Ok(updated);
        }
    }
    Ok(intent)
}

/// Load an intent or fail with NotFound; absorbing states short-circuit.
pub(crate) async fn load_active_intent(
    id: uuid::Uuid,
    pool: &PgPool,
) -> Result<SignupIntent, SignupError> {
    let intent = SignupIntent::find_by_id(id, pool)
        .await?
        .ok_or(SignupError::NotFound)?;

    match intent.status {
        SignupIntentStatus::Blocked => Err(SignupError::Blocked),
        SignupIntentStatus::Expired => Err(SignupError::InvalidStatus {
            status: intent.status.as_str().to_string(),
        }),
        _ => Ok(intent),
    }
}
