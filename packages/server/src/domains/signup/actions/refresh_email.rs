//! Email verification actions
//!
//! Email ownership is proven through the external auth provider's
//! confirmation link; this core only reads the resulting flag back.

use tracing::info;
use uuid::Uuid;

use crate::domains::signup::errors::SignupError;
use crate::domains::signup::models::SignupIntent;
use crate::kernel::ServerDeps;

/// Re-check the bound identity and flip `email_verified` when the provider
/// reports the address as confirmed.
pub async fn refresh_email_verification(
    intent_id: Uuid,
    deps: &ServerDeps,
) -> Result<SignupIntent, SignupError> {
    let intent = super::load_active_intent(intent_id, &deps.db_pool).await?;

    if intent.email_verified {
        return super::maybe_advance_to_verified(intent, &deps.db_pool).await;
    }

    let user_id = intent
        .user_id
        .as_deref()
        .ok_or_else(|| SignupError::Validation("no identity bound to this signup".into()))?;

    let user = deps.auth.get_user(user_id).await?;
    if !user.email_verified {
        return Ok(intent);
    }

    let intent = SignupIntent::mark_email_verified(intent.id, &deps.db_pool).await?;
    info!(intent_id = %intent.id, "Email verified");
    super::maybe_advance_to_verified(intent, &deps.db_pool).await
}

/// Ask the provider to re-send the confirmation link.
pub async fn resend_email_verification(
    intent_id: Uuid,
    deps: &ServerDeps,
) -> Result<(), SignupError> {
    let intent = super::load_active_intent(intent_id, &deps.db_pool).await?;

    if intent.email_verified {
        return Err(SignupError::Validation("email is already verified".into()));
    }

    let user_id = intent
        .user_id
        .as_deref()
        .ok_or_else(|| SignupError::Validation("no identity bound to this signup".into()))?;

    deps.auth.resend_verification(user_id).await?;
    info!(intent_id = %intent.id, "Email verification resent");
    Ok(())
}
