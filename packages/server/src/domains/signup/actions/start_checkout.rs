//! Start checkout action

use tracing::info;
use uuid::Uuid;

use crate::domains::signup::errors::SignupError;
use crate::domains::signup::models::{SignupIntent, SignupIntentStatus};
use crate::domains::signup::types::CheckoutStarted;
use crate::kernel::ServerDeps;

/// Open a hosted checkout session for a fully verified intent and advance
/// it to `checkout_started`.
pub async fn start_checkout(
    intent_id: Uuid,
    plan: &str,
    deps: &ServerDeps,
) -> Result<CheckoutStarted, SignupError> {
    let plan = plan.trim();
    if plan.is_empty() || !plan.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SignupError::Validation("plan is invalid".into()));
    }

    let intent = super::load_active_intent(intent_id, &deps.db_pool).await?;
    if intent.status != SignupIntentStatus::Verified {
        return Err(SignupError::InvalidStatus {
            status: intent.status.as_str().to_string(),
        });
    }

    let session = deps
        .payments
        .create_checkout_session(&intent.id.to_string(), &intent.email, plan)
        .await?;

    // Guarded write: a concurrent checkout for the same intent loses here.
    let intent = SignupIntent::start_checkout(intent.id, &session.id, &deps.db_pool)
        .await?
        .ok_or(SignupError::InvalidStatus {
            status: SignupIntentStatus::CheckoutStarted.as_str().to_string(),
        })?;

    info!(
        intent_id = %intent.id,
        session_id = %session.id,
        plan,
        "Checkout session created"
    );

    Ok(CheckoutStarted {
        intent_id: intent.id,
        session_id: session.id,
        checkout_url: session.url,
    })
}
