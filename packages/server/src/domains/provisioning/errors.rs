use thiserror::Error;

/// Provisioning engine errors.
///
/// Everything here maps to a failure response at the webhook boundary, so
/// the provider redelivers. Duplicate deliveries are NOT errors; they come
/// back as `ProcessOutcome::Duplicate`.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("malformed event payload: {0}")]
    InvalidPayload(String),

    #[error("no signup intent for checkout session {session_id}")]
    IntentNotFound { session_id: String },

    #[error("intent {intent_id} is not eligible for provisioning (status {status})")]
    IntentNotEligible { intent_id: String, status: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
