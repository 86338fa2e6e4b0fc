//! Provisioning status query.
//!
//! Read-only projection for polling clients. Called before the webhook has
//! landed it answers not-ready; it never reports a partially applied
//! tenant because provisioning commits atomically.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::provisioning::errors::ProvisioningError;
use crate::domains::provisioning::models::{
    ProvisioningJob, ProvisioningJobStatus, Subscription, SubscriptionStatus,
};
use crate::domains::signup::models::{SignupIntent, SignupIntentStatus};

/// Lookup key for a poll: clients hold either the intent id or the
/// checkout session id.
#[derive(Debug, Clone)]
pub enum StatusQuery {
    IntentId(Uuid),
    SessionId(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningStatus {
    /// True once the tenant exists and its subscription is active.
    pub ready: bool,
    pub intent_status: SignupIntentStatus,
    pub clinic_id: Option<Uuid>,
    pub job: Option<JobStatusView>,
    pub subscription: Option<SubscriptionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub status: ProvisioningJobStatus,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub plan: String,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Report provisioning progress for an intent. Mutates nothing.
pub async fn provisioning_status(
    query: StatusQuery,
    pool: &PgPool,
) -> Result<Option<ProvisioningStatus>, ProvisioningError> {
    let intent = match query {
        StatusQuery::IntentId(id) => SignupIntent::find_by_id(id, pool).await?,
        StatusQuery::SessionId(session_id) => {
            SignupIntent::find_by_checkout_session(&session_id, pool).await?
        }
    };
    let Some(intent) = intent else {
        return Ok(None);
    };

    let job = ProvisioningJob::find_by_intent(intent.id, pool).await?;
    let clinic_id = job.as_ref().and_then(|j| j.clinic_id);

    let subscription = match clinic_id {
        Some(clinic_id) => Subscription::find_by_clinic(clinic_id, pool).await?,
        None => None,
    };

    let ready = intent.status == SignupIntentStatus::Converted
        && clinic_id.is_some()
        && subscription
            .as_ref()
            .map(|s| s.status.is_active())
            .unwrap_or(false);

    Ok(Some(ProvisioningStatus {
        ready,
        intent_status: intent.status,
        clinic_id,
        job: job.map(|j| JobStatusView {
            status: j.status,
            error_message: j.error_message,
            updated_at: j.updated_at,
        }),
        subscription: subscription.map(|s| SubscriptionView {
            plan: s.plan,
            status: s.status,
            current_period_end: s.current_period_end,
        }),
    }))
}
