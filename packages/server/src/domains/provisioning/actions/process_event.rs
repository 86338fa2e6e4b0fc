//! Payment webhook processing and tenant provisioning.
//!
//! Everything runs in one transaction, with the `processed_events` insert
//! as the serialization point between concurrent deliveries of the same
//! event. A failed attempt rolls the whole transaction back, so the
//! provider's redelivery re-drives provisioning from scratch; a committed
//! attempt makes every later delivery a no-op. Sub-resources use
//! insert-if-absent, so a re-driven run completes rather than duplicates.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domains::provisioning::errors::ProvisioningError;
use crate::domains::provisioning::events::{
    CheckoutSessionObject, PaymentEvent, PaymentEventType,
};
use crate::domains::provisioning::models::{
    AdminProfile, Clinic, ClinicMembership, ProcessedEvent, ProvisioningJob, Subscription,
    SubscriptionStatus,
};
use crate::domains::signup::models::{SignupIntent, SignupIntentStatus};
use crate::kernel::ServerDeps;

const ADMIN_ROLE: &str = "admin";

/// Outcome of handling one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Event acted on (tenant provisioned, subscription updated, intent
    /// reverted).
    Processed,
    /// Event id seen before; nothing done. Success for the provider.
    Duplicate,
    /// Event type we do not handle, or one that references nothing of ours.
    Ignored,
}

/// Process an authenticated payment-provider event exactly once.
///
/// Signature verification happens at the HTTP boundary before this is
/// called. Errors roll everything back and must surface as a failure
/// response so the provider retries.
pub async fn process_payment_event(
    event: &PaymentEvent,
    deps: &ServerDeps,
) -> Result<ProcessOutcome, ProvisioningError> {
    let mut tx = deps.db_pool.begin().await?;

    let fresh = ProcessedEvent::insert_tx(&event.id, &event.event_type, &mut tx).await?;
    if !fresh {
        tx.rollback().await?;
        info!(event_id = %event.id, "Duplicate webhook event, skipping");
        return Ok(ProcessOutcome::Duplicate);
    }

    let result = dispatch(event, &mut tx, deps).await;

    match result {
        Ok(outcome) => {
            tx.commit().await?;
            Ok(outcome)
        }
        Err(e) => {
            // Implicit rollback when the transaction drops; the event id is
            // gone with it, so redelivery re-drives the full provisioning.
            drop(tx);
            error!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "Webhook processing failed, provider will retry"
            );
            record_failure(event, &e, deps).await;
            Err(e)
        }
    }
}

async fn dispatch(
    event: &PaymentEvent,
    tx: &mut PgConnection,
    deps: &ServerDeps,
) -> Result<ProcessOutcome, ProvisioningError> {
    match event.typed_event_type() {
        PaymentEventType::CheckoutCompleted => {
            let session = event.as_checkout_session()?;
            provision_tenant(event, &session, tx, deps).await
        }
        PaymentEventType::CheckoutExpired | PaymentEventType::CheckoutPaymentFailed => {
            let session = event.as_checkout_session()?;
            revert_checkout(event, &session, tx, deps).await
        }
        PaymentEventType::SubscriptionUpdated | PaymentEventType::SubscriptionDeleted => {
            apply_subscription_change(event, tx).await
        }
        PaymentEventType::Unknown => {
            info!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Unhandled webhook event type"
            );
            Ok(ProcessOutcome::Ignored)
        }
    }
}

/// Create the tenant for a completed checkout: clinic, admin profile,
/// membership and subscription, then mark the intent converted. All four
/// are one logical unit inside the caller's transaction.
async fn provision_tenant(
    event: &PaymentEvent,
    session: &CheckoutSessionObject,
    tx: &mut PgConnection,
    deps: &ServerDeps,
) -> Result<ProcessOutcome, ProvisioningError> {
    let intent = resolve_intent(session, deps).await?;

    if matches!(
        intent.status,
        SignupIntentStatus::Blocked | SignupIntentStatus::Expired
    ) {
        return Err(ProvisioningError::IntentNotEligible {
            intent_id: intent.id.to_string(),
            status: intent.status.as_str().to_string(),
        });
    }

    let user_id = intent.user_id.clone().ok_or_else(|| {
        ProvisioningError::Internal(anyhow::anyhow!(
            "intent {} has no bound identity",
            intent.id
        ))
    })?;

    let job = ProvisioningJob::claim_tx(intent.id, Some(&session.id), tx).await?;

    // A completed prior run (semantic duplicate under a new event id) left
    // its clinic id on the job; reuse it instead of minting a second tenant.
    let clinic = match job.clinic_id {
        Some(clinic_id) => Clinic::find_by_id_tx(clinic_id, tx).await?.ok_or_else(|| {
            ProvisioningError::Internal(anyhow::anyhow!(
                "provisioning job {} references missing clinic {}",
                job.id,
                clinic_id
            ))
        })?,
        None => Clinic::create_tx(&intent.clinic_name, tx).await?,
    };

    let profile =
        AdminProfile::find_or_create_tx(&user_id, &intent.email, &intent.admin_name, tx).await?;

    ClinicMembership::find_or_create_tx(clinic.id, profile.id, ADMIN_ROLE, tx).await?;

    let plan = session
        .metadata
        .plan
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let status = match session.payment_status.as_deref() {
        Some("paid") | Some("no_payment_required") => SubscriptionStatus::Active,
        other => {
            warn!(
                event_id = %event.id,
                payment_status = other.unwrap_or("-"),
                "Checkout completed without settled payment"
            );
            SubscriptionStatus::Incomplete
        }
    };

    Subscription::find_or_create_tx(
        clinic.id,
        session.subscription.as_deref(),
        session.customer.as_deref(),
        &plan,
        status,
        None,
        tx,
    )
    .await?;

    SignupIntent::mark_converted_tx(intent.id, tx)
        .await?
        .ok_or_else(|| ProvisioningError::IntentNotEligible {
            intent_id: intent.id.to_string(),
            status: intent.status.as_str().to_string(),
        })?;

    ProvisioningJob::complete_tx(job.id, clinic.id, tx).await?;

    info!(
        event_id = %event.id,
        intent_id = %intent.id,
        clinic_id = %clinic.id,
        "Tenant provisioned"
    );
    Ok(ProcessOutcome::Processed)
}

/// Expired or failed checkout: the intent goes back to `verified` so the
/// user can retry with a fresh session.
async fn revert_checkout(
    event: &PaymentEvent,
    session: &CheckoutSessionObject,
    tx: &mut PgConnection,
    deps: &ServerDeps,
) -> Result<ProcessOutcome, ProvisioningError> {
    let intent = match SignupIntent::find_by_checkout_session(&session.id, &deps.db_pool).await? {
        Some(intent) => intent,
        None => {
            info!(
                event_id = %event.id,
                session_id = %session.id,
                "Checkout failure for unknown session"
            );
            return Ok(ProcessOutcome::Ignored);
        }
    };

    match SignupIntent::revert_checkout_tx(intent.id, tx).await? {
        Some(_) => {
            info!(
                event_id = %event.id,
                intent_id = %intent.id,
                event_type = %event.event_type,
                "Checkout failed, intent returned to verified"
            );
            Ok(ProcessOutcome::Processed)
        }
        // Already converted or reverted; nothing to undo.
        None => Ok(ProcessOutcome::Ignored),
    }
}

/// Subscription lifecycle changes for an existing tenant. No creation here.
async fn apply_subscription_change(
    event: &PaymentEvent,
    tx: &mut PgConnection,
) -> Result<ProcessOutcome, ProvisioningError> {
    let subscription = event.as_subscription()?;

    let status = if event.typed_event_type() == PaymentEventType::SubscriptionDeleted {
        SubscriptionStatus::Canceled
    } else {
        SubscriptionStatus::from_provider(&subscription.status)
    };
    let period_end = subscription
        .current_period_end
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

    match Subscription::update_by_external_id(
        &subscription.id,
        status,
        period_end,
        subscription.cancel_at_period_end,
        tx,
    )
    .await?
    {
        Some(updated) => {
            info!(
                event_id = %event.id,
                subscription_id = %subscription.id,
                clinic_id = %updated.clinic_id,
                status = ?status,
                "Subscription updated"
            );
            Ok(ProcessOutcome::Processed)
        }
        None => {
            warn!(
                event_id = %event.id,
                subscription_id = %subscription.id,
                "Subscription event for unknown subscription"
            );
            Ok(ProcessOutcome::Ignored)
        }
    }
}

/// Resolve the signup intent a checkout session belongs to: the reference
/// we attached at session creation, falling back to the stored session id.
async fn resolve_intent(
    session: &CheckoutSessionObject,
    deps: &ServerDeps,
) -> Result<SignupIntent, ProvisioningError> {
    if let Some(reference) = session.intent_reference() {
        if let Ok(intent_id) = Uuid::parse_str(reference) {
            if let Some(intent) = SignupIntent::find_by_id(intent_id, &deps.db_pool).await? {
                return Ok(intent);
            }
        }
    }

    SignupIntent::find_by_checkout_session(&session.id, &deps.db_pool)
        .await?
        .ok_or_else(|| ProvisioningError::IntentNotFound {
            session_id: session.id.clone(),
        })
}

/// Best-effort failure projection for polling clients; runs after the
/// rollback, never masks the original error.
async fn record_failure(event: &PaymentEvent, error: &ProvisioningError, deps: &ServerDeps) {
    if event.typed_event_type() != PaymentEventType::CheckoutCompleted {
        return;
    }
    let Ok(session) = event.as_checkout_session() else {
        return;
    };
    let Ok(intent) = resolve_intent(&session, deps).await else {
        return;
    };

    if let Err(e) = ProvisioningJob::mark_failed(
        intent.id,
        Some(session.id.as_str()),
        &error.to_string(),
        &deps.db_pool,
    )
    .await
    {
        warn!(intent_id = %intent.id, error = %e, "Failed to record provisioning failure");
    }
}
