//! Webhook engine tests: exactly-once provisioning, duplicate deliveries,
//! failure classes and the status projection.

mod common;

use common::*;
use test_context::test_context;
use uuid::Uuid;

use server_core::domains::provisioning::actions::{
    process_payment_event, provisioning_status, ProcessOutcome, StatusQuery,
};
use server_core::domains::provisioning::events::PaymentEvent;
use server_core::domains::provisioning::models::{
    Clinic, ProvisioningJobStatus, Subscription, SubscriptionStatus,
};
use server_core::domains::provisioning::ProvisioningError;
use server_core::domains::signup::models::{SignupIntent, SignupIntentStatus};

async fn clinic_count(pool: &sqlx::PgPool, name: &str) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clinics WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[test_context(TestHarness)]
#[tokio::test]
async fn checkout_completed_provisions_the_tenant_once(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);
    let (intent, session_id) = create_checkout_started_intent(&test).await;

    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let event = checkout_completed_event(&event_id, &session_id, intent.id);

    let outcome = process_payment_event(&event, &test.deps).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Processed);

    // Intent converted.
    let intent = SignupIntent::find_by_id(intent.id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, SignupIntentStatus::Converted);

    // Tenant assembled: clinic, membership, subscription, job projection.
    let status = provisioning_status(StatusQuery::IntentId(intent.id), &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert!(status.ready);
    let clinic_id = status.clinic_id.expect("clinic linked");
    assert!(Clinic::find_by_id(clinic_id, &ctx.db_pool)
        .await
        .unwrap()
        .is_some());

    let job = status.job.expect("job projection present");
    assert_eq!(job.status, ProvisioningJobStatus::Completed);
    assert!(job.error_message.is_none());

    let subscription = Subscription::find_by_clinic(clinic_id, &ctx.db_pool)
        .await
        .unwrap()
        .expect("subscription created");
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(subscription.plan, "price_clinic_pro");

    let memberships: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM clinic_memberships WHERE clinic_id = $1 AND role = 'admin'",
    )
    .bind(clinic_id)
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(memberships, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn duplicate_delivery_is_a_no_op_success(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);
    let (intent, session_id) = create_checkout_started_intent(&test).await;

    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let event = checkout_completed_event(&event_id, &session_id, intent.id);

    assert_eq!(
        process_payment_event(&event, &test.deps).await.unwrap(),
        ProcessOutcome::Processed
    );
    // Redelivery of the same event id: success, no further side effects.
    assert_eq!(
        process_payment_event(&event, &test.deps).await.unwrap(),
        ProcessOutcome::Duplicate
    );

    assert_eq!(clinic_count(&ctx.db_pool, &intent.clinic_name).await, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn semantic_duplicate_under_new_event_id_reuses_the_tenant(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);
    let (intent, session_id) = create_checkout_started_intent(&test).await;

    let first = checkout_completed_event(
        &format!("evt_{}", Uuid::new_v4().simple()),
        &session_id,
        intent.id,
    );
    let second = checkout_completed_event(
        &format!("evt_{}", Uuid::new_v4().simple()),
        &session_id,
        intent.id,
    );

    process_payment_event(&first, &test.deps).await.unwrap();
    process_payment_event(&second, &test.deps).await.unwrap();

    // The job's clinic anchor prevents a second tenant.
    assert_eq!(clinic_count(&ctx.db_pool, &intent.clinic_name).await, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failed_provisioning_rolls_back_and_redelivery_succeeds(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);
    let (intent, session_id) = create_checkout_started_intent(&test).await;

    // Simulate a mid-provisioning failure: blocked intents refuse to
    // provision, so flip the status under the engine's feet.
    SignupIntent::set_status(intent.id, SignupIntentStatus::Blocked, &ctx.db_pool)
        .await
        .unwrap();

    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let event = checkout_completed_event(&event_id, &session_id, intent.id);

    let err = process_payment_event(&event, &test.deps).await.unwrap_err();
    assert!(matches!(err, ProvisioningError::IntentNotEligible { .. }));

    // No tombstone: the failed attempt left no processed-event record, so
    // the provider's redelivery re-drives provisioning in full.
    SignupIntent::set_status(intent.id, SignupIntentStatus::CheckoutStarted, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(
        process_payment_event(&event, &test.deps).await.unwrap(),
        ProcessOutcome::Processed
    );
    assert_eq!(clinic_count(&ctx.db_pool, &intent.clinic_name).await, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_session_fails_so_the_provider_retries(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);

    let event = checkout_completed_event(
        &format!("evt_{}", Uuid::new_v4().simple()),
        "cs_nonexistent",
        Uuid::new_v4(),
    );

    let err = process_payment_event(&event, &test.deps).await.unwrap_err();
    assert!(matches!(err, ProvisioningError::IntentNotFound { .. }));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn checkout_expiry_returns_the_intent_to_verified(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);
    let (intent, session_id) = create_checkout_started_intent(&test).await;

    let json = serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.expired",
        "created": 1714556800,
        "data": { "object": { "id": session_id } }
    });
    let event = PaymentEvent::from_bytes(json.to_string().as_bytes()).unwrap();

    assert_eq!(
        process_payment_event(&event, &test.deps).await.unwrap(),
        ProcessOutcome::Processed
    );

    let intent = SignupIntent::find_by_id(intent.id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, SignupIntentStatus::Verified);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn subscription_update_touches_only_the_subscription(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);
    let (intent, session_id) = create_checkout_started_intent(&test).await;

    let completed_id = format!("evt_{}", Uuid::new_v4().simple());
    let event = checkout_completed_event(&completed_id, &session_id, intent.id);
    process_payment_event(&event, &test.deps).await.unwrap();

    // The provisioning fixture stores sub_{event_id} as the external id.
    let external_id = format!("sub_{}", completed_id);
    let period_end = 1_760_000_000i64;
    let update = subscription_updated_event(
        &format!("evt_{}", Uuid::new_v4().simple()),
        &external_id,
        "past_due",
        period_end,
    );
    assert_eq!(
        process_payment_event(&update, &test.deps).await.unwrap(),
        ProcessOutcome::Processed
    );

    let status = provisioning_status(StatusQuery::SessionId(session_id), &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    let subscription = status.subscription.expect("subscription present");
    assert_eq!(subscription.status, SubscriptionStatus::PastDue);
    assert_eq!(
        subscription.current_period_end.map(|t| t.timestamp()),
        Some(period_end)
    );
    // Past-due tenants are provisioned but not "ready".
    assert!(!status.ready);
    // No second clinic was created by the update.
    assert_eq!(clinic_count(&ctx.db_pool, &intent.clinic_name).await, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn subscription_event_for_unknown_subscription_is_ignored(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);

    let update = subscription_updated_event(
        &format!("evt_{}", Uuid::new_v4().simple()),
        "sub_does_not_exist",
        "canceled",
        1_760_000_000,
    );
    assert_eq!(
        process_payment_event(&update, &test.deps).await.unwrap(),
        ProcessOutcome::Ignored
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn status_poll_before_webhook_reports_not_ready(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);
    let (intent, session_id) = create_checkout_started_intent(&test).await;

    for query in [
        StatusQuery::IntentId(intent.id),
        StatusQuery::SessionId(session_id),
    ] {
        let status = provisioning_status(query, &ctx.db_pool)
            .await
            .unwrap()
            .expect("intent is known");
        assert!(!status.ready);
        assert_eq!(status.intent_status, SignupIntentStatus::CheckoutStarted);
        assert!(status.clinic_id.is_none());
        assert!(status.subscription.is_none());
    }

    // Unknown intent: None, not an error.
    assert!(provisioning_status(StatusQuery::IntentId(Uuid::new_v4()), &ctx.db_pool)
        .await
        .unwrap()
        .is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_event_types_are_acknowledged_and_recorded(ctx: &mut TestHarness) {
    let test = build_test_deps(&ctx.db_pool);

    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let json = serde_json::json!({
        "id": event_id,
        "type": "invoice.finalized",
        "created": 1714556800,
        "data": { "object": {} }
    });
    let event = PaymentEvent::from_bytes(json.to_string().as_bytes()).unwrap();

    assert_eq!(
        process_payment_event(&event, &test.deps).await.unwrap(),
        ProcessOutcome::Ignored
    );
    // The id is recorded, so a redelivery is a duplicate no-op.
    assert_eq!(
        process_payment_event(&event, &test.deps).await.unwrap(),
        ProcessOutcome::Duplicate
    );
}
