//! Test fixtures: dependency containers over mocks and flow helpers.
//!
//! Fixtures walk the real actions end to end so every test exercises the
//! same code paths production does. Identities are randomized because the
//! partial unique indexes are global to the shared test database.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use rand::Rng;
use sqlx::PgPool;

use server_core::common::crypto::{create_captcha, EncryptionKey};
use server_core::config::{OtpConfig, RateLimitConfig};
use server_core::domains::provisioning::events::PaymentEvent;
use server_core::domains::signup::actions::{self, CreateIntentInput};
use server_core::domains::signup::models::{DocumentType, SignupIntent};
use server_core::kernel::{
    FixedWindowRateLimiter, MockAuthProvider, MockMessagingService, MockPaymentProvider,
    ServerDeps,
};

pub const TEST_HMAC_SECRET: &[u8] = b"test-hmac-secret";
pub const TEST_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

/// ServerDeps over mocks, with handles onto each mock for assertions.
pub struct TestDeps {
    pub deps: ServerDeps,
    pub messaging: Arc<MockMessagingService>,
    pub auth: Arc<MockAuthProvider>,
    pub payments: Arc<MockPaymentProvider>,
}

pub fn build_test_deps(pool: &PgPool) -> TestDeps {
    let messaging = Arc::new(MockMessagingService::new());
    let auth = Arc::new(MockAuthProvider::new());
    let payments = Arc::new(MockPaymentProvider::new());

    // Generous per-action limits; throttling behavior is covered by the
    // rate limiter's own unit tests.
    let limits = RateLimitConfig {
        signup_max: 10_000,
        signup_window_secs: 3600,
        otp_send_max: 10_000,
        otp_send_window_secs: 600,
        otp_verify_max: 10_000,
        otp_verify_window_secs: 600,
    };

    let deps = ServerDeps::new(
        pool.clone(),
        messaging.clone(),
        auth.clone(),
        payments.clone(),
        Arc::new(FixedWindowRateLimiter::new()),
        EncryptionKey::from_bytes([42u8; 32]),
        TEST_HMAC_SECRET.to_vec(),
        OtpConfig::default(),
        limits,
    );

    TestDeps {
        deps,
        messaging,
        auth,
        payments,
    }
}

/// Generate a valid random CPF (check digits computed per the official
/// weighted-sum rule).
pub fn random_cpf() -> String {
    let mut rng = rand::thread_rng();
    let mut digits: Vec<u32> = (0..9).map(|_| rng.gen_range(0..10)).collect();
    // Repeated sequences are rejected by the validator; reroll one digit.
    if digits.iter().all(|&d| d == digits[0]) {
        digits[8] = (digits[8] + 1) % 10;
    }

    for start in [10u32, 11u32] {
        let sum: u32 = digits
            .iter()
            .zip((2..=start).rev())
            .map(|(d, w)| d * w)
            .sum();
        let remainder = sum % 11;
        digits.push(if remainder < 2 { 0 } else { 11 - remainder });
    }

    digits.iter().map(|d| d.to_string()).collect()
}

/// Random domestic mobile number (11 digits, DDD 11).
pub fn random_phone() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8).map(|_| rng.gen_range(0..10).to_string()).collect();
    format!("119{}", suffix)
}

pub fn random_email() -> String {
    format!("admin-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// Build a complete, valid signup submission with a solved captcha.
/// The clinic name is unique per call so tests can count tenants by name
/// against the shared database.
pub fn signup_input(test: &TestDeps) -> CreateIntentInput {
    let captcha = create_captcha(&test.deps.hmac_secret);
    CreateIntentInput {
        clinic_name: format!("Clínica {}", uuid::Uuid::new_v4().simple()),
        admin_name: "Ana Souza".to_string(),
        email: random_email(),
        password: "correct-horse-battery".to_string(),
        document_type: DocumentType::Cpf,
        document_number: random_cpf(),
        phone: random_phone(),
        captcha_a: captcha.a,
        captcha_b: captcha.b,
        captcha_token: captcha.token,
        captcha_answer: u16::from(captcha.a) + u16::from(captcha.b),
    }
}

/// Walk an intent through every verification to VERIFIED: create, OTP
/// round-trip, email confirmation + refresh.
pub async fn create_verified_intent(test: &TestDeps) -> SignupIntent {
    let intent = actions::create_intent(signup_input(test), TEST_IP, &test.deps)
        .await
        .expect("create_intent should succeed");

    actions::send_phone_otp(intent.id, TEST_IP, Some("fixtures"), &test.deps)
        .await
        .expect("send_phone_otp should succeed");
    let otp = test.messaging.last_otp().expect("an OTP was dispatched");
    let intent = actions::verify_phone_otp(intent.id, &otp, TEST_IP, None, &test.deps)
        .await
        .expect("verify_phone_otp should succeed");

    test.auth
        .mark_verified(intent.user_id.as_deref().expect("identity bound"));
    actions::refresh_email_verification(intent.id, &test.deps)
        .await
        .expect("refresh_email_verification should succeed")
}

/// Verified intent with an open checkout session; returns the session id.
pub async fn create_checkout_started_intent(test: &TestDeps) -> (SignupIntent, String) {
    let intent = create_verified_intent(test).await;
    let started = actions::start_checkout(intent.id, "price_clinic_pro", &test.deps)
        .await
        .expect("start_checkout should succeed");
    let intent = SignupIntent::find_by_id(intent.id, &test.deps.db_pool)
        .await
        .expect("intent reload")
        .expect("intent exists");
    (intent, started.session_id)
}

/// Provider event for a completed checkout, shaped like the real payload.
pub fn checkout_completed_event(
    event_id: &str,
    session_id: &str,
    intent_id: uuid::Uuid,
) -> PaymentEvent {
    let json = serde_json::json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": 1714556800,
        "data": {
            "object": {
                "id": session_id,
                "customer": "cus_test_1",
                "subscription": format!("sub_{}", event_id),
                "client_reference_id": intent_id.to_string(),
                "payment_status": "paid",
                "metadata": {
                    "signup_intent_id": intent_id.to_string(),
                    "plan": "price_clinic_pro"
                }
            }
        }
    });
    PaymentEvent::from_bytes(json.to_string().as_bytes()).expect("event parses")
}

/// Provider event updating the subscription created at provisioning.
pub fn subscription_updated_event(
    event_id: &str,
    external_subscription_id: &str,
    status: &str,
    period_end: i64,
) -> PaymentEvent {
    let json = serde_json::json!({
        "id": event_id,
        "type": "customer.subscription.updated",
        "created": 1714556800,
        "data": {
            "object": {
                "id": external_subscription_id,
                "customer": "cus_test_1",
                "status": status,
                "current_period_end": period_end,
                "cancel_at_period_end": false,
                "items": { "data": [{ "price": { "id": "price_clinic_pro" } }] }
            }
        }
    });
    PaymentEvent::from_bytes(json.to_string().as_bytes()).expect("event parses")
}
