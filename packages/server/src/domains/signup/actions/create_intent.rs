//! Create signup intent action

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::common::crypto::{encrypt_field, hmac_hex, verify_captcha};
use crate::domains::signup::errors::{is_unique_violation, SignupError};
use crate::domains::signup::models::{
    normalize_document, normalize_phone_to_e164, validate_document, DocumentType, SignupIntent,
    SignupIntentStatus,
};
use crate::kernel::ServerDeps;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid");
}

/// Signup form payload, as submitted by the prospective clinic admin.
#[derive(Debug, Clone)]
pub struct CreateIntentInput {
    pub clinic_name: String,
    pub admin_name: String,
    pub email: String,
    pub password: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub phone: String,
    pub captcha_a: u8,
    pub captcha_b: u8,
    pub captcha_token: String,
    pub captcha_answer: u16,
}

/// Create a signup intent.
///
/// Validates the captcha and every field, rejects duplicates against live
/// intents, creates the auth-provider identity (which sends the email
/// confirmation link) and stores the intent with encrypted PII and lookup
/// hashes. New intents land in `pending_verifications` with the document
/// already validated.
pub async fn create_intent(
    input: CreateIntentInput,
    client_ip: IpAddr,
    deps: &ServerDeps,
) -> Result<SignupIntent, SignupError> {
    let decision = deps
        .rate_limiter
        .check_and_consume(
            &format!("signup:create:{}", client_ip),
            deps.limits.signup_max,
            Duration::from_secs(deps.limits.signup_window_secs),
        )
        .await;
    if !decision.allowed {
        return Err(SignupError::RateLimited {
            reset_at: decision.reset_at,
        });
    }

    if !verify_captcha(
        &deps.hmac_secret,
        input.captcha_a,
        input.captcha_b,
        &input.captcha_token,
        input.captcha_answer,
    ) {
        return Err(SignupError::CaptchaFailed);
    }

    // Field validation: fail fast, no side effects yet.
    let clinic_name = input.clinic_name.trim().to_string();
    let admin_name = input.admin_name.trim().to_string();
    if clinic_name.is_empty() {
        return Err(SignupError::Validation("clinic name is required".into()));
    }
    if admin_name.is_empty() {
        return Err(SignupError::Validation("admin name is required".into()));
    }

    let email = input.email.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(SignupError::Validation("email is malformed".into()));
    }
    if input.password.len() < 8 {
        return Err(SignupError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    if !validate_document(input.document_type, &input.document_number) {
        return Err(SignupError::Validation("document number is invalid".into()));
    }
    let document = normalize_document(&input.document_number);

    let phone = normalize_phone_to_e164(&input.phone)
        .ok_or_else(|| SignupError::Validation("phone number is invalid".into()))?;

    // Deterministic hashes of the normalized values drive duplicate
    // detection without touching the encrypted columns.
    let document_hash = hmac_hex(&deps.hmac_secret, &document);
    let phone_hash = hmac_hex(&deps.hmac_secret, &phone);

    if SignupIntent::active_exists(&email, &document_hash, &phone_hash, &deps.db_pool).await? {
        return Err(SignupError::DuplicateSignup);
    }

    // The provider owns the password and sends the confirmation email.
    let auth_user = deps.auth.create_user(&email, &input.password).await?;

    let now = Utc::now();
    let intent = SignupIntent {
        id: Uuid::new_v4(),
        clinic_name,
        admin_name,
        email,
        email_verified: false,
        document_type: input.document_type,
        document_encrypted: encrypt_field(&deps.encryption_key, &document)?,
        document_hash,
        phone_encrypted: encrypt_field(&deps.encryption_key, &phone)?,
        phone_hash,
        phone_verified_at: None,
        document_validated_at: Some(now),
        otp_hash: None,
        otp_expires_at: None,
        otp_attempts: 0,
        otp_locked_until: None,
        otp_lockout_strikes: 0,
        otp_send_count: 0,
        otp_send_window_start: None,
        status: SignupIntentStatus::PendingVerifications,
        checkout_session_id: None,
        user_id: Some(auth_user.id),
        created_at: now,
        updated_at: now,
    };

    let intent = match intent.insert(&deps.db_pool).await {
        Ok(intent) => intent,
        // Partial unique index fired: a concurrent signup won the race.
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %intent.email, "Duplicate signup lost insert race");
            return Err(SignupError::DuplicateSignup);
        }
        Err(e) => return Err(e.into()),
    };

    info!(intent_id = %intent.id, client_ip = %client_ip, "Signup intent created");
    Ok(intent)
}
