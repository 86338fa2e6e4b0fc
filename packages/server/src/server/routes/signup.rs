//! Signup flow endpoints.

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr};
use uuid::Uuid;

use crate::common::crypto::{create_captcha, CaptchaChallenge};
use crate::domains::signup::actions;
use crate::domains::signup::models::DocumentType;
use crate::server::app::AppState;
use crate::server::middleware::ClientIp;

use super::signup_error_response;

fn client_ip(extension: Option<&ClientIp>) -> IpAddr {
    extension
        .map(|c| c.0)
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get("user-agent").and_then(|v| v.to_str().ok())
}

// =============================================================================
// Captcha
// =============================================================================

pub async fn captcha_handler(Extension(state): Extension<AppState>) -> Json<CaptchaChallenge> {
    Json(create_captcha(&state.server_deps.hmac_secret))
}

// =============================================================================
// Create intent
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSignupRequest {
    pub clinic_name: String,
    pub admin_name: String,
    pub email: String,
    pub password: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub phone: String,
    pub captcha: CaptchaAnswer,
}

#[derive(Debug, Deserialize)]
pub struct CaptchaAnswer {
    pub a: u8,
    pub b: u8,
    pub token: String,
    pub answer: u16,
}

#[derive(Debug, Serialize)]
pub struct SignupIntentResponse {
    pub intent_id: Uuid,
    pub status: String,
    pub email_verified: bool,
    pub phone_verified: bool,
}

pub async fn create_signup_handler(
    Extension(state): Extension<AppState>,
    ip: Option<Extension<ClientIp>>,
    Json(request): Json<CreateSignupRequest>,
) -> Response {
    let input = actions::CreateIntentInput {
        clinic_name: request.clinic_name,
        admin_name: request.admin_name,
        email: request.email,
        password: request.password,
        document_type: request.document_type,
        document_number: request.document_number,
        phone: request.phone,
        captcha_a: request.captcha.a,
        captcha_b: request.captcha.b,
        captcha_token: request.captcha.token,
        captcha_answer: request.captcha.answer,
    };

    let ip = client_ip(ip.as_deref());
    match actions::create_intent(input, ip, &state.server_deps).await {
        Ok(intent) => (
            StatusCode::CREATED,
            Json(SignupIntentResponse {
                intent_id: intent.id,
                status: intent.status.as_str().to_string(),
                email_verified: intent.email_verified,
                phone_verified: intent.phone_verified_at.is_some(),
            }),
        )
            .into_response(),
        Err(e) => signup_error_response(e),
    }
}

// =============================================================================
// Phone OTP
// =============================================================================

pub async fn otp_send_handler(
    Extension(state): Extension<AppState>,
    Path(intent_id): Path<Uuid>,
    ip: Option<Extension<ClientIp>>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(ip.as_deref());
    match actions::send_phone_otp(intent_id, ip, user_agent(&headers), &state.server_deps).await {
        Ok(sent) => Json(sent).into_response(),
        Err(e) => signup_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub code: String,
}

pub async fn otp_verify_handler(
    Extension(state): Extension<AppState>,
    Path(intent_id): Path<Uuid>,
    ip: Option<Extension<ClientIp>>,
    headers: HeaderMap,
    Json(request): Json<VerifyOtpRequest>,
) -> Response {
    let ip = client_ip(ip.as_deref());
    match actions::verify_phone_otp(
        intent_id,
        &request.code,
        ip,
        user_agent(&headers),
        &state.server_deps,
    )
    .await
    {
        Ok(intent) => Json(SignupIntentResponse {
            intent_id: intent.id,
            status: intent.status.as_str().to_string(),
            email_verified: intent.email_verified,
            phone_verified: intent.phone_verified_at.is_some(),
        })
        .into_response(),
        Err(e) => signup_error_response(e),
    }
}

// =============================================================================
// Email verification
// =============================================================================

pub async fn email_resend_handler(
    Extension(state): Extension<AppState>,
    Path(intent_id): Path<Uuid>,
) -> Response {
    match actions::resend_email_verification(intent_id, &state.server_deps).await {
        Ok(()) => Json(json!({ "sent": true })).into_response(),
        Err(e) => signup_error_response(e),
    }
}

pub async fn email_refresh_handler(
    Extension(state): Extension<AppState>,
    Path(intent_id): Path<Uuid>,
) -> Response {
    match actions::refresh_email_verification(intent_id, &state.server_deps).await {
        Ok(intent) => Json(SignupIntentResponse {
            intent_id: intent.id,
            status: intent.status.as_str().to_string(),
            email_verified: intent.email_verified,
            phone_verified: intent.phone_verified_at.is_some(),
        })
        .into_response(),
        Err(e) => signup_error_response(e),
    }
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StartCheckoutRequest {
    pub plan: String,
}

pub async fn start_checkout_handler(
    Extension(state): Extension<AppState>,
    Path(intent_id): Path<Uuid>,
    Json(request): Json<StartCheckoutRequest>,
) -> Response {
    match actions::start_checkout(intent_id, &request.plan, &state.server_deps).await {
        Ok(started) => Json(started).into_response(),
        Err(e) => signup_error_response(e),
    }
}
