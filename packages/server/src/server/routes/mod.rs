pub mod billing;
pub mod health;
pub mod signup;
pub mod status;
pub mod webhooks;

pub use billing::billing_portal_handler;
pub use health::health_handler;
pub use signup::{
    captcha_handler, create_signup_handler, email_refresh_handler, email_resend_handler,
    otp_send_handler, otp_verify_handler, start_checkout_handler,
};
pub use status::signup_status_handler;
pub use webhooks::payment_webhook_handler;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::domains::signup::SignupError;

/// Map a signup-domain error to an HTTP response.
///
/// Client-recoverable failures carry a machine-readable `code` so the UI
/// can render distinct flows; everything internal collapses to a generic
/// message (details stay in the logs).
pub(crate) fn signup_error_response(err: SignupError) -> Response {
    let (status, code, message) = match &err {
        SignupError::Validation(message) => {
            (StatusCode::BAD_REQUEST, "validation_failed", message.clone())
        }
        SignupError::CaptchaFailed => (
            StatusCode::BAD_REQUEST,
            "captcha_failed",
            "Captcha verification failed.".to_string(),
        ),
        SignupError::DuplicateSignup => (
            StatusCode::CONFLICT,
            "duplicate_signup",
            "A signup is already in progress for this account.".to_string(),
        ),
        SignupError::RateLimited { reset_at } => {
            let body = Json(json!({
                "code": "rate_limited",
                "error": "Too many requests. Please try again later.",
                "reset_at": reset_at,
            }));
            return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        }
        SignupError::NotFound => (
            StatusCode::NOT_FOUND,
            "not_found",
            "Signup not found.".to_string(),
        ),
        SignupError::InvalidStatus { .. } => (
            StatusCode::CONFLICT,
            "invalid_status",
            "This step is not available right now.".to_string(),
        ),
        SignupError::OtpExpired => (
            StatusCode::BAD_REQUEST,
            "otp_expired",
            "The verification code has expired. Request a new one.".to_string(),
        ),
        SignupError::OtpInvalid { attempts_remaining } => {
            let body = Json(json!({
                "code": "otp_invalid",
                "error": "The verification code is incorrect.",
                "attempts_remaining": attempts_remaining,
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }
        SignupError::OtpLocked { locked_until } => {
            let body = Json(json!({
                "code": "otp_locked",
                "error": "Too many incorrect codes. Try again later.",
                "locked_until": locked_until,
            }));
            return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        }
        SignupError::Blocked => (
            StatusCode::FORBIDDEN,
            "blocked",
            "This signup can no longer proceed.".to_string(),
        ),
        // Internal failure classes: log with detail, answer generically.
        SignupError::Crypto(_) | SignupError::Database(_) | SignupError::Internal(_) => {
            tracing::error!(error = %err, "Internal error handling signup request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Something went wrong. Please try again.".to_string(),
            )
        }
    };

    (status, Json(json!({ "code": code, "error": message }))).into_response()
}
