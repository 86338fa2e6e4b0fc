//! Payment-provider webhook endpoint.
//!
//! Signature verification happens here, on the raw body, BEFORE the event
//! reaches the provisioning engine. The engine may therefore assume every
//! event it sees is authentic.
//!
//! Response contract: 2xx acknowledges (including duplicates and event
//! types we ignore); any processing failure answers 5xx so the provider
//! redelivers.

use axum::body::Bytes;
use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::domains::provisioning::actions::process_payment_event;
use crate::domains::provisioning::events::PaymentEvent;
use crate::server::app::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Clock skew / delivery delay tolerance for the signed timestamp.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

pub async fn payment_webhook_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !verify_signature(
        &body,
        signature,
        state.stripe_webhook_secret.as_bytes(),
        Utc::now(),
    ) {
        warn!("Webhook rejected: bad or missing signature");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid signature" })),
        )
            .into_response();
    }

    let event = match PaymentEvent::from_bytes(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Webhook rejected: malformed payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "malformed payload" })),
            )
                .into_response();
        }
    };

    match process_payment_event(&event, &state.server_deps).await {
        Ok(_) => Json(json!({ "received": true })).into_response(),
        // Detail is already logged by the engine with event context.
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "processing failed" })),
        )
            .into_response(),
    }
}

/// Verify a `t=...,v1=...` signature header: HMAC-SHA256 over
/// `"{t}.{body}"`, constant-time comparison, bounded timestamp age.
fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let (Some(timestamp), false) = (timestamp, candidates.is_empty()) else {
        return false;
    };

    if (now.timestamp() - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        return false;
    }

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    candidates.iter().any(|candidate| {
        candidate.len() == expected.len()
            && bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test";

    fn sign(payload: &[u8], timestamp: i64, secret: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_is_accepted() {
        let now = Utc::now();
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, now.timestamp(), SECRET);
        assert!(verify_signature(payload, &header, SECRET, now));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, now.timestamp(), b"other_secret");
        assert!(!verify_signature(payload, &header, SECRET, now));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let now = Utc::now();
        let header = sign(br#"{"id":"evt_1"}"#, now.timestamp(), SECRET);
        assert!(!verify_signature(
            br#"{"id":"evt_2"}"#,
            &header,
            SECRET,
            now
        ));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let now = Utc::now();
        let payload = br#"{"id":"evt_1"}"#;
        let stale = now.timestamp() - TIMESTAMP_TOLERANCE_SECS - 1;
        let header = sign(payload, stale, SECRET);
        assert!(!verify_signature(payload, &header, SECRET, now));
    }

    #[test]
    fn missing_or_garbage_header_is_rejected() {
        let now = Utc::now();
        let payload = br#"{"id":"evt_1"}"#;
        assert!(!verify_signature(payload, "", SECRET, now));
        assert!(!verify_signature(payload, "t=notanumber,v1=abc", SECRET, now));
        assert!(!verify_signature(payload, "v1=deadbeef", SECRET, now));
        assert!(!verify_signature(
            payload,
            &format!("t={}", now.timestamp()),
            SECRET,
            now
        ));
    }
}
