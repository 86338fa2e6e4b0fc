//! Signup domain data types
//!
//! Simple, serializable types returned by signup actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of issuing a phone OTP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSent {
    pub intent_id: Uuid,
    pub expires_at: DateTime<Utc>,
    /// Sends left inside the current send window.
    pub sends_remaining: i32,
}

/// Result of starting checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutStarted {
    pub intent_id: Uuid,
    pub session_id: String,
    pub checkout_url: String,
}
