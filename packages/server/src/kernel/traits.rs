// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "verify this OTP") lives in domain actions that use
// these traits.
//
// Naming convention: Base* for trait names (e.g., BaseMessagingService)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

// =============================================================================
// Messaging Trait (Infrastructure - SMS/WhatsApp dispatch)
// =============================================================================

#[async_trait]
pub trait BaseMessagingService: Send + Sync {
    /// Deliver a message body to a recipient (E.164 phone number, optionally
    /// "whatsapp:"-prefixed). Failures surface to the caller; they are never
    /// swallowed here.
    async fn send_message(&self, to: &str, body: &str) -> Result<()>;
}

// =============================================================================
// Auth Provider Trait (Infrastructure - external identity service)
// =============================================================================

/// Identity as reported by the external auth provider.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
}

#[async_trait]
pub trait BaseAuthProvider: Send + Sync {
    /// Create an identity for the given credentials. The provider sends the
    /// email confirmation link itself; we only keep the returned id.
    async fn create_user(&self, email: &str, password: &str) -> Result<AuthUser>;

    /// Fetch the current state of an identity (used to refresh the
    /// email-verified flag).
    async fn get_user(&self, user_id: &str) -> Result<AuthUser>;

    /// Ask the provider to re-send the email confirmation link.
    async fn resend_verification(&self, user_id: &str) -> Result<()>;
}

// =============================================================================
// Payment Provider Trait (Infrastructure - checkout and billing portal)
// =============================================================================

/// Hosted checkout session returned by the payment provider.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct PortalSession {
    pub url: String,
}

#[async_trait]
pub trait BasePaymentProvider: Send + Sync {
    /// Create a hosted checkout session for a signup intent. The intent id
    /// rides along as the client reference so the webhook can resolve it.
    async fn create_checkout_session(
        &self,
        intent_id: &str,
        customer_email: &str,
        plan: &str,
    ) -> Result<CheckoutSession>;

    /// Create a billing portal session for an existing customer.
    async fn create_billing_portal_session(&self, customer_id: &str) -> Result<PortalSession>;
}

// =============================================================================
// Rate Limiter Trait (Infrastructure - per-action throttling)
// =============================================================================

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Single-operation rate-limiter capability.
///
/// The shipped backend is in-process (see `kernel::rate_limit`); a
/// multi-instance deployment swaps in a backend over a shared counter store
/// without touching callers.
#[async_trait]
pub trait BaseRateLimiter: Send + Sync {
    /// Count one hit against `key` and decide whether it is allowed within
    /// the current fixed window.
    async fn check_and_consume(&self, key: &str, max: u32, window: Duration)
        -> RateLimitDecision;
}
