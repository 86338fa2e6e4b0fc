//! Server dependencies for domain actions (using traits for testability)
//!
//! This module provides the central dependency container used by all domain
//! actions. All external services use trait abstractions to enable testing.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use twilio::TwilioService;

use crate::common::crypto::EncryptionKey;
use crate::config::{OtpConfig, RateLimitConfig};
use crate::kernel::{
    BaseAuthProvider, BaseMessagingService, BasePaymentProvider, BaseRateLimiter,
};

// =============================================================================
// TwilioService Adapter (implements BaseMessagingService trait)
// =============================================================================

/// Wrapper around TwilioService that implements BaseMessagingService trait
pub struct TwilioAdapter(pub Arc<TwilioService>);

impl TwilioAdapter {
    pub fn new(service: Arc<TwilioService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseMessagingService for TwilioAdapter {
    async fn send_message(&self, to: &str, body: &str) -> Result<()> {
        self.0
            .send_message(to, body)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to domain actions
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub messaging: Arc<dyn BaseMessagingService>,
    pub auth: Arc<dyn BaseAuthProvider>,
    pub payments: Arc<dyn BasePaymentProvider>,
    pub rate_limiter: Arc<dyn BaseRateLimiter>,
    /// Key for PII field encryption (document number, phone).
    pub encryption_key: EncryptionKey,
    /// Secret for lookup hashes, OTP hashes and captcha tokens.
    pub hmac_secret: Vec<u8>,
    pub otp: OtpConfig,
    pub limits: RateLimitConfig,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: PgPool,
        messaging: Arc<dyn BaseMessagingService>,
        auth: Arc<dyn BaseAuthProvider>,
        payments: Arc<dyn BasePaymentProvider>,
        rate_limiter: Arc<dyn BaseRateLimiter>,
        encryption_key: EncryptionKey,
        hmac_secret: Vec<u8>,
        otp: OtpConfig,
        limits: RateLimitConfig,
    ) -> Self {
        Self {
            db_pool,
            messaging,
            auth,
            payments,
            rate_limiter,
            encryption_key,
            hmac_secret,
            otp,
            limits,
        }
    }
}
