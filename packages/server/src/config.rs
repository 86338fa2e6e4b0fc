use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::common::crypto::EncryptionKey;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,

    /// 32-byte field-encryption key, base64-encoded in the environment.
    pub encryption_key: EncryptionKey,
    /// Secret for HMAC lookup hashes, OTP hashes and captcha tokens.
    pub hmac_secret: String,

    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_from: String,

    pub auth_base_url: String,
    pub auth_service_key: String,

    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,

    pub otp: OtpConfig,
    pub limits: RateLimitConfig,
}

/// OTP issuance and verification tuning
#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub length: usize,
    pub ttl_minutes: i64,
    pub max_attempts: i32,
    pub lockout_minutes: i64,
    /// Sends allowed per intent inside the send window, independent of the
    /// generic rate limiter (bounds SMS spend even if that is bypassed).
    pub max_sends_per_window: i32,
    pub send_window_minutes: i64,
    /// Lockouts tolerated before the intent is blocked as abusive.
    pub max_lockout_strikes: i32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: 6,
            ttl_minutes: 5,
            max_attempts: 5,
            lockout_minutes: 15,
            max_sends_per_window: 3,
            send_window_minutes: 10,
            max_lockout_strikes: 3,
        }
    }
}

/// Per-action fixed-window rate limit thresholds, keyed by client IP
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub signup_max: u32,
    pub signup_window_secs: u64,
    pub otp_send_max: u32,
    pub otp_send_window_secs: u64,
    pub otp_verify_max: u32,
    pub otp_verify_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            signup_max: 5,
            signup_window_secs: 3600,
            otp_send_max: 5,
            otp_send_window_secs: 600,
            otp_verify_max: 10,
            otp_verify_window_secs: 600,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let encryption_key = EncryptionKey::from_base64(
            &env::var("FIELD_ENCRYPTION_KEY").context("FIELD_ENCRYPTION_KEY must be set")?,
        )
        .context("FIELD_ENCRYPTION_KEY must be 32 bytes, base64-encoded")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            encryption_key,
            hmac_secret: env::var("HMAC_SECRET").context("HMAC_SECRET must be set")?,
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID")
                .context("TWILIO_ACCOUNT_SID must be set")?,
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN")
                .context("TWILIO_AUTH_TOKEN must be set")?,
            twilio_from: env::var("TWILIO_FROM").context("TWILIO_FROM must be set")?,
            auth_base_url: env::var("AUTH_BASE_URL").context("AUTH_BASE_URL must be set")?,
            auth_service_key: env::var("AUTH_SERVICE_KEY")
                .context("AUTH_SERVICE_KEY must be set")?,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .context("STRIPE_SECRET_KEY must be set")?,
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .context("STRIPE_WEBHOOK_SECRET must be set")?,
            checkout_success_url: env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "https://app.vitalis.health/signup/complete".to_string()),
            checkout_cancel_url: env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "https://app.vitalis.health/signup/plans".to_string()),
            otp: OtpConfig {
                length: env_parse("OTP_LENGTH", 6)?,
                ttl_minutes: env_parse("OTP_TTL_MINUTES", 5)?,
                max_attempts: env_parse("OTP_MAX_ATTEMPTS", 5)?,
                lockout_minutes: env_parse("OTP_LOCKOUT_MINUTES", 15)?,
                max_sends_per_window: env_parse("OTP_MAX_SENDS_PER_WINDOW", 3)?,
                send_window_minutes: env_parse("OTP_SEND_WINDOW_MINUTES", 10)?,
                max_lockout_strikes: env_parse("OTP_MAX_LOCKOUT_STRIKES", 3)?,
            },
            limits: RateLimitConfig::default(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}
