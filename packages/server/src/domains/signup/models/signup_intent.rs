use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::document::DocumentType;

/// Signup intent lifecycle.
///
/// Status only moves forward; `Blocked` and `Expired` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SignupIntentStatus {
    Pending,
    PendingVerifications,
    Verified,
    CheckoutStarted,
    Converted,
    Blocked,
    Expired,
}

impl SignupIntentStatus {
    /// Terminal states take no further transitions and do not count toward
    /// duplicate detection.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converted | Self::Blocked | Self::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingVerifications => "pending_verifications",
            Self::Verified => "verified",
            Self::CheckoutStarted => "checkout_started",
            Self::Converted => "converted",
            Self::Blocked => "blocked",
            Self::Expired => "expired",
        }
    }
}

/// SignupIntent - one prospective tenant signup attempt.
///
/// Privacy: document number and phone are stored encrypted, with keyed
/// hashes (`document_hash`, `phone_hash`) alongside for exact-match
/// duplicate detection without decryption. The OTP itself is never stored,
/// only its keyed hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignupIntent {
    pub id: Uuid,
    pub clinic_name: String,
    pub admin_name: String,
    pub email: String,
    pub email_verified: bool,

    pub document_type: DocumentType,
    pub document_encrypted: String,
    pub document_hash: String,
    pub phone_encrypted: String,
    pub phone_hash: String,

    pub phone_verified_at: Option<DateTime<Utc>>,
    pub document_validated_at: Option<DateTime<Utc>>,

    // OTP sub-state; hash of the current code, never the code.
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub otp_attempts: i32,
    pub otp_locked_until: Option<DateTime<Utc>>,
    pub otp_lockout_strikes: i32,
    pub otp_send_count: i32,
    pub otp_send_window_start: Option<DateTime<Utc>>,

    pub status: SignupIntentStatus,
    pub checkout_session_id: Option<String>,
    pub user_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl SignupIntent {
    /// Insert a new intent.
    ///
    /// Partial unique indexes on email/document_hash/phone_hash (filtered to
    /// non-terminal statuses) make this an atomic insert-or-reject; callers
    /// map a unique violation to a duplicate-signup error.
    pub async fn insert(&self, pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO signup_intents (
                id, clinic_name, admin_name, email, email_verified,
                document_type, document_encrypted, document_hash,
                phone_encrypted, phone_hash,
                phone_verified_at, document_validated_at,
                otp_attempts, otp_lockout_strikes, otp_send_count,
                status, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.clinic_name)
        .bind(&self.admin_name)
        .bind(&self.email)
        .bind(self.email_verified)
        .bind(self.document_type)
        .bind(&self.document_encrypted)
        .bind(&self.document_hash)
        .bind(&self.phone_encrypted)
        .bind(&self.phone_hash)
        .bind(self.phone_verified_at)
        .bind(self.document_validated_at)
        .bind(self.otp_attempts)
        .bind(self.otp_lockout_strikes)
        .bind(self.otp_send_count)
        .bind(self.status)
        .bind(&self.user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM signup_intents WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_checkout_session(
        session_id: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM signup_intents WHERE checkout_session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await
    }

    /// Service-layer duplicate check: is there a live intent for any of the
    /// identifying values? The partial unique indexes close the race this
    /// check leaves open.
    pub async fn active_exists(
        email: &str,
        document_hash: &str,
        phone_hash: &str,
        pool: &PgPool,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM signup_intents
                WHERE (email = $1 OR document_hash = $2 OR phone_hash = $3)
                  AND status NOT IN ('converted', 'blocked', 'expired')
            )
            "#,
        )
        .bind(email)
        .bind(document_hash)
        .bind(phone_hash)
        .fetch_one(pool)
        .await
    }

    /// Store a freshly issued OTP hash with its expiry and the updated
    /// send-window counters.
    pub async fn store_otp(
        id: Uuid,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
        send_count: i32,
        send_window_start: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE signup_intents
            SET otp_hash = $2,
                otp_expires_at = $3,
                otp_attempts = 0,
                otp_locked_until = NULL,
                otp_send_count = $4,
                otp_send_window_start = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(otp_hash)
        .bind(expires_at)
        .bind(send_count)
        .bind(send_window_start)
        .fetch_one(pool)
        .await
    }

    /// Persist the outcome of a failed verification attempt.
    pub async fn record_otp_failure(
        id: Uuid,
        attempts: i32,
        locked_until: Option<DateTime<Utc>>,
        lockout_strikes: i32,
        pool: &PgPool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE signup_intents
            SET otp_attempts = $2,
                otp_locked_until = $3,
                otp_lockout_strikes = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts)
        .bind(locked_until)
        .bind(lockout_strikes)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Successful phone verification: stamp it and clear the OTP sub-state
    /// so the code cannot be replayed.
    pub async fn mark_phone_verified(
        id: Uuid,
        verified_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE signup_intents
            SET phone_verified_at = $2,
                otp_hash = NULL,
                otp_expires_at = NULL,
                otp_attempts = 0,
                otp_locked_until = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(verified_at)
        .fetch_one(pool)
        .await
    }

    pub async fn mark_email_verified(id: Uuid, pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE signup_intents
            SET email_verified = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// Guarded status transition; returns the updated row only when the
    /// intent was still in `from`. Concurrent writers lose cleanly.
    pub async fn advance_status(
        id: Uuid,
        from: SignupIntentStatus,
        to: SignupIntentStatus,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE signup_intents
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(pool)
        .await
    }

    /// Unconditional status write, for absorbing transitions (blocked).
    pub async fn set_status(
        id: Uuid,
        status: SignupIntentStatus,
        pool: &PgPool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE signup_intents SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Store the checkout session and advance to checkout_started in one
    /// guarded write.
    pub async fn start_checkout(
        id: Uuid,
        session_id: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE signup_intents
            SET checkout_session_id = $2,
                status = 'checkout_started',
                updated_at = NOW()
            WHERE id = $1 AND status = 'verified'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(session_id)
        .fetch_optional(pool)
        .await
    }

    /// Mark the intent converted inside the provisioning transaction.
    /// Guarded so absorbing states stay absorbing; `verified` is accepted
    /// for the case where a failure event reverted the intent before the
    /// success event arrived.
    pub async fn mark_converted_tx(
        id: Uuid,
        conn: &mut sqlx::PgConnection,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE signup_intents
            SET status = 'converted', updated_at = NOW()
            WHERE id = $1 AND status IN ('checkout_started', 'verified', 'converted')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Failed or expired checkout: return the intent to `verified` so the
    /// user can start over.
    pub async fn revert_checkout_tx(
        id: Uuid,
        conn: &mut sqlx::PgConnection,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE signup_intents
            SET status = 'verified', updated_at = NOW()
            WHERE id = $1 AND status = 'checkout_started'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// True once every verification the VERIFIED state requires has landed.
    pub fn verifications_complete(&self) -> bool {
        self.email_verified
            && self.phone_verified_at.is_some()
            && self.document_validated_at.is_some()
    }
}
