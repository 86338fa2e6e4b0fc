use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::warn;
use uuid::Uuid;

/// Subscription status, mirroring the payment provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
}

impl SubscriptionStatus {
    /// Map the provider's status string. Unknown strings default to
    /// Incomplete rather than granting access.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "incomplete" | "incomplete_expired" => Self::Incomplete,
            unknown => {
                warn!(%unknown, "Unknown subscription status, defaulting to incomplete");
                Self::Incomplete
            }
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

/// Subscription - one per clinic, tracking the provider-side subscription.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub external_subscription_id: Option<String>,
    pub external_customer_id: Option<String>,
    /// Provider price id of the purchased plan.
    pub plan: String,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Insert-if-absent on the clinic (one subscription per tenant).
    #[allow(clippy::too_many_arguments)]
    pub async fn find_or_create_tx(
        clinic_id: Uuid,
        external_subscription_id: Option<&str>,
        external_customer_id: Option<&str>,
        plan: &str,
        status: SubscriptionStatus,
        current_period_end: Option<DateTime<Utc>>,
        conn: &mut PgConnection,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, clinic_id, external_subscription_id, external_customer_id,
                plan, status, current_period_end
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(external_subscription_id)
        .bind(external_customer_id)
        .bind(plan)
        .bind(status)
        .bind(current_period_end)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, Self>("SELECT * FROM subscriptions WHERE clinic_id = $1")
            .bind(clinic_id)
            .fetch_one(conn)
            .await
    }

    /// Update status/period fields by the provider's subscription id.
    /// Returns None when no subscription carries that id.
    pub async fn update_by_external_id(
        external_subscription_id: &str,
        status: SubscriptionStatus,
        current_period_end: Option<DateTime<Utc>>,
        cancel_at_period_end: bool,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE subscriptions
            SET status = $2,
                current_period_end = COALESCE($3, current_period_end),
                cancel_at_period_end = $4,
                updated_at = NOW()
            WHERE external_subscription_id = $1
            RETURNING *
            "#,
        )
        .bind(external_subscription_id)
        .bind(status)
        .bind(current_period_end)
        .bind(cancel_at_period_end)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_by_clinic(
        clinic_id: Uuid,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM subscriptions WHERE clinic_id = $1")
            .bind(clinic_id)
            .fetch_optional(pool)
            .await
    }
}
