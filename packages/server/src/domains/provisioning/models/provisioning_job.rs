use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// ProvisioningJob - projection of tenant-provisioning progress per intent.
///
/// The status query reads this to answer polling clients; the webhook
/// engine writes it. `clinic_id` doubles as the insert-if-absent anchor for
/// the clinic sub-resource on re-driven runs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProvisioningJob {
    pub id: Uuid,
    pub intent_id: Uuid,
    pub checkout_session_id: Option<String>,
    pub status: ProvisioningJobStatus,
    pub clinic_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProvisioningJob {
    /// Insert-or-claim the job row for an intent and mark it processing.
    pub async fn claim_tx(
        intent_id: Uuid,
        checkout_session_id: Option<&str>,
        conn: &mut PgConnection,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO provisioning_jobs (id, intent_id, checkout_session_id, status)
            VALUES ($1, $2, $3, 'processing')
            ON CONFLICT (intent_id) DO UPDATE
            SET status = 'processing',
                checkout_session_id = COALESCE(EXCLUDED.checkout_session_id,
                                               provisioning_jobs.checkout_session_id),
                error_message = NULL,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(intent_id)
        .bind(checkout_session_id)
        .fetch_one(conn)
        .await
    }

    pub async fn complete_tx(
        id: Uuid,
        clinic_id: Uuid,
        conn: &mut PgConnection,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE provisioning_jobs
            SET status = 'completed', clinic_id = $2, error_message = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(clinic_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Record a failed attempt. Runs OUTSIDE the provisioning transaction
    /// (which has rolled back), so the poller can see the failure while the
    /// provider retries.
    pub async fn mark_failed(
        intent_id: Uuid,
        checkout_session_id: Option<&str>,
        error_message: &str,
        pool: &PgPool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO provisioning_jobs (id, intent_id, checkout_session_id, status, error_message)
            VALUES ($1, $2, $3, 'failed', $4)
            ON CONFLICT (intent_id) DO UPDATE
            SET status = 'failed', error_message = EXCLUDED.error_message, updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(intent_id)
        .bind(checkout_session_id)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_intent(
        intent_id: Uuid,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM provisioning_jobs WHERE intent_id = $1")
            .bind(intent_id)
            .fetch_optional(pool)
            .await
    }
}
