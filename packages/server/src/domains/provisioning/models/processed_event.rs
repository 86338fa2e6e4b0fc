use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

/// ProcessedEvent - idempotency guard for webhook deliveries.
///
/// Append-only: one row per handled provider event id, never updated. The
/// INSERT is the serialization point between concurrent deliveries of the
/// same event; it relies on the primary key, not an in-memory check, since
/// deliveries may land on independent processes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessedEvent {
    pub id: String,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
}

impl ProcessedEvent {
    /// Insert inside the provisioning transaction. Returns false when the
    /// id already exists (duplicate delivery); a concurrent uncommitted
    /// insert of the same id blocks here until the winner commits.
    ///
    /// Because this runs in the same transaction as the provisioning work,
    /// a failed attempt rolls the row back and the provider's redelivery
    /// re-drives everything.
    pub async fn insert_tx(
        id: &str,
        event_type: &str,
        conn: &mut PgConnection,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(event_type)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn exists(id: &str, pool: &PgPool) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM processed_events WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }
}
