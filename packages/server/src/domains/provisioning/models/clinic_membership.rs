use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

/// ClinicMembership - links a profile to a clinic with a role.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClinicMembership {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub profile_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl ClinicMembership {
    /// Insert-if-absent on the (clinic, profile) pair.
    pub async fn find_or_create_tx(
        clinic_id: Uuid,
        profile_id: Uuid,
        role: &str,
        conn: &mut PgConnection,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO clinic_memberships (id, clinic_id, profile_id, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (clinic_id, profile_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(profile_id)
        .bind(role)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, Self>(
            "SELECT * FROM clinic_memberships WHERE clinic_id = $1 AND profile_id = $2",
        )
        .bind(clinic_id)
        .bind(profile_id)
        .fetch_one(conn)
        .await
    }
}
