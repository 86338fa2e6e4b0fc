use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

/// AdminProfile - the tenant-admin identity created at provisioning.
///
/// Bound to the auth-provider identity (`user_id`) and the verified signup
/// email. One profile per identity; a retried provisioning run finds the
/// existing row instead of duplicating it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminProfile {
    pub id: Uuid,
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl AdminProfile {
    /// Insert-if-absent keyed by the auth identity.
    pub async fn find_or_create_tx(
        user_id: &str,
        email: &str,
        full_name: &str,
        conn: &mut PgConnection,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO admin_profiles (id, user_id, email, full_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(email)
        .bind(full_name)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, Self>("SELECT * FROM admin_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(conn)
            .await
    }
}
