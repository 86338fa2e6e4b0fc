//! Provisioning status polling endpoint.

use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domains::provisioning::actions::{provisioning_status, StatusQuery};
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub intent_id: Option<Uuid>,
    pub session_id: Option<String>,
}

/// Read-only poll: `?intent_id=` or `?session_id=`.
///
/// Before the webhook lands this answers `ready: false`, not an error.
pub async fn signup_status_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<StatusParams>,
) -> Response {
    let query = match (params.intent_id, params.session_id) {
        (Some(intent_id), _) => StatusQuery::IntentId(intent_id),
        (None, Some(session_id)) => StatusQuery::SessionId(session_id),
        (None, None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "intent_id or session_id is required" })),
            )
                .into_response();
        }
    };

    match provisioning_status(query, &state.db_pool).await {
        Ok(Some(status)) => Json(status).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Signup not found." })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Status query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Something went wrong. Please try again." })),
            )
                .into_response()
        }
    }
}
