//! Billing portal endpoint for converted tenants.

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domains::provisioning::models::Subscription;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct BillingPortalRequest {
    pub clinic_id: Uuid,
}

/// Open a billing-portal session for a clinic's payment customer.
pub async fn billing_portal_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<BillingPortalRequest>,
) -> Response {
    let subscription = match Subscription::find_by_clinic(request.clinic_id, &state.db_pool).await
    {
        Ok(Some(subscription)) => subscription,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "No subscription for this clinic." })),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Billing portal lookup failed");
            return internal_error();
        }
    };

    let Some(customer_id) = subscription.external_customer_id else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "No payment customer on record." })),
        )
            .into_response();
    };

    match state
        .server_deps
        .payments
        .create_billing_portal_session(&customer_id)
        .await
    {
        Ok(portal) => Json(json!({ "url": portal.url })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Billing portal session creation failed");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Something went wrong. Please try again." })),
    )
        .into_response()
}
