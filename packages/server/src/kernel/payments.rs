//! Stripe client for checkout and billing-portal sessions.
//!
//! Thin form-encoded client over reqwest. The signup intent id is attached
//! as `client_reference_id` and metadata so the webhook engine can resolve
//! the intent when the checkout completes. Webhook *consumption* lives in
//! `domains::provisioning`; this module only opens sessions.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::traits::{BasePaymentProvider, CheckoutSession, PortalSession};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeClient {
    secret_key: String,
    success_url: String,
    cancel_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct PortalResponse {
    url: String,
}

impl StripeClient {
    pub fn new(secret_key: String, success_url: String, cancel_url: String) -> Self {
        Self {
            secret_key,
            success_url,
            cancel_url,
            client: Client::new(),
        }
    }

    async fn post_form(&self, path: &str, form: &[(String, String)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", STRIPE_API_BASE, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Stripe returned {}: {}", status, body));
        }
        Ok(response)
    }
}

#[async_trait]
impl BasePaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        intent_id: &str,
        customer_email: &str,
        plan: &str,
    ) -> Result<CheckoutSession> {
        // `plan` is the provider price id for the chosen plan; the webhook
        // reads the same id back off the subscription payload.
        let form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), plan.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("customer_email".to_string(), customer_email.to_string()),
            ("client_reference_id".to_string(), intent_id.to_string()),
            (
                "metadata[signup_intent_id]".to_string(),
                intent_id.to_string(),
            ),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        let session: SessionResponse = self
            .post_form("/checkout/sessions", &form)
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("failed to parse Stripe session response: {}", e))?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn create_billing_portal_session(&self, customer_id: &str) -> Result<PortalSession> {
        let form = vec![("customer".to_string(), customer_id.to_string())];

        let portal: PortalResponse = self
            .post_form("/billing_portal/sessions", &form)
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("failed to parse Stripe portal response: {}", e))?;

        Ok(PortalSession { url: portal.url })
    }
}
