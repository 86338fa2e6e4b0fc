//! Admin client for the external identity provider (GoTrue-style API).
//!
//! The provider owns passwords, sessions and the email-confirmation link;
//! this core only creates identities at signup and reads back the
//! email-confirmed flag while an intent is pending.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::traits::{AuthUser, BaseAuthProvider};

pub struct AuthAdminClient {
    base_url: String,
    service_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: String,
    #[serde(default)]
    email_confirmed_at: Option<String>,
}

impl UserResponse {
    fn into_auth_user(self) -> AuthUser {
        AuthUser {
            id: self.id,
            email: self.email,
            email_verified: self.email_confirmed_at.is_some(),
        }
    }
}

impl AuthAdminClient {
    pub fn new(base_url: String, service_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl BaseAuthProvider for AuthAdminClient {
    async fn create_user(&self, email: &str, password: &str) -> Result<AuthUser> {
        let response = self
            .client
            .post(format!("{}/admin/users", self.base_url))
            .bearer_auth(&self.service_key)
            .json(&json!({
                "email": email,
                "password": password,
                // The provider sends the confirmation link on creation.
                "email_confirm": false,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("auth provider returned {}: {}", status, body));
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("failed to parse auth provider response: {}", e))?;
        Ok(user.into_auth_user())
    }

    async fn get_user(&self, user_id: &str) -> Result<AuthUser> {
        let response = self
            .client
            .get(format!("{}/admin/users/{}", self.base_url, user_id))
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("auth provider returned {}: {}", status, body));
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("failed to parse auth provider response: {}", e))?;
        Ok(user.into_auth_user())
    }

    async fn resend_verification(&self, user_id: &str) -> Result<()> {
        let response = self
            .client
            .post(format!(
                "{}/admin/users/{}/resend-confirmation",
                self.base_url, user_id
            ))
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("auth provider returned {}: {}", status, body));
        }
        Ok(())
    }
}
