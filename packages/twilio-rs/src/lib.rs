// Minimal Twilio Messages API client.
//
// The platform generates and hashes its own verification codes, so this
// client only needs to deliver message bodies. Recipients prefixed with
// "whatsapp:" go out over WhatsApp, everything else as SMS.

use reqwest::Client;
use std::collections::HashMap;

pub mod models;

use crate::models::MessageResponse;

#[derive(Debug, thiserror::Error)]
pub enum TwilioError {
    #[error("request to Twilio failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Twilio returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse Twilio response: {0}")]
    Parse(String),
}

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender: an E.164 number or a Messaging Service SID.
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
    client: Client,
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    /// Send a message body to a recipient.
    ///
    /// `to` is an E.164 phone number, optionally prefixed with "whatsapp:".
    /// The sender channel must match the recipient channel, so a WhatsApp
    /// recipient gets the same prefix applied to the configured sender.
    pub async fn send_message(&self, to: &str, body: &str) -> Result<MessageResponse, TwilioError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.options.account_sid
        );

        let from = if to.starts_with("whatsapp:") && !self.options.from.starts_with("whatsapp:") {
            format!("whatsapp:{}", self.options.from)
        } else {
            self.options.from.clone()
        };

        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("To", to);
        form_body.insert("From", &from);
        form_body.insert("Body", body);

        let response = self
            .client
            .post(url)
            .basic_auth(
                &self.options.account_sid,
                Some(&self.options.auth_token),
            )
            .form(&form_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TwilioError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<MessageResponse>()
            .await
            .map_err(|e| TwilioError::Parse(e.to_string()))
    }
}
