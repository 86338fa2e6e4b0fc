//! Payment-provider webhook event types.
//!
//! Typed envelope over the provider's JSON payload. Extraction into the
//! object types we act on is explicit and fallible; unknown event types
//! deserialize fine and are acknowledged without action.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::ProvisioningError;

/// Event types the provisioning engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventType {
    CheckoutCompleted,
    CheckoutExpired,
    CheckoutPaymentFailed,
    SubscriptionUpdated,
    SubscriptionDeleted,
    Unknown,
}

impl FromStr for PaymentEventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "checkout.session.expired" => Self::CheckoutExpired,
            "checkout.session.async_payment_failed" => Self::CheckoutPaymentFailed,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            _ => Self::Unknown,
        })
    }
}

/// Provider event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Unique event id; the idempotency key for provisioning.
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp of event creation at the provider.
    #[serde(default)]
    pub created: i64,

    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// The event object (checkout session, subscription, ...).
    pub object: serde_json::Value,
}

impl PaymentEvent {
    /// Parse from the raw webhook body.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProvisioningError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ProvisioningError::InvalidPayload(e.to_string()))
    }

    pub fn typed_event_type(&self) -> PaymentEventType {
        // Infallible error type means this can never fail
        PaymentEventType::from_str(&self.event_type).unwrap_or(PaymentEventType::Unknown)
    }

    /// Extract the checkout-session object from a checkout.* event.
    pub fn as_checkout_session(&self) -> Result<CheckoutSessionObject, ProvisioningError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| ProvisioningError::InvalidPayload(e.to_string()))
    }

    /// Extract the subscription object from a customer.subscription.* event.
    pub fn as_subscription(&self) -> Result<SubscriptionObject, ProvisioningError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| ProvisioningError::InvalidPayload(e.to_string()))
    }
}

/// Hosted checkout session, as delivered in checkout.session.* events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    /// The signup intent id we attached when opening the session.
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default)]
    pub signup_intent_id: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
}

impl CheckoutSessionObject {
    /// The signup intent id, from the client reference or metadata.
    pub fn intent_reference(&self) -> Option<&str> {
        self.client_reference_id
            .as_deref()
            .or(self.metadata.signup_intent_id.as_deref())
    }
}

/// Subscription object, as delivered in customer.subscription.* events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub items: Option<SubscriptionItems>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub price: PriceRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRef {
    pub id: String,
}

impl SubscriptionObject {
    /// Price id of the first item; the plan identifier we store.
    pub fn plan(&self) -> Option<&str> {
        self.items
            .as_ref()
            .and_then(|items| items.data.first())
            .map(|item| item.price.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_parsing() {
        assert_eq!(
            PaymentEventType::from_str("checkout.session.completed").unwrap(),
            PaymentEventType::CheckoutCompleted
        );
        assert_eq!(
            PaymentEventType::from_str("customer.subscription.deleted").unwrap(),
            PaymentEventType::SubscriptionDeleted
        );
        assert_eq!(
            PaymentEventType::from_str("invoice.finalized").unwrap(),
            PaymentEventType::Unknown
        );
    }

    #[test]
    fn parse_checkout_completed_event() {
        let json = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1714556800,
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "customer": "cus_123",
                    "subscription": "sub_123",
                    "client_reference_id": "7b6a2f9e-51c5-41a0-9f5a-000000000001",
                    "payment_status": "paid",
                    "metadata": {
                        "signup_intent_id": "7b6a2f9e-51c5-41a0-9f5a-000000000001",
                        "plan": "price_clinic_pro"
                    }
                }
            }
        }"#;

        let event = PaymentEvent::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.typed_event_type(), PaymentEventType::CheckoutCompleted);

        let session = event.as_checkout_session().unwrap();
        assert_eq!(session.id, "cs_test_123");
        assert_eq!(
            session.intent_reference(),
            Some("7b6a2f9e-51c5-41a0-9f5a-000000000001")
        );
        assert_eq!(session.metadata.plan.as_deref(), Some("price_clinic_pro"));
    }

    #[test]
    fn parse_subscription_updated_event() {
        let json = r#"{
            "id": "evt_2",
            "type": "customer.subscription.updated",
            "created": 1714556800,
            "data": {
                "object": {
                    "id": "sub_123",
                    "customer": "cus_123",
                    "status": "past_due",
                    "current_period_end": 1717235200,
                    "cancel_at_period_end": true,
                    "items": {
                        "data": [{"price": {"id": "price_clinic_pro"}}]
                    }
                }
            }
        }"#;

        let event = PaymentEvent::from_bytes(json.as_bytes()).unwrap();
        let sub = event.as_subscription().unwrap();
        assert_eq!(sub.id, "sub_123");
        assert_eq!(sub.status, "past_due");
        assert_eq!(sub.plan(), Some("price_clinic_pro"));
        assert!(sub.cancel_at_period_end);
    }

    #[test]
    fn intent_reference_falls_back_to_metadata() {
        let session = CheckoutSessionObject {
            id: "cs_1".to_string(),
            customer: None,
            subscription: None,
            client_reference_id: None,
            payment_status: None,
            metadata: SessionMetadata {
                signup_intent_id: Some("abc".to_string()),
                plan: None,
            },
        };
        assert_eq!(session.intent_reference(), Some("abc"));
    }

    #[test]
    fn missing_event_id_is_rejected() {
        let json = r#"{"type": "checkout.session.completed", "data": {"object": {}}}"#;
        assert!(PaymentEvent::from_bytes(json.as_bytes()).is_err());
    }
}
