// Mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::traits::{
    AuthUser, BaseAuthProvider, BaseMessagingService, BasePaymentProvider, CheckoutSession,
    PortalSession,
};

// =============================================================================
// Mock Messaging Service
// =============================================================================

/// Records every message instead of dispatching it.
pub struct MockMessagingService {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail_next: AtomicBool,
}

impl MockMessagingService {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_next: AtomicBool::new(false),
        }
    }

    /// All `(to, body)` pairs sent so far.
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// The code from the last OTP message, for walking the verify flow.
    /// Picks the first digit run long enough to be a code, ignoring other
    /// numbers in the body (e.g. the expiry).
    pub fn last_otp(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, body) = sent.last()?;
        body.split(|c: char| !c.is_ascii_digit())
            .find(|run| run.len() >= 4)
            .map(|run| run.to_string())
    }

    /// Make the next send fail, to exercise error propagation.
    pub fn fail_next_send(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Default for MockMessagingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseMessagingService for MockMessagingService {
    async fn send_message(&self, to: &str, body: &str) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("simulated messaging failure");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

// =============================================================================
// Mock Auth Provider
// =============================================================================

/// In-memory identity store with a controllable email-verified flag.
pub struct MockAuthProvider {
    users: Mutex<Vec<AuthUser>>,
    resend_calls: Mutex<Vec<String>>,
}

impl MockAuthProvider {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            resend_calls: Mutex::new(Vec::new()),
        }
    }

    /// Flip the verified flag, as if the user clicked the email link.
    pub fn mark_verified(&self, user_id: &str) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.email_verified = true;
        }
    }

    pub fn resend_calls(&self) -> Vec<String> {
        self.resend_calls.lock().unwrap().clone()
    }
}

impl Default for MockAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAuthProvider for MockAuthProvider {
    async fn create_user(&self, email: &str, _password: &str) -> Result<AuthUser> {
        let user = AuthUser {
            id: format!("user_{}", uuid::Uuid::new_v4().simple()),
            email: email.to_string(),
            email_verified: false,
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<AuthUser> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown user {}", user_id))
    }

    async fn resend_verification(&self, user_id: &str) -> Result<()> {
        self.resend_calls.lock().unwrap().push(user_id.to_string());
        Ok(())
    }
}

// =============================================================================
// Mock Payment Provider
// =============================================================================

/// Hands out deterministic session ids and records the requests.
pub struct MockPaymentProvider {
    checkout_calls: Mutex<Vec<(String, String, String)>>,
    portal_calls: Mutex<Vec<String>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self {
            checkout_calls: Mutex::new(Vec::new()),
            portal_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn checkout_calls(&self) -> Vec<(String, String, String)> {
        self.checkout_calls.lock().unwrap().clone()
    }

    pub fn portal_calls(&self) -> Vec<String> {
        self.portal_calls.lock().unwrap().clone()
    }
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasePaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        intent_id: &str,
        customer_email: &str,
        plan: &str,
    ) -> Result<CheckoutSession> {
        self.checkout_calls.lock().unwrap().push((
            intent_id.to_string(),
            customer_email.to_string(),
            plan.to_string(),
        ));
        Ok(CheckoutSession {
            id: format!("cs_test_{}", intent_id.replace('-', "")),
            url: "https://checkout.test/session".to_string(),
        })
    }

    async fn create_billing_portal_session(&self, customer_id: &str) -> Result<PortalSession> {
        self.portal_calls.lock().unwrap().push(customer_id.to_string());
        Ok(PortalSession {
            url: "https://billing.test/portal".to_string(),
        })
    }
}
