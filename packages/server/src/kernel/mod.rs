//! Kernel module - server infrastructure and dependencies.

pub mod auth_client;
pub mod deps;
pub mod payments;
pub mod rate_limit;
pub mod test_dependencies;
pub mod traits;

pub use auth_client::AuthAdminClient;
pub use deps::{ServerDeps, TwilioAdapter};
pub use payments::StripeClient;
pub use rate_limit::FixedWindowRateLimiter;
pub use test_dependencies::{MockAuthProvider, MockMessagingService, MockPaymentProvider};
pub use traits::*;
