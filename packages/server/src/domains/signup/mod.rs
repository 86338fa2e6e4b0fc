//! Signup domain - intent creation and the verification state machine.

pub mod actions;
pub mod errors;
pub mod models;
pub mod otp;
pub mod types;

pub use errors::SignupError;
pub use models::{SignupIntent, SignupIntentStatus};
