pub mod document;
pub mod phone;
pub mod signup_intent;

pub use document::{normalize_document, validate_document, DocumentType};
pub use phone::normalize_phone_to_e164;
pub use signup_intent::{SignupIntent, SignupIntentStatus};
