use serde::{Deserialize, Serialize};

/// Response from the Messages API.
///
/// Twilio returns many more fields; only the ones callers look at are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub sid: String,
    pub status: String,
    pub to: String,
    pub from: Option<String>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}
