//! Request DTOs for the gateway API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::inference::Role;
use crate::scheduler::Priority;
use crate::serving::ChatRequest;

/// Longest question accepted, in characters.
pub const MAX_QUESTION_CHARS: usize = 8000;

/// Request body for `POST /api/chat` and `POST /api/query`
///
/// # Fields
/// - `question`: The user's message
/// - `sessionId`: Conversation to read history from and append to
/// - `role`: `student` or `teacher`; anything else is treated as `student`
/// - `subject`: Subject label shown to the model
/// - `auxKey`: Key of auxiliary context to include (`chatSubject` accepted too)
/// - `priority`: `low`, `normal`, `high` or `critical`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, alias = "chatSubject")]
    pub aux_key: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl ChatRequestBody {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.question.trim().is_empty() {
            return Some("No question provided".to_string());
        }
        if self.question.chars().count() > MAX_QUESTION_CHARS {
            return Some(format!(
                "Question exceeds maximum length of {} characters",
                MAX_QUESTION_CHARS
            ));
        }
        None
    }

    /// Converts into a facade request. `fallback_role` applies when the body
    /// names no role.
    pub fn into_chat_request(self, fallback_role: Option<&str>) -> ChatRequest {
        let role = self
            .role
            .as_deref()
            .or(fallback_role)
            .map(Role::parse_lenient)
            .unwrap_or_default();

        ChatRequest {
            question: self.question,
            session_id: self.session_id.filter(|id| !id.is_empty()),
            role,
            subject: self.subject.filter(|s| !s.is_empty()),
            aux_key: self.aux_key.filter(|k| !k.is_empty()),
            priority: self.priority.unwrap_or_default(),
        }
    }
}
