//! Conversation Module
//!
//! Per-session exchange history with content-aware truncation and idle expiry.

mod session;
mod store;


use std::time::Duration;

pub use session::{
    max_messages_for, ConversationSession, Message, MessageRole, BASE_MAX_MESSAGES,
    TERSE_MAX_MESSAGES, VERBOSE_MAX_MESSAGES,
};
pub use store::{ConversationStats, ConversationStore};

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Idle time after which a session is swept
    pub max_age: Duration,
    /// Upper bound on live sessions
    pub max_sessions: usize,
    /// Sessions kept by an emergency cleanup
    pub emergency_keep: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 3600),
            max_sessions: 1000,
            emergency_keep: 10,
        }
    }
}
