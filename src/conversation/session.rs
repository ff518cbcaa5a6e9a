//! Conversation Session
//!
//! Per-session exchange history and the truncation rule applied to it.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Base number of messages kept per session.
pub const BASE_MAX_MESSAGES: usize = 20;
/// Limit for verbose conversations (average above [`VERBOSE_AVG_CHARS`]).
pub const VERBOSE_MAX_MESSAGES: usize = 12;
/// Limit for terse conversations (average below [`TERSE_AVG_CHARS`]).
pub const TERSE_MAX_MESSAGES: usize = 30;
pub const VERBOSE_AVG_CHARS: f64 = 500.0;
pub const TERSE_AVG_CHARS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One side of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Message cap for a conversation whose messages average `avg_chars` chars.
pub fn max_messages_for(avg_chars: f64) -> usize {
    if avg_chars > VERBOSE_AVG_CHARS {
        VERBOSE_MAX_MESSAGES
    } else if avg_chars < TERSE_AVG_CHARS {
        TERSE_MAX_MESSAGES
    } else {
        BASE_MAX_MESSAGES
    }
}

// == Conversation Session ==
/// History of one session: user/assistant messages strictly alternating,
/// always an even count.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub session_id: String,
    messages: Vec<Message>,
    total_chars: usize,
    pub created_at: Instant,
    pub last_access_at: Instant,
}

impl ConversationSession {
    pub fn new(session_id: impl Into<String>, now: Instant) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            total_chars: 0,
            created_at: now,
            last_access_at: now,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    /// Average chars per stored message, 0 for an empty session.
    pub fn average_chars(&self) -> f64 {
        if self.messages.is_empty() {
            0.0
        } else {
            self.total_chars as f64 / self.messages.len() as f64
        }
    }

    /// Current cap given this session's verbosity.
    pub fn max_messages(&self) -> usize {
        max_messages_for(self.average_chars())
    }

    /// Appends a user/assistant pair, then truncates. Returns messages dropped.
    pub fn push_exchange(&mut self, user_text: &str, assistant_text: &str, now: Instant) -> usize {
        let timestamp = Utc::now();
        self.messages.push(Message {
            role: MessageRole::User,
            content: user_text.to_string(),
            timestamp,
        });
        self.messages.push(Message {
            role: MessageRole::Assistant,
            content: assistant_text.to_string(),
            timestamp,
        });
        self.total_chars += user_text.chars().count() + assistant_text.chars().count();
        self.last_access_at = now;

        let dropped = self.truncate();
        self.check_invariants();
        dropped
    }

    /// Drops whole exchanges from the front once over the cap, keeping
    /// `max - 2` messages. Every cap is even so the cut is pair-aligned.
    ///
    /// A cut can move the average into a stricter bucket, so it repeats
    /// until the history fits the cap of what remains.
    fn truncate(&mut self) -> usize {
        let mut dropped = 0;
        loop {
            let max_messages = self.max_messages();
            if self.messages.len() <= max_messages {
                return dropped;
            }

            let keep = max_messages.saturating_sub(2);
            let drop = self.messages.len() - keep;
            self.messages.drain(..drop);
            self.total_chars = self
                .messages
                .iter()
                .map(|m| m.content.chars().count())
                .sum();
            dropped += drop;
        }
    }

    fn check_invariants(&self) {
        debug_assert!(self.messages.len() % 2 == 0, "unpaired message in history");
        debug_assert!(self
            .messages
            .chunks(2)
            .all(|pair| pair[0].role == MessageRole::User && pair[1].role == MessageRole::Assistant));
    }
}
