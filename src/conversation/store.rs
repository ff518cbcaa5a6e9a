//! Conversation Store
//!
//! Sessions keyed by id behind one mutex, with idle expiry, a session cap and
//! an emergency trim for critical memory pressure.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::conversation::{ConversationConfig, ConversationSession, Message};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationStats {
    pub active_sessions: usize,
    pub total_messages: usize,
}

// == Conversation Store ==
#[derive(Debug)]
pub struct ConversationStore {
    sessions: Mutex<HashMap<String, ConversationSession>>,
    config: ConversationConfig,
}

impl ConversationStore {
    pub fn new(config: ConversationConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    // == Get History ==
    /// Returns a copy of the session's messages, oldest first.
    ///
    /// Reading counts as activity. Unknown sessions yield an empty history
    /// and are not created.
    pub fn get_history(&self, session_id: &str) -> Vec<Message> {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.last_access_at = Instant::now();
                session.messages().to_vec()
            }
            None => Vec::new(),
        }
    }

    /// The last `exchanges` user/assistant pairs of a session.
    pub fn recent_exchanges(&self, session_id: &str, exchanges: usize) -> Vec<Message> {
        let mut history = self.get_history(session_id);
        let keep = exchanges.saturating_mul(2);
        if history.len() > keep {
            history.drain(..history.len() - keep);
        }
        history
    }

    // == Add Exchange ==
    /// Appends one exchange, creating the session if needed, then truncates it.
    pub fn add_exchange(&self, session_id: &str, user_text: &str, assistant_text: &str) {
        self.add_exchange_at(session_id, user_text, assistant_text, Instant::now());
    }

    pub(crate) fn add_exchange_at(
        &self,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
        now: Instant,
    ) {
        let mut sessions = self.sessions.lock();

        if !sessions.contains_key(session_id) {
            self.make_room(&mut sessions);
            sessions.insert(
                session_id.to_string(),
                ConversationSession::new(session_id, now),
            );
        }

        if let Some(session) = sessions.get_mut(session_id) {
            let dropped = session.push_exchange(user_text, assistant_text, now);
            if dropped > 0 {
                debug!(
                    "Truncated session '{}' by {} messages (cap {})",
                    session_id,
                    dropped,
                    session.max_messages()
                );
            }
        }
    }

    // == Sweep ==
    /// Drops sessions idle longer than `max_age`, then the least recently
    /// accessed ones until at most `max_sessions` remain. Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();

        let max_age = self.config.max_age;
        sessions.retain(|_, session| now.saturating_duration_since(session.last_access_at) <= max_age);

        if sessions.len() > self.config.max_sessions {
            let excess = sessions.len() - self.config.max_sessions;
            for session_id in oldest_first(&sessions).into_iter().take(excess) {
                sessions.remove(&session_id);
            }
        }

        let removed = before - sessions.len();
        if removed > 0 {
            info!("Conversation sweep removed {} sessions", removed);
        }
        removed
    }

    // == Emergency Cleanup ==
    /// Keeps only the `emergency_keep` most recently accessed sessions.
    pub fn emergency_cleanup(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let keep = self.config.emergency_keep;
        if sessions.len() <= keep {
            return 0;
        }

        let excess = sessions.len() - keep;
        for session_id in oldest_first(&sessions).into_iter().take(excess) {
            sessions.remove(&session_id);
        }

        warn!("Emergency cleanup removed {} conversations", excess);
        excess
    }

    pub fn stats(&self) -> ConversationStats {
        let sessions = self.sessions.lock();
        ConversationStats {
            active_sessions: sessions.len(),
            total_messages: sessions.values().map(|s| s.messages().len()).sum(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Evicts least recently accessed sessions until one more fits.
    fn make_room(&self, sessions: &mut HashMap<String, ConversationSession>) {
        let max = self.config.max_sessions;
        if max == 0 || sessions.len() < max {
            return;
        }

        let excess = sessions.len() + 1 - max;
        for session_id in oldest_first(sessions).into_iter().take(excess) {
            sessions.remove(&session_id);
        }
    }
}

/// Session ids ordered by last access, oldest first.
fn oldest_first(sessions: &HashMap<String, ConversationSession>) -> Vec<String> {
    let mut by_access: Vec<(&String, Instant)> = sessions
        .iter()
        .map(|(id, session)| (id, session.last_access_at))
        .collect();
    by_access.sort_by_key(|&(_, at)| at);
    by_access.into_iter().map(|(id, _)| id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store(max_sessions: usize) -> ConversationStore {
        ConversationStore::new(ConversationConfig {
            max_age: Duration::from_secs(3600),
            max_sessions,
            emergency_keep: 2,
        })
    }

    #[test]
    fn test_unknown_session_is_empty_and_not_created() {
        let store = store(10);
        assert!(store.get_history("nobody").is_empty());
        assert!(!store.contains("nobody"));
    }

    #[test]
    fn test_history_is_a_copy() {
        let store = store(10);
        store.add_exchange("s", "question", "answer");

        let mut history = store.get_history("s");
        history.clear();

        assert_eq!(store.get_history("s").len(), 2);
    }

    #[test]
    fn test_recent_exchanges_takes_tail() {
        let store = store(10);
        for i in 0..5 {
            store.add_exchange("s", &format!("q{}", i), &format!("a{}", i));
        }

        let recent = store.recent_exchanges("s", 2);
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q3", "a3", "q4", "a4"]);
    }

    #[test]
    fn test_verbose_sessions_stay_within_limit() {
        let store = store(10);
        let text = "y".repeat(600);
        for _ in 0..11 {
            store.add_exchange("verbose", &text, &text);
        }

        let history = store.get_history("verbose");
        assert!(history.len() <= 12);
        assert_eq!(history.len() % 2, 0);
    }

    #[test]
    fn test_sweep_removes_idle_sessions() {
        let store = store(10);
        let t0 = Instant::now();
        store.add_exchange_at("old", "q", "a", t0);
        store.add_exchange_at("fresh", "q", "a", t0 + Duration::from_secs(3000));

        let removed = store.sweep_at(t0 + Duration::from_secs(3601));

        assert_eq!(removed, 1);
        assert!(!store.contains("old"));
        assert!(store.contains("fresh"));
    }

    #[test]
    fn test_new_session_evicts_oldest_at_capacity() {
        let store = store(2);
        let t0 = Instant::now();
        store.add_exchange_at("a", "q", "a", t0);
        store.add_exchange_at("b", "q", "a", t0 + Duration::from_secs(1));
        store.add_exchange_at("c", "q", "a", t0 + Duration::from_secs(2));

        assert_eq!(store.len(), 2);
        assert!(!store.contains("a"));
        assert!(store.contains("b"));
        assert!(store.contains("c"));
    }

    #[test]
    fn test_emergency_cleanup_keeps_most_recent() {
        let store = store(100);
        let t0 = Instant::now();
        for i in 0..5u64 {
            store.add_exchange_at(&format!("s{}", i), "q", "a", t0 + Duration::from_secs(i));
        }

        assert_eq!(store.emergency_cleanup(), 3);
        assert!(store.contains("s3"));
        assert!(store.contains("s4"));
        assert_eq!(store.emergency_cleanup(), 0);
    }

    #[test]
    fn test_stats() {
        let store = store(10);
        store.add_exchange("a", "q", "a");
        store.add_exchange("a", "q", "a");
        store.add_exchange("b", "q", "a");

        let stats = store.stats();
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.total_messages, 6);
    }

    #[test]
    fn test_concurrent_appends_to_one_session_stay_paired() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(store(10));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..25 {
                        store.add_exchange("shared", &format!("q{}-{}", t, i), "a");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let history = store.get_history("shared");
        assert_eq!(history.len() % 2, 0);
        assert!(history.len() <= 30);
        for pair in history.chunks(2) {
            assert!(pair[0].content.starts_with('q'));
            assert_eq!(pair[1].content, "a");
        }
    }
}
