//! Cleanup Tasks
//!
//! Background tasks that periodically purge expired cache entries and sweep
//! idle conversations.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ContentCache;
use crate::conversation::ConversationStore;

/// Spawns a task that removes expired cache entries every `interval`.
///
/// Returns the task handle so shutdown can abort it.
pub fn spawn_cache_purge_task(cache: Arc<ContentCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache purge task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired();
            if removed > 0 {
                info!("Cache purge: removed {} expired entries", removed);
            } else {
                debug!("Cache purge: no expired entries found");
            }
        }
    })
}

/// Spawns a task that sweeps idle and excess conversations every `interval`.
pub fn spawn_conversation_sweep_task(
    conversations: Arc<ConversationStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting conversation sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;
            // The sweep logs its own removals
            conversations.sweep();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::conversation::ConversationConfig;

    #[tokio::test]
    async fn test_purge_task_removes_expired_entries() {
        let cache = Arc::new(ContentCache::new(CacheConfig::default()));
        cache.set_with_ttl("expire_soon", "value", Duration::from_millis(50));

        let handle = spawn_cache_purge_task(cache.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(250)).await;

        // Checked through len so the read itself does not purge
        assert_eq!(cache.len(), 0, "Expired entry should have been purged");
        assert_eq!(cache.stats().expirations, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_preserves_valid_entries() {
        let cache = Arc::new(ContentCache::new(CacheConfig::default()));
        cache.set_with_ttl("long_lived", "value", Duration::from_secs(3600));

        let handle = spawn_cache_purge_task(cache.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.get("long_lived").as_deref(), Some("value"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_drops_idle_sessions() {
        let conversations = Arc::new(ConversationStore::new(ConversationConfig {
            max_age: Duration::from_millis(50),
            ..ConversationConfig::default()
        }));
        conversations.add_exchange("idle", "q", "a");

        let handle =
            spawn_conversation_sweep_task(conversations.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(!conversations.contains("idle"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_task_can_be_aborted() {
        let cache = Arc::new(ContentCache::new(CacheConfig::default()));

        let handle = spawn_cache_purge_task(cache, Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
