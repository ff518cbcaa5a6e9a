//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::conversation::ConversationConfig;
use crate::memory::MemoryThresholds;
use crate::scheduler::BatchConfig;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries in the content cache
    pub cache_max_entries: usize,
    /// Content cache TTL in seconds
    pub cache_ttl_seconds: u64,
    /// Values longer than this many chars are stored compressed
    pub compression_threshold: usize,
    /// Interval in seconds between expired-entry purges
    pub cache_cleanup_interval: u64,
    /// Maximum requests per dispatched batch
    pub batch_size: usize,
    /// Maximum time in milliseconds spent collecting one batch
    pub batch_timeout_ms: u64,
    /// Memory usage percent that triggers gentle cleanup
    pub memory_warning_percent: f64,
    /// Memory usage percent that triggers emergency cleanup and load shedding
    pub memory_critical_percent: f64,
    /// Interval in seconds between background memory samples
    pub memory_sample_interval: u64,
    /// Idle hours after which a conversation is dropped
    pub conversation_max_age_hours: u64,
    /// Maximum number of live conversations
    pub conversation_max_sessions: usize,
    /// Interval in seconds between conversation sweeps
    pub conversation_sweep_interval: u64,
    /// Conversations kept by an emergency cleanup
    pub emergency_keep_sessions: usize,
    /// Most recent exchanges included in a prompt
    pub context_exchanges: usize,
    /// Per-request deadline in milliseconds
    pub request_timeout_ms: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Endpoint of the text-generation backend
    pub inference_url: String,
    /// Base URL of the auxiliary content service, if any
    pub content_service_url: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` (1000), `CACHE_TTL_SECONDS` (300),
    ///   `CACHE_COMPRESSION_THRESHOLD` (1000), `CACHE_CLEANUP_INTERVAL` (60)
    /// - `BATCH_SIZE` (4), `BATCH_TIMEOUT_MS` (100)
    /// - `MEMORY_WARNING_PERCENT` (75), `MEMORY_CRITICAL_PERCENT` (85),
    ///   `MEMORY_SAMPLE_INTERVAL` (5)
    /// - `CONVERSATION_MAX_AGE_HOURS` (24), `CONVERSATION_MAX_SESSIONS` (1000),
    ///   `CONVERSATION_SWEEP_INTERVAL` (300), `EMERGENCY_KEEP_SESSIONS` (10)
    /// - `CONTEXT_EXCHANGES` (3), `REQUEST_TIMEOUT_MS` (30000)
    /// - `SERVER_PORT` (8000), `INFERENCE_URL`, `CONTENT_SERVICE_URL` (unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_ttl_seconds: env_or("CACHE_TTL_SECONDS", defaults.cache_ttl_seconds),
            compression_threshold: env_or(
                "CACHE_COMPRESSION_THRESHOLD",
                defaults.compression_threshold,
            ),
            cache_cleanup_interval: env_or(
                "CACHE_CLEANUP_INTERVAL",
                defaults.cache_cleanup_interval,
            ),
            batch_size: env_or("BATCH_SIZE", defaults.batch_size),
            batch_timeout_ms: env_or("BATCH_TIMEOUT_MS", defaults.batch_timeout_ms),
            memory_warning_percent: env_or(
                "MEMORY_WARNING_PERCENT",
                defaults.memory_warning_percent,
            ),
            memory_critical_percent: env_or(
                "MEMORY_CRITICAL_PERCENT",
                defaults.memory_critical_percent,
            ),
            memory_sample_interval: env_or(
                "MEMORY_SAMPLE_INTERVAL",
                defaults.memory_sample_interval,
            ),
            conversation_max_age_hours: env_or(
                "CONVERSATION_MAX_AGE_HOURS",
                defaults.conversation_max_age_hours,
            ),
            conversation_max_sessions: env_or(
                "CONVERSATION_MAX_SESSIONS",
                defaults.conversation_max_sessions,
            ),
            conversation_sweep_interval: env_or(
                "CONVERSATION_SWEEP_INTERVAL",
                defaults.conversation_sweep_interval,
            ),
            emergency_keep_sessions: env_or(
                "EMERGENCY_KEEP_SESSIONS",
                defaults.emergency_keep_sessions,
            ),
            context_exchanges: env_or("CONTEXT_EXCHANGES", defaults.context_exchanges),
            request_timeout_ms: env_or("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            inference_url: env::var("INFERENCE_URL").unwrap_or(defaults.inference_url),
            content_service_url: env::var("CONTENT_SERVICE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache_max_entries,
            ttl: Duration::from_secs(self.cache_ttl_seconds),
            compression_threshold: self.compression_threshold,
        }
    }

    pub fn memory_thresholds(&self) -> MemoryThresholds {
        MemoryThresholds {
            warning_percent: self.memory_warning_percent,
            critical_percent: self.memory_critical_percent,
        }
    }

    pub fn conversation_config(&self) -> ConversationConfig {
        ConversationConfig {
            max_age: Duration::from_secs(self.conversation_max_age_hours * 3600),
            max_sessions: self.conversation_max_sessions,
            emergency_keep: self.emergency_keep_sessions,
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            batch_timeout: Duration::from_millis(self.batch_timeout_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    // Background task periods, at least one second each

    pub fn cache_purge_period(&self) -> Duration {
        Duration::from_secs(self.cache_cleanup_interval.max(1))
    }

    pub fn conversation_sweep_period(&self) -> Duration {
        Duration::from_secs(self.conversation_sweep_interval.max(1))
    }

    pub fn memory_sample_period(&self) -> Duration {
        Duration::from_secs(self.memory_sample_interval.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_max_entries: 1000,
            cache_ttl_seconds: 300,
            compression_threshold: 1000,
            cache_cleanup_interval: 60,
            batch_size: 4,
            batch_timeout_ms: 100,
            memory_warning_percent: 75.0,
            memory_critical_percent: 85.0,
            memory_sample_interval: 5,
            conversation_max_age_hours: 24,
            conversation_max_sessions: 1000,
            conversation_sweep_interval: 300,
            emergency_keep_sessions: 10,
            context_exchanges: 3,
            request_timeout_ms: 30_000,
            server_port: 8000,
            inference_url: "http://localhost:8001/generate".to_string(),
            content_service_url: None,
        }
    }
}

/// Parses an environment variable, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache_max_entries, 1000);
        assert_eq!(config.cache_ttl_seconds, 300);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.batch_timeout_ms, 100);
        assert_eq!(config.memory_warning_percent, 75.0);
        assert_eq!(config.memory_critical_percent, 85.0);
        assert_eq!(config.request_timeout_ms, 30_000);
        assert!(config.content_service_url.is_none());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("CHAT_GATEWAY_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("CHAT_GATEWAY_TEST_GARBAGE", 7u64), 7);
        env::remove_var("CHAT_GATEWAY_TEST_GARBAGE");
    }

    #[test]
    fn test_env_or_parses_value() {
        env::set_var("CHAT_GATEWAY_TEST_PERCENT", " 62.5 ");
        assert_eq!(env_or("CHAT_GATEWAY_TEST_PERCENT", 0.0f64), 62.5);
        env::remove_var("CHAT_GATEWAY_TEST_PERCENT");
    }

    #[test]
    fn test_component_configs() {
        let config = Config::default();

        let cache = config.cache_config();
        assert_eq!(cache.max_entries, 1000);
        assert_eq!(cache.ttl, Duration::from_secs(300));

        let conversations = config.conversation_config();
        assert_eq!(conversations.max_age, Duration::from_secs(24 * 3600));
        assert_eq!(conversations.emergency_keep, 10);

        let batch = config.batch_config();
        assert_eq!(batch.batch_timeout, Duration::from_millis(100));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_task_periods_never_zero() {
        let config = Config {
            cache_cleanup_interval: 0,
            memory_sample_interval: 0,
            ..Config::default()
        };
        assert_eq!(config.cache_purge_period(), Duration::from_secs(1));
        assert_eq!(config.memory_sample_period(), Duration::from_secs(1));
        assert_eq!(config.conversation_sweep_period(), Duration::from_secs(300));
    }
}
