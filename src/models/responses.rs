//! Response DTOs for the gateway API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::conversation::ConversationStats;
use crate::memory::{CleanupCounts, MemoryStatus, PressureLevel};
use crate::scheduler::SchedulerStats;
use crate::serving::{ChatOutcome, ChatReply};

/// Response body for `POST /api/chat`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub answer: String,
    pub latency_ms: u64,
    /// True when `answer` is a fallback message
    pub degraded: bool,
    pub outcome: ChatOutcome,
    pub request_id: String,
    pub memory_percent: f64,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            answer: reply.answer,
            latency_ms: reply.latency_ms,
            degraded: reply.degraded,
            outcome: reply.outcome,
            request_id: reply.request_id,
            memory_percent: reply.memory_percent,
        }
    }
}

/// Response body for the health endpoint (`GET /api/health`)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` under critical memory pressure
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub memory: MemoryStatus,
    pub scheduler_running: bool,
}

impl HealthResponse {
    pub fn new(memory: MemoryStatus, uptime_seconds: u64, scheduler_running: bool) -> Self {
        let status = if memory.level == PressureLevel::Critical {
            "degraded"
        } else {
            "healthy"
        };
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds,
            memory,
            scheduler_running,
        }
    }
}

/// Cache section of the stats response
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsBody {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsBody {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for the stats endpoint (`GET /api/stats`)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub memory: MemoryStatus,
    pub cleanup_runs: CleanupCounts,
    pub cache: CacheStatsBody,
    pub scheduler: SchedulerStats,
    pub conversations: ConversationStats,
}
