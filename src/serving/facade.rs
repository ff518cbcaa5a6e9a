//! Serving Facade
//!
//! Runs one chat request end to end: memory check, auxiliary context,
//! conversation history, prompt, scheduling and the write-back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::ContentCache;
use crate::config::Config;
use crate::content::ContentSource;
use crate::conversation::ConversationStore;
use crate::error::ServeError;
use crate::inference::{build_prompt, extract_assistant_response, InferenceEngine, PromptParts, Role};
use crate::memory::{MemoryMonitor, MemorySource, PressureLevel};
use crate::scheduler::{BatchScheduler, BatchedRequest, Priority};

pub const OVERLOADED_REPLY: &str =
    "The server is temporarily overloaded. Please try again in a moment.";
pub const TIMEOUT_REPLY: &str = "The response is taking too long. Please try again.";
pub const FAILURE_REPLY: &str = "I'm experiencing technical difficulties. Please try again.";

#[derive(Debug, Clone)]
pub struct FacadeSettings {
    /// Deadline for each scheduled request
    pub request_timeout: Duration,
    /// Most recent exchanges included in a prompt
    pub context_exchanges: usize,
}

impl Default for FacadeSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            context_exchanges: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub question: String,
    pub session_id: Option<String>,
    pub role: Role,
    pub subject: Option<String>,
    /// Key of the auxiliary context to include, if any
    pub aux_key: Option<String>,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatOutcome {
    Answered,
    Overloaded,
    TimedOut,
    UpstreamFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub latency_ms: u64,
    /// True when `answer` is a fallback message
    pub degraded: bool,
    pub outcome: ChatOutcome,
    pub request_id: String,
    pub memory_percent: f64,
}

// == Serving Facade ==
pub struct ServingFacade {
    cache: Arc<ContentCache>,
    memory: Arc<MemoryMonitor>,
    conversations: Arc<ConversationStore>,
    scheduler: Arc<BatchScheduler>,
    content: Option<Arc<dyn ContentSource>>,
    settings: FacadeSettings,
}

impl ServingFacade {
    /// Wires the components together and registers the cache and
    /// conversation cleanups with the memory monitor.
    pub fn new(
        cache: Arc<ContentCache>,
        memory: Arc<MemoryMonitor>,
        conversations: Arc<ConversationStore>,
        scheduler: Arc<BatchScheduler>,
        content: Option<Arc<dyn ContentSource>>,
        settings: FacadeSettings,
    ) -> Self {
        {
            let cache = Arc::clone(&cache);
            memory.register_cleanup_callback(move || {
                let removed = cache.purge_expired();
                debug!("Gentle cleanup purged {} expired cache entries", removed);
            });
        }
        {
            let cache = Arc::clone(&cache);
            memory.register_emergency_callback(move || {
                let removed = cache.clear();
                warn!("Emergency cleanup cleared {} cache entries", removed);
            });
        }
        {
            let conversations = Arc::clone(&conversations);
            memory.register_emergency_callback(move || {
                conversations.emergency_cleanup();
            });
        }

        Self {
            cache,
            memory,
            conversations,
            scheduler,
            content,
            settings,
        }
    }

    /// Builds every component from configuration.
    pub fn from_config(
        config: &Config,
        engine: Arc<dyn InferenceEngine>,
        memory_source: impl MemorySource + 'static,
        content: Option<Arc<dyn ContentSource>>,
    ) -> Self {
        Self::new(
            Arc::new(ContentCache::new(config.cache_config())),
            Arc::new(MemoryMonitor::new(memory_source, config.memory_thresholds())),
            Arc::new(ConversationStore::new(config.conversation_config())),
            Arc::new(BatchScheduler::new(engine, config.batch_config())),
            content,
            FacadeSettings {
                request_timeout: config.request_timeout(),
                context_exchanges: config.context_exchanges,
            },
        )
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn memory(&self) -> &Arc<MemoryMonitor> {
        &self.memory
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub fn scheduler(&self) -> &Arc<BatchScheduler> {
        &self.scheduler
    }

    pub fn settings(&self) -> &FacadeSettings {
        &self.settings
    }

    // == Handle Chat ==
    /// Answers one chat request.
    ///
    /// Only malformed input is an error. Overload, timeout and upstream
    /// failure produce a degraded reply carrying a fallback message, and
    /// leave the conversation untouched.
    pub async fn handle_chat(&self, request: ChatRequest) -> Result<ChatReply, ServeError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(ServeError::InvalidRequest("No question provided".to_string()));
        }

        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        info!(
            "[{}] {} - {} - {}",
            request_id,
            request.role,
            request.subject.as_deref().unwrap_or("General"),
            preview(question)
        );

        let status = self.memory.monitor();
        let memory_percent = status.current_percent;
        if status.level == PressureLevel::Critical {
            let err = ServeError::Overloaded(memory_percent);
            return Ok(degraded_reply(request_id, started, memory_percent, &err));
        }

        let aux_context = match request.aux_key.as_deref() {
            Some(key) if !key.is_empty() => self.aux_context(key, request.role).await,
            _ => String::new(),
        };

        let history = match request.session_id.as_deref() {
            Some(session_id) => self
                .conversations
                .recent_exchanges(session_id, self.settings.context_exchanges),
            None => Vec::new(),
        };

        let prompt = build_prompt(
            &PromptParts {
                role: request.role,
                subject: request.subject.as_deref(),
                aux_context: &aux_context,
                history: &history,
                question,
            },
            Local::now(),
        );

        let (batched, pending) = BatchedRequest::new(
            request_id.clone(),
            prompt,
            request.role,
            request.priority,
            self.settings.request_timeout,
        );
        self.scheduler.submit(batched);

        match pending.wait().await {
            Ok(raw) => {
                let answer = extract_assistant_response(&raw);
                if let Some(session_id) = request.session_id.as_deref() {
                    self.conversations.add_exchange(session_id, question, &answer);
                }

                let latency_ms = started.elapsed().as_millis() as u64;
                info!(
                    "[{}] Completed in {}ms - {} chars",
                    request_id,
                    latency_ms,
                    answer.len()
                );
                Ok(ChatReply {
                    answer,
                    latency_ms,
                    degraded: false,
                    outcome: ChatOutcome::Answered,
                    request_id,
                    memory_percent,
                })
            }
            Err(err) => Ok(degraded_reply(request_id, started, memory_percent, &err)),
        }
    }

    /// Auxiliary context for `key`, memoised per role. Empty results are
    /// cached too, so a failing content service is asked once per TTL.
    async fn aux_context(&self, key: &str, role: Role) -> String {
        let cache_key = format!("aux:{}:role:{}", key, role);
        if let Some(context) = self.cache.get(&cache_key) {
            debug!("Aux context cache hit for '{}'", cache_key);
            return context;
        }

        let Some(source) = &self.content else {
            return String::new();
        };

        let context = source.fetch(key).await;
        self.cache.set(cache_key, context.clone());
        context
    }

    /// Stops the scheduler; queued requests resolve as failures.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

fn degraded_reply(
    request_id: String,
    started: Instant,
    memory_percent: f64,
    err: &ServeError,
) -> ChatReply {
    let (answer, outcome) = match err {
        ServeError::Overloaded(_) => (OVERLOADED_REPLY, ChatOutcome::Overloaded),
        ServeError::RequestTimeout(_) => (TIMEOUT_REPLY, ChatOutcome::TimedOut),
        ServeError::UpstreamFailure(_) | ServeError::InvalidRequest(_) => {
            (FAILURE_REPLY, ChatOutcome::UpstreamFailed)
        }
    };
    warn!("[{}] Degraded reply: {}", request_id, err);

    ChatReply {
        answer: answer.to_string(),
        latency_ms: started.elapsed().as_millis() as u64,
        degraded: true,
        outcome,
        request_id,
        memory_percent,
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(30).collect();
    if preview.len() < text.len() {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::conversation::ConversationConfig;
    use crate::error::InferenceError;
    use crate::memory::{FixedMemorySource, MemoryThresholds};
    use crate::scheduler::BatchConfig;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct EchoEngine {
        prompts: Mutex<Vec<String>>,
    }

    impl InferenceEngine for EchoEngine {
        fn generate(&self, prompt: &str, _role: Role) -> Result<String, InferenceError> {
            self.prompts.lock().push(prompt.to_string());
            let question = prompt
                .rsplit("User: ")
                .next()
                .unwrap_or_default()
                .trim_end_matches("\n\nAssistant:");
            Ok(format!("Assistant: echo {}", question))
        }
    }

    #[derive(Default)]
    struct CountingSource {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContentSource for CountingSource {
        async fn fetch(&self, key: &str) -> String {
            self.calls.lock().push(key.to_string());
            if key == "missing" {
                String::new()
            } else {
                format!("=== CONTEXT FOR {} ===", key)
            }
        }
    }

    struct Fixture {
        facade: ServingFacade,
        engine: Arc<EchoEngine>,
        source: Arc<CountingSource>,
        memory: Arc<FixedMemorySource>,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(EchoEngine::default());
        let source = Arc::new(CountingSource::default());
        let memory = Arc::new(FixedMemorySource::new(40.0));
        let facade = ServingFacade::new(
            Arc::new(ContentCache::new(CacheConfig::default())),
            Arc::new(MemoryMonitor::new(memory.clone(), MemoryThresholds::default())),
            Arc::new(ConversationStore::new(ConversationConfig::default())),
            Arc::new(BatchScheduler::new(engine.clone(), BatchConfig::default())),
            Some(source.clone() as Arc<dyn ContentSource>),
            FacadeSettings::default(),
        );
        Fixture {
            facade,
            engine,
            source,
            memory,
        }
    }

    fn ask(question: &str) -> ChatRequest {
        ChatRequest {
            question: question.to_string(),
            session_id: Some("session".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_answer_is_extracted_and_recorded() {
        let fx = fixture();

        let reply = fx.facade.handle_chat(ask("what is a cell?")).await.unwrap();

        assert_eq!(reply.answer, "echo what is a cell?");
        assert!(!reply.degraded);
        assert_eq!(reply.outcome, ChatOutcome::Answered);
        assert_eq!(fx.facade.conversations().get_history("session").len(), 2);
    }

    #[tokio::test]
    async fn test_history_feeds_next_prompt() {
        let fx = fixture();

        fx.facade.handle_chat(ask("first question")).await.unwrap();
        fx.facade.handle_chat(ask("second question")).await.unwrap();

        let prompts = fx.engine.prompts.lock().clone();
        assert!(prompts[1].contains("Question: first question"));
        assert!(prompts[1].contains("Answer: echo first question"));
    }

    #[tokio::test]
    async fn test_empty_question_is_invalid() {
        let fx = fixture();

        let result = fx.facade.handle_chat(ask("   ")).await;

        assert!(matches!(result, Err(ServeError::InvalidRequest(_))));
        assert!(fx.engine.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_overloaded_fails_fast() {
        let fx = fixture();
        fx.memory.set_percent(90.0);

        let reply = fx.facade.handle_chat(ask("anything")).await.unwrap();

        assert!(reply.degraded);
        assert_eq!(reply.outcome, ChatOutcome::Overloaded);
        assert_eq!(reply.answer, OVERLOADED_REPLY);
        assert!(fx.engine.prompts.lock().is_empty());
        assert!(fx.facade.conversations().get_history("session").is_empty());
    }

    #[tokio::test]
    async fn test_aux_context_is_cached_per_role() {
        let fx = fixture();
        let mut request = ask("explain osmosis");
        request.aux_key = Some("Biology".to_string());

        fx.facade.handle_chat(request.clone()).await.unwrap();
        fx.facade.handle_chat(request.clone()).await.unwrap();
        request.role = Role::Teacher;
        fx.facade.handle_chat(request).await.unwrap();

        assert_eq!(fx.source.calls.lock().len(), 2);
        assert!(fx.facade.cache().get("aux:Biology:role:student").is_some());
        assert!(fx.facade.cache().get("aux:Biology:role:teacher").is_some());
        assert!(fx.engine.prompts.lock()[0].contains("=== CONTEXT FOR Biology ==="));
    }

    #[tokio::test]
    async fn test_empty_aux_context_is_negatively_cached() {
        let fx = fixture();
        let mut request = ask("question");
        request.aux_key = Some("missing".to_string());

        fx.facade.handle_chat(request.clone()).await.unwrap();
        fx.facade.handle_chat(request).await.unwrap();

        assert_eq!(fx.source.calls.lock().len(), 1);
        assert_eq!(
            fx.facade.cache().get("aux:missing:role:student").as_deref(),
            Some("")
        );
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"x".repeat(40)), format!("{}...", "x".repeat(30)));
    }
}
