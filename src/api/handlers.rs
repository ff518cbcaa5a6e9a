//! API Handlers
//!
//! HTTP request handlers for each gateway endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::HeaderMap, Json};

use crate::error::{Result, ServeError};
use crate::models::{ChatRequestBody, ChatResponse, HealthResponse, StatsResponse};
use crate::serving::ServingFacade;

/// Header consulted for the role when the body does not name one.
pub const ROLE_HEADER: &str = "x-user-role";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<ServingFacade>,
    pub started_at: Instant,
}

impl AppState {
    /// Creates a new AppState around the given facade.
    pub fn new(facade: Arc<ServingFacade>) -> Self {
        Self {
            facade,
            started_at: Instant::now(),
        }
    }

    fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Handler for POST /api/chat (and its /api/query alias)
///
/// Overload, timeout and backend failures still answer 200 with a fallback
/// message and `degraded: true`. Only invalid input is a 400.
pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequestBody>,
) -> Result<Json<ChatResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ServeError::InvalidRequest(error_msg));
    }

    let header_role = headers
        .get(ROLE_HEADER)
        .and_then(|value| value.to_str().ok());
    let request = req.into_chat_request(header_role);

    let reply = state.facade.handle_chat(request).await?;
    Ok(Json(reply.into()))
}

/// Handler for GET /api/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let memory = state.facade.memory().monitor();
    Json(HealthResponse::new(
        memory,
        state.uptime_seconds(),
        state.facade.scheduler().is_running(),
    ))
}

/// Handler for GET /api/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let facade = &state.facade;

    Json(StatsResponse {
        uptime_seconds: state.uptime_seconds(),
        memory: facade.memory().monitor(),
        cleanup_runs: facade.memory().cleanup_counts(),
        cache: facade.cache().stats().into(),
        scheduler: facade.scheduler().stats(),
        conversations: facade.conversations().stats(),
    })
}
