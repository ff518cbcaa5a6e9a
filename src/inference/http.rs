//! HTTP Inference Engine
//!
//! Posts prompts to a text-generation backend over HTTP.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::InferenceError;
use crate::inference::{InferenceEngine, Role};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// Calls `POST {url}` with `{"prompt", "role"}` and reads `{"text"}` back.
///
/// `generate` blocks the calling thread on the runtime it was built in, so it
/// must only be called from blocking workers, never from an async task.
#[derive(Debug, Clone)]
pub struct HttpInferenceEngine {
    client: reqwest::Client,
    url: String,
    runtime: Handle,
}

impl HttpInferenceEngine {
    /// Builds an engine bound to the current tokio runtime.
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            runtime: Handle::try_current()?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, prompt: &str, role: Role) -> Result<String, InferenceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest { prompt, role })
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Upstream(format!(
                "backend returned {}",
                status
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(classify)?;
        debug!("Backend returned {} chars for {}", body.text.len(), role);
        Ok(body.text)
    }
}

impl InferenceEngine for HttpInferenceEngine {
    fn generate(&self, prompt: &str, role: Role) -> Result<String, InferenceError> {
        self.runtime.block_on(self.request(prompt, role))
    }
}

fn classify(err: reqwest::Error) -> InferenceError {
    if err.is_connect() || err.is_timeout() {
        InferenceError::Unavailable(err.to_string())
    } else {
        InferenceError::Upstream(err.to_string())
    }
}
