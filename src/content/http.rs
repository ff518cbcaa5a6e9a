//! HTTP Content Source
//!
//! Resolves a subject name through the content service and renders its
//! extracted resources into a bounded context block.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::content::ContentSource;

const CHUNKS_PER_RESOURCE: usize = 2;
const CHUNK_CHARS: usize = 500;
const KEYWORDS_PER_CHUNK: usize = 3;

#[derive(Debug, Deserialize)]
struct Subject {
    #[serde(rename = "_id")]
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectContent {
    pub subject_name: Option<String>,
    pub total_resources: u64,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Resource {
    pub name: Option<String>,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Chunk {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: String,
    pub keywords: Vec<Keyword>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Keyword {
    pub word: String,
}

#[derive(Debug, Clone)]
pub struct HttpContentSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn try_fetch(&self, subject_name: &str) -> anyhow::Result<String> {
        let subjects: Vec<Subject> = self
            .client
            .get(format!("{}/api/subjects/user", self.base_url))
            .send()
            .await
            .context("listing subjects")?
            .error_for_status()
            .context("listing subjects")?
            .json()
            .await
            .context("decoding subject list")?;

        let Some(subject) = subjects.into_iter().find(|s| s.name == subject_name) else {
            debug!("Subject '{}' not found", subject_name);
            return Ok(String::new());
        };

        let content: SubjectContent = self
            .client
            .get(format!("{}/api/subjects/{}/content", self.base_url, subject.id))
            .send()
            .await
            .with_context(|| format!("fetching content of subject {}", subject.id))?
            .error_for_status()
            .with_context(|| format!("fetching content of subject {}", subject.id))?
            .json()
            .await
            .context("decoding subject content")?;

        Ok(render_context(&content))
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self, key: &str) -> String {
        if key.is_empty() || key == "General" {
            return String::new();
        }
        match self.try_fetch(key).await {
            Ok(context) => context,
            Err(err) => {
                warn!("Content fetch for '{}' failed: {:#}", key, err);
                String::new()
            }
        }
    }
}

/// Renders subject content as a prompt block. Empty when there are no resources.
pub fn render_context(content: &SubjectContent) -> String {
    if content.total_resources == 0 {
        return String::new();
    }

    let mut out = String::new();
    let _ = writeln!(out, "\n=== SUBJECT RESOURCES CONTEXT ===");
    let _ = writeln!(
        out,
        "Subject: {}",
        content.subject_name.as_deref().unwrap_or("Unknown")
    );
    let _ = writeln!(out, "Total Resources: {}\n", content.total_resources);

    for resource in content.resources.iter().filter(|r| !r.chunks.is_empty()) {
        let chunks = &resource.chunks[..resource.chunks.len().min(CHUNKS_PER_RESOURCE)];
        let keywords: Vec<&str> = chunks
            .iter()
            .flat_map(|chunk| chunk.keywords.iter().take(KEYWORDS_PER_CHUNK))
            .map(|keyword| keyword.word.as_str())
            .collect();

        let _ = writeln!(
            out,
            "--- {} ---",
            resource.name.as_deref().unwrap_or("Unknown")
        );
        let _ = writeln!(out, "Keywords: {}\n", keywords.join(", "));

        for chunk in chunks {
            let text: String = chunk.content.chars().take(CHUNK_CHARS).collect();
            let kind = title_case(chunk.kind.as_deref().unwrap_or("content"));
            let _ = writeln!(out, "{}: {}\n", kind, text);
        }
    }

    out.push_str("=== END RESOURCES ===\n");
    out
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
