//! Content Module
//!
//! Auxiliary context for prompts, fetched from an external content service.

mod http;

use async_trait::async_trait;

pub use http::{render_context, Chunk, HttpContentSource, Keyword, Resource, SubjectContent};

/// Produces the auxiliary context block for a key.
///
/// Never fails: anything that goes wrong yields an empty string, which the
/// caller caches like any other result.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, key: &str) -> String;
}
