//! Inference Module
//!
//! The text-generation capability the gateway consumes, and the prompt
//! plumbing around it.

mod engine;
mod http;
pub mod prompt;

pub use engine::{InferenceEngine, Role};
pub use http::HttpInferenceEngine;
pub use prompt::{build_prompt, extract_assistant_response, PromptParts};
