//! Chat Gateway - In-process serving layer for a text-generation backend
//!
//! Puts a TTL/LRU content cache, a memory pressure monitor, a conversation
//! store and a priority batch scheduler in front of a single slow inference
//! endpoint.

pub mod api;
pub mod cache;
pub mod config;
pub mod content;
pub mod conversation;
pub mod error;
pub mod inference;
pub mod memory;
pub mod models;
pub mod scheduler;
pub mod serving;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{InferenceError, ServeError};
pub use serving::{ChatReply, ChatRequest, ServingFacade};
