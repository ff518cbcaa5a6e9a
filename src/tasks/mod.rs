//! Background Tasks Module
//!
//! Periodic maintenance that runs alongside request handling.
//!
//! # Tasks
//! - Cache purge: removes expired content cache entries
//! - Conversation sweep: drops idle and excess sessions
//! - Memory sampler: keeps the pressure trend current

mod cleanup;
mod sampler;

pub use cleanup::{spawn_cache_purge_task, spawn_conversation_sweep_task};
pub use sampler::spawn_memory_sampler_task;
