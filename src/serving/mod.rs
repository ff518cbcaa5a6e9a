//! Serving Module
//!
//! Per-request orchestration across cache, memory monitor, conversation
//! store and batch scheduler.

mod facade;

pub use facade::{
    ChatOutcome, ChatReply, ChatRequest, FacadeSettings, ServingFacade, FAILURE_REPLY,
    OVERLOADED_REPLY, TIMEOUT_REPLY,
};
