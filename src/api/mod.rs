//! API Module
//!
//! HTTP handlers and routing for the gateway REST API.
//!
//! # Endpoints
//! - `POST /api/chat` - Answer a chat question
//! - `POST /api/query` - Alias of `/api/chat`
//! - `GET /api/health` - Health check endpoint
//! - `GET /api/stats` - Component statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
