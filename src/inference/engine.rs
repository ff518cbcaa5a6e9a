//! Inference Engine
//!
//! The blocking text-generation seam and the caller role it is keyed by.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Who is asking. Selects the system prompt and is how the scheduler groups
/// a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
}

impl Role {
    /// Parses a role name, falling back to `Student` for anything unknown.
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "teacher" => Role::Teacher,
            _ => Role::Student,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous, possibly slow text generation.
///
/// Calls are made from blocking worker threads, one at a time. They cannot
/// be interrupted once started.
pub trait InferenceEngine: Send + Sync + 'static {
    fn generate(&self, prompt: &str, role: Role) -> Result<String, InferenceError>;
}
