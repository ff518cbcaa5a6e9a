//! Prompt Construction
//!
//! Builds the text sent to the backend and pulls the assistant's reply back
//! out of what it returns.

use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;

use crate::conversation::{Message, MessageRole};
use crate::inference::Role;

pub const STUDENT_SYSTEM_PROMPT: &str = "\
You are a knowledgeable and friendly classroom tutor that helps students with academic questions.
Give accurate, concise answers that are easy to understand.
Subjects: mathematics, science, language arts, history and civics, computer science.
How you help:
- Explain topics in clear, simple language
- Break problems down step by step
- Suggest study strategies when useful
Guidelines:
- Answer the question directly without restating it
- Avoid jargon unless the student is clearly advanced
- Keep a respectful, educational tone and stay on the subject
- Keep answers under 2048 characters";

pub const TEACHER_SYSTEM_PROMPT: &str = "\
You are an efficient and knowledgeable aide that supports teachers with planning, student engagement and content delivery.
Give practical, accurate and actionable answers.
Subjects: mathematics, science, language arts, history and civics, computer science.
How you help:
- Explain topics at levels suited to different learners
- Recommend exercises, assignments and classroom activities
- Summarise complex topics for instruction
Guidelines:
- Prioritise clarity, instructional relevance and precision
- Answer exactly what was asked without assumptions
- Use pedagogically sound language suitable for educators
- Keep answers under 2048 characters";

const EMPTY_REPLY: &str = "I'm sorry, I couldn't generate a response.";
const SHORT_REPLY: &str = "I'm sorry, I couldn't generate a meaningful response.";

/// Markers after which the reply starts, checked in order.
const REPLY_MARKERS: [&str; 2] = ["Assistant:", "</think>"];

pub fn system_prompt(role: Role) -> &'static str {
    match role {
        Role::Student => STUDENT_SYSTEM_PROMPT,
        Role::Teacher => TEACHER_SYSTEM_PROMPT,
    }
}

/// Date and time block. Rebuilt for every request.
pub fn dynamic_context(now: DateTime<Local>) -> String {
    format!(
        "Current date: {}\n\
         Current time: {}\n\
         \n\
         Remember:\n\
         - If asked about the time or date, use the values above.\n\
         - Tailor explanations to the grade level when one is given.\n\
         - If a question is unclear, give the most helpful answer possible.",
        now.format("%Y-%m-%d"),
        now.format("%H:%M:%S")
    )
}

/// Everything that goes into one prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptParts<'a> {
    pub role: Role,
    pub subject: Option<&'a str>,
    /// Auxiliary context block, empty when there is none
    pub aux_context: &'a str,
    /// Recent exchanges, oldest first
    pub history: &'a [Message],
    pub question: &'a str,
}

pub fn build_prompt(parts: &PromptParts<'_>, now: DateTime<Local>) -> String {
    let mut prompt = String::with_capacity(1024 + parts.aux_context.len() + parts.question.len());

    prompt.push_str(system_prompt(parts.role));
    prompt.push_str("\n\n");
    prompt.push_str(&dynamic_context(now));
    prompt.push_str("\n\nSubject: ");
    prompt.push_str(parts.subject.unwrap_or("General"));

    if !parts.aux_context.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(parts.aux_context);
    }

    if !parts.history.is_empty() {
        prompt.push_str("\n\nEarlier in this conversation:");
        for message in parts.history {
            let label = match message.role {
                MessageRole::User => "Question",
                MessageRole::Assistant => "Answer",
            };
            prompt.push('\n');
            prompt.push_str(label);
            prompt.push_str(": ");
            prompt.push_str(&message.content);
        }
    }

    prompt.push_str("\n\nUser: ");
    prompt.push_str(parts.question);
    prompt.push_str("\n\nAssistant:");
    prompt
}

static THINK_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<think>.*?</think>").expect("THINK_BLOCK_RE regex should compile")
});

/// Reduces a raw completion to the assistant's reply.
///
/// Takes the text after the first reply marker found, drops any
/// `<think>...</think>` blocks and substitutes an apology when fewer than
/// three characters are left.
pub fn extract_assistant_response(raw: &str) -> String {
    if raw.trim().is_empty() {
        return EMPTY_REPLY.to_string();
    }

    let mut reply = raw;
    for marker in REPLY_MARKERS {
        if let Some((_, rest)) = raw.split_once(marker) {
            reply = rest;
            break;
        }
    }

    let cleaned = THINK_BLOCK_RE.replace_all(reply, "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() < 3 {
        SHORT_REPLY.to_string()
    } else {
        cleaned.to_string()
    }
}
