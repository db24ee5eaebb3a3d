//! Language-model integration: the chat client, prompt assembly and the
//! script, scoring and report generators built on it.

pub mod client;
pub mod prompt;
pub mod report;
pub mod scorer;
pub mod script;

use thiserror::Error;

pub use client::{ChatCompletionsClient, LlmClient};
pub use report::ReportWriter;
pub use scorer::{AnswerScorer, LexicalScorer, LlmAnswerScorer};
pub use script::ScriptGenerator;

/// Errors from LLM calls and response parsing.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("Failed to parse LLM response: {0}")]
    ResponseParse(String),
}
