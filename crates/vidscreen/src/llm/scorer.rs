//! Semantic similarity between an answer transcript and the question's
//! expected answer profile, on a 0..=100 scale.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::prompt::{extract_json, scoring_prompt};
use super::{LlmClient, LlmError};
use crate::pipeline::ScriptQuestion;

#[async_trait]
pub trait AnswerScorer: Send + Sync {
    async fn score(&self, question: &ScriptQuestion, transcript: &str) -> Result<f64, LlmError>;
}

#[derive(Deserialize)]
struct ScoreResponse {
    similarity: f64,
}

/// Asks the language model to grade the answer.
pub struct LlmAnswerScorer {
    llm: Arc<dyn LlmClient>,
}

impl LlmAnswerScorer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnswerScorer for LlmAnswerScorer {
    async fn score(&self, question: &ScriptQuestion, transcript: &str) -> Result<f64, LlmError> {
        if transcript.trim().is_empty() {
            return Ok(0.0);
        }
        let prompt = scoring_prompt(question, transcript);
        let response = self.llm.complete(&prompt.system, &prompt.user).await?;
        let json = extract_json(&response);
        let parsed: ScoreResponse = serde_json::from_str(json).map_err(|e| {
            LlmError::ResponseParse(format!("Failed to parse score: {}. Response was: {}", e, json))
        })?;
        if !parsed.similarity.is_finite() {
            return Err(LlmError::ResponseParse(format!(
                "Score is not a number: {}",
                parsed.similarity
            )));
        }
        Ok(parsed.similarity.clamp(0.0, 100.0))
    }
}

/// Offline scorer: the share of profile keywords the transcript mentions,
/// with fuzzy word matching to absorb transcription errors.
#[derive(Debug, Clone)]
pub struct LexicalScorer {
    /// Minimum Jaro-Winkler similarity for two words to count as equal.
    pub word_threshold: f64,
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self {
            word_threshold: 0.88,
        }
    }
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "have", "has",
    "you", "your", "about", "into", "how", "what", "why", "who", "when", "which", "their", "they",
    "our", "can", "not", "but", "all", "any", "its",
];

fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

impl LexicalScorer {
    pub fn similarity(&self, profile: &str, transcript: &str) -> f64 {
        let wanted = keywords(profile);
        let said = keywords(transcript);
        if wanted.is_empty() || said.is_empty() {
            return 0.0;
        }

        let matched = wanted
            .iter()
            .filter(|w| {
                said.iter()
                    .any(|s| strsim::jaro_winkler(w, s) >= self.word_threshold)
            })
            .count();
        matched as f64 / wanted.len() as f64 * 100.0
    }
}

#[async_trait]
impl AnswerScorer for LexicalScorer {
    async fn score(&self, question: &ScriptQuestion, transcript: &str) -> Result<f64, LlmError> {
        let profile = if question.expected_answer.trim().is_empty() {
            &question.text
        } else {
            &question.expected_answer
        };
        Ok(self.similarity(profile, transcript))
    }
}
