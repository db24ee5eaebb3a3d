//! Per-question analysis rows and the automatic retry policy.

use chrono::{DateTime, Duration, Utc};

use crate::ai::ArtifactKind;

/// Result of analyzing one video answer. At most one row per
/// (record, question); updated on every retry and never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct PerQuestionAnalysis {
    pub id: String,
    pub record_id: String,
    pub question_id: String,
    pub transcript: String,
    pub voice_file_id: Option<String>,
    pub frame_file_id: Option<String>,
    pub emotion_file_id: Option<String>,
    pub sentiment_file_id: Option<String>,
    /// Empty when the last attempt succeeded.
    pub error: String,
    pub retry_count: u32,
    pub last_attempt_at: DateTime<Utc>,
    pub manual_retry: bool,
    pub manual_skip: bool,
    /// An operator was already notified about the current failure.
    pub escalated: bool,
    pub is_semantic_evaluated: bool,
    pub similarity: f64,
}

impl PerQuestionAnalysis {
    pub fn new(record_id: &str, question_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            record_id: record_id.to_string(),
            question_id: question_id.to_string(),
            transcript: String::new(),
            voice_file_id: None,
            frame_file_id: None,
            emotion_file_id: None,
            sentiment_file_id: None,
            error: String::new(),
            retry_count: 0,
            last_attempt_at: Utc::now(),
            manual_retry: false,
            manual_skip: false,
            escalated: false,
            is_semantic_evaluated: false,
            similarity: 0.0,
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Succeeded, or an operator chose to skip it.
    pub fn is_resolved(&self) -> bool {
        !self.has_error() || self.manual_skip
    }

    pub fn artifact_slot(&mut self, kind: ArtifactKind) -> &mut Option<String> {
        match kind {
            ArtifactKind::VoiceAmplitude => &mut self.voice_file_id,
            ArtifactKind::Frames => &mut self.frame_file_id,
            ArtifactKind::Emotions => &mut self.emotion_file_id,
            ArtifactKind::Sentiment => &mut self.sentiment_file_id,
        }
    }

    /// Records a successful attempt.
    pub fn record_success(&mut self, transcript: String, at: DateTime<Utc>) {
        self.transcript = transcript;
        self.error.clear();
        self.last_attempt_at = at;
        self.escalated = false;
    }

    /// Records a failed attempt. The first failure keeps `retry_count` at 0;
    /// every later failed retry increments it.
    pub fn record_failure(&mut self, error: String, at: DateTime<Utc>, first_attempt: bool) {
        if !first_attempt {
            self.retry_count += 1;
        }
        self.error = error;
        self.last_attempt_at = at;
        self.escalated = false;
    }
}

/// What the transcription worker should do with an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Nothing to do: succeeded or skipped.
    Resolved,
    Retry,
    /// Automatic retries are used up and the cooldown has not elapsed.
    Wait,
    /// Hand the failure to an operator.
    Escalate,
    /// An operator was already notified; wait for their retry/skip.
    AwaitingOperator,
}

/// Automatic retry policy for failed analyses.
///
/// A failed row is retried when an operator asked for it, or while
/// `retry_count <= max_auto_retries` regardless of the attempt's age. Once
/// the automatic retries are used up the row waits `cooldown` after its last
/// attempt and is then escalated to an operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub cooldown: Duration,
    pub max_auto_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::minutes(15),
            max_auto_retries: 1,
        }
    }
}

impl RetryPolicy {
    pub fn decide(&self, analysis: &PerQuestionAnalysis, now: DateTime<Utc>) -> RetryDecision {
        if analysis.is_resolved() {
            return RetryDecision::Resolved;
        }
        if analysis.manual_retry {
            return RetryDecision::Retry;
        }
        if analysis.retry_count <= self.max_auto_retries {
            return RetryDecision::Retry;
        }
        if now - analysis.last_attempt_at < self.cooldown {
            return RetryDecision::Wait;
        }
        if analysis.escalated {
            RetryDecision::AwaitingOperator
        } else {
            RetryDecision::Escalate
        }
    }
}
