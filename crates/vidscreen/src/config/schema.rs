use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub ai_backend: AiBackendConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub survey: SurveyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file. Defaults to `~/.vidscreen/data/vidscreen.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiBackendConfig {
    pub base_url: String,
    /// Name of the remote job the videos are submitted to.
    #[serde(default = "default_job")]
    pub job: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_ai_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_job() -> String {
    "predict".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_ai_request_timeout_secs() -> u64 {
    600
}

impl Default for AiBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7860".to_string(),
            job: default_job(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_ai_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// API key, directly. Prefer `api_key_file` or `api_key_env_var`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env_var: Option<String>,
}

fn default_temperature() -> f32 {
    0.2
}

fn default_llm_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Period of the report worker.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

fn default_initial_delay_secs() -> u64 {
    10
}

fn default_interval_secs() -> u64 {
    300
}

fn default_report_interval_secs() -> u64 {
    3600
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            interval_secs: default_interval_secs(),
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,
    #[serde(default = "default_max_auto_retries")]
    pub max_auto_retries: u32,
}

fn default_cooldown_minutes() -> u32 {
    15
}

fn default_max_auto_retries() -> u32 {
    1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
            max_auto_retries: default_max_auto_retries(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    #[default]
    Llm,
    Lexical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Pass threshold of new records, 0..=100.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    #[serde(default)]
    pub scorer: ScorerKind,
}

fn default_threshold() -> f64 {
    60.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            scorer: ScorerKind::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Operator webhook. Without it alerts are only logged.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Base of the retry/skip links included in alerts.
    #[serde(default = "default_action_base_url")]
    pub action_base_url: String,
}

fn default_action_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            action_base_url: default_action_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_survey_subject")]
    pub survey_subject: String,
    #[serde(default = "default_video_subject")]
    pub video_subject: String,
    /// Candidate-facing site hosting the survey and interview pages.
    #[serde(default = "default_portal_url")]
    pub portal_url: String,
}

fn default_from() -> String {
    "no-reply@localhost".to_string()
}

fn default_survey_subject() -> String {
    "A few questions about your application".to_string()
}

fn default_video_subject() -> String {
    "Your video interview".to_string()
}

fn default_portal_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: default_from(),
            survey_subject: default_survey_subject(),
            video_subject: default_video_subject(),
            portal_url: default_portal_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(default)]
    pub questions: Vec<SurveyQuestion>,
}

impl SurveyConfig {
    pub fn question(&self, id: &str) -> Option<&SurveyQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// A screening question sent before the video interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: String,
    pub text: String,
    /// Allowed answers; empty for free text.
    #[serde(default)]
    pub options: Vec<String>,
    /// Answers that end the pipeline with `refuse`.
    #[serde(default)]
    pub reject_on: Vec<String>,
}
