pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, resolve_llm_api_key};
pub use schema::{
    AiBackendConfig, Config, DatabaseConfig, LlmConfig, MailConfig, NotificationsConfig,
    RetryConfig, ScorerKind, ScoringConfig, SurveyConfig, SurveyQuestion, WorkersConfig,
};
