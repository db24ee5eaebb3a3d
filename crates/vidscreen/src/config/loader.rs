use std::collections::HashSet;
use std::path::Path;

use secrecy::SecretString;

use crate::config::schema::{Config, LlmConfig};
use crate::error::ConfigError;
use crate::secrets::resolve_secret_optional;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let threshold = config.scoring.default_threshold;
    if !(0.0..=100.0).contains(&threshold) {
        return Err(ConfigError::Validation {
            message: format!("scoring.default_threshold must be within 0..=100, got {}", threshold),
        });
    }

    let workers = &config.workers;
    if workers.interval_secs == 0 || workers.report_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "Worker intervals must be greater than zero".to_string(),
        });
    }

    let mut question_ids = HashSet::new();
    for question in &config.survey.questions {
        if !question_ids.insert(&question.id) {
            return Err(ConfigError::InvalidSurveyQuestion {
                id: question.id.clone(),
                reason: "Duplicate question ID".to_string(),
            });
        }
        if let Some(answer) = question
            .reject_on
            .iter()
            .find(|a| !question.options.contains(a))
        {
            return Err(ConfigError::InvalidSurveyQuestion {
                id: question.id.clone(),
                reason: format!("reject_on value '{}' is not one of the options", answer),
            });
        }
    }

    Ok(())
}

/// Resolves the LLM API key. `None` when no key source is configured.
pub fn resolve_llm_api_key(llm: &LlmConfig) -> Result<Option<SecretString>, ConfigError> {
    Ok(resolve_secret_optional(
        llm.api_key.as_deref(),
        llm.api_key_file.as_deref(),
        llm.api_key_env_var.as_deref(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ScorerKind;
    use std::io::Write;

    const MINIMAL: &str = r#"
    {
        "version": "1.0",
        "ai_backend": { "base_url": "http://ai.local:7860" },
        "llm": { "base_url": "https://api.example.com/v1", "model": "gpt-4o-mini" }
    }
    "#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.ai_backend.job, "predict");
        assert_eq!(config.ai_backend.request_timeout_secs, 600);
        assert_eq!(config.workers.initial_delay_secs, 10);
        assert_eq!(config.workers.interval_secs, 300);
        assert_eq!(config.workers.report_interval_secs, 3600);
        assert_eq!(config.retry.cooldown_minutes, 15);
        assert_eq!(config.retry.max_auto_retries, 1);
        assert_eq!(config.scoring.default_threshold, 60.0);
        assert_eq!(config.scoring.scorer, ScorerKind::Llm);
        assert!(config.notifications.webhook_url.is_none());
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database": { "path": "/var/lib/vidscreen/db.sqlite" },
            "ai_backend": { "base_url": "http://ai.local:7860", "job": "analyze" },
            "llm": { "base_url": "http://llm", "model": "m", "api_key_env_var": "LLM_KEY" },
            "workers": { "initial_delay_secs": 1, "interval_secs": 60 },
            "scoring": { "default_threshold": 75, "scorer": "lexical" },
            "notifications": { "webhook_url": "https://hooks.example.com/x" },
            "survey": {
                "questions": [
                    { "id": "relocate", "text": "Ready to relocate?", "options": ["yes", "no"], "reject_on": ["no"] }
                ]
            }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.ai_backend.job, "analyze");
        assert_eq!(config.scoring.scorer, ScorerKind::Lexical);
        assert_eq!(config.scoring.default_threshold, 75.0);
        assert_eq!(config.survey.questions[0].reject_on, vec!["no".to_string()]);
        assert_eq!(config.workers.report_interval_secs, 3600);
    }

    #[test]
    fn test_invalid_version() {
        let config_json = MINIMAL.replace("\"1.0\"", "\"2.0\"");
        assert!(load_config_from_str(&config_json).is_err());
    }

    #[test]
    fn test_missing_required_section() {
        let config_json = r#"{ "version": "1.0", "llm": { "base_url": "x", "model": "m" } }"#;
        let result = load_config_from_str(config_json);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config_json = MINIMAL.replace(
            "\"version\": \"1.0\",",
            "\"version\": \"1.0\", \"scoring\": { \"default_threshold\": 120 },",
        );
        assert!(load_config_from_str(&config_json).is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config_json = MINIMAL.replace(
            "\"version\": \"1.0\",",
            "\"version\": \"1.0\", \"workers\": { \"interval_secs\": 0 },",
        );
        assert!(load_config_from_str(&config_json).is_err());
    }

    #[test]
    fn test_survey_validation() {
        let duplicate = MINIMAL.replace(
            "\"version\": \"1.0\",",
            r#""version": "1.0", "survey": { "questions": [
                { "id": "a", "text": "A?" }, { "id": "a", "text": "B?" }
            ] },"#,
        );
        assert!(matches!(
            load_config_from_str(&duplicate),
            Err(ConfigError::InvalidSurveyQuestion { .. })
        ));

        let unknown_reject = MINIMAL.replace(
            "\"version\": \"1.0\",",
            r#""version": "1.0", "survey": { "questions": [
                { "id": "a", "text": "A?", "options": ["yes"], "reject_on": ["maybe"] }
            ] },"#,
        );
        assert!(matches!(
            load_config_from_str(&unknown_reject),
            Err(ConfigError::InvalidSurveyQuestion { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidscreen.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(matches!(
            load_config(dir.path().join("missing.json")),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_llm_key_resolution() {
        let mut config = load_config_from_str(MINIMAL).unwrap();
        assert!(resolve_llm_api_key(&config.llm).unwrap().is_none());

        config.llm.api_key = Some("sk-test".to_string());
        assert!(resolve_llm_api_key(&config.llm).unwrap().is_some());
    }
}
