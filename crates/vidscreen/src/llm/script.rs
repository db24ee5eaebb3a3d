//! Interview script generation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use super::prompt::{extract_json, script_prompt};
use super::{LlmClient, LlmError};
use crate::external::{ApplicantProfile, VacancyProfile};
use crate::pipeline::{InterviewScript, QuestionType, ScriptQuestion};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScript {
    #[serde(default)]
    intro: String,
    #[serde(default)]
    outro: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(rename = "type", default)]
    kind: QuestionType,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    expected_answer: String,
}

/// Builds interview scripts with the language model.
pub struct ScriptGenerator {
    llm: Arc<dyn LlmClient>,
}

impl ScriptGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn generate(
        &self,
        vacancy: &VacancyProfile,
        applicant: &ApplicantProfile,
        answers: &[(String, String)],
    ) -> Result<InterviewScript, LlmError> {
        let prompt = script_prompt(vacancy, applicant, answers);
        let response = self.llm.complete(&prompt.system, &prompt.user).await?;
        parse_script(&response)
    }
}

/// Parses and normalizes the model's script. Questions without text are
/// dropped; missing or duplicate ids are replaced by `q<n>`.
pub(crate) fn parse_script(response: &str) -> Result<InterviewScript, LlmError> {
    let json = extract_json(response);
    let raw: RawScript = serde_json::from_str(json).map_err(|e| {
        LlmError::ResponseParse(format!("Failed to parse script JSON: {}. Response was: {}", e, json))
    })?;

    let mut seen = HashSet::new();
    let mut questions = Vec::new();
    for (i, q) in raw
        .questions
        .into_iter()
        .filter(|q| !q.text.trim().is_empty())
        .enumerate()
    {
        let explicit = q
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && !seen.contains(id));
        let id = match explicit {
            Some(id) => id,
            None => {
                let mut n = i + 1;
                while seen.contains(&format!("q{}", n)) {
                    n += 1;
                }
                format!("q{}", n)
            }
        };
        seen.insert(id.clone());
        questions.push(ScriptQuestion {
            id,
            text: q.text.trim().to_string(),
            kind: q.kind,
            options: q.options,
            expected_answer: q.expected_answer,
        });
    }

    if questions.is_empty() {
        return Err(LlmError::ResponseParse(
            "Script contains no questions".to_string(),
        ));
    }

    Ok(InterviewScript {
        intro: raw.intro,
        outro: raw.outro,
        comment: raw.comment,
        questions,
    })
}
