//! Pipeline record and the documents stored on it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::PipelineStatus;

/// One answer to the screening survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAnswer {
    pub question_id: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    Text,
    SingleChoice,
    MultipleChoice,
}

/// A question of the generated interview script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    /// What a strong answer covers; semantic scoring compares against it.
    #[serde(default)]
    pub expected_answer: String,
}

/// Interview script produced by the language model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewScript {
    pub intro: String,
    pub outro: String,
    #[serde(default)]
    pub comment: String,
    pub questions: Vec<ScriptQuestion>,
}

impl InterviewScript {
    pub fn question(&self, id: &str) -> Option<&ScriptQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    #[default]
    Absent,
    Uploading,
    Processing,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnswer {
    pub file_id: String,
}

/// Video-interview state: upload progress and one file per question.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInterview {
    pub status: VideoStatus,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answers: BTreeMap<String, VideoAnswer>,
}

/// Narrative report produced for a filtered record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    pub recommendation: String,
    /// Object-storage id of the rendered HTML report.
    #[serde(default)]
    pub file_id: Option<String>,
}

/// The per-applicant state-machine row driving the video interview.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRecord {
    pub id: String,
    pub space_id: String,
    pub applicant_id: String,
    pub vacancy_id: String,
    pub status: PipelineStatus,
    pub survey_answers: Vec<SurveyAnswer>,
    pub script: Option<InterviewScript>,
    pub video_interview: VideoInterview,
    pub total_score: Option<f64>,
    pub threshold: f64,
    pub pass: Option<bool>,
    pub report: Option<Report>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRecord {
    /// A fresh record in `NotSent`.
    pub fn new(space_id: &str, applicant_id: &str, vacancy_id: &str, threshold: f64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            space_id: space_id.to_string(),
            applicant_id: applicant_id.to_string(),
            vacancy_id: vacancy_id.to_string(),
            status: PipelineStatus::NotSent,
            survey_answers: Vec::new(),
            script: None,
            video_interview: VideoInterview::default(),
            total_score: None,
            threshold,
            pass: None,
            report: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Question ids of the script, in script order.
    pub fn question_ids(&self) -> Vec<&str> {
        self.script
            .as_ref()
            .map(|s| s.questions.iter().map(|q| q.id.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn question_count(&self) -> usize {
        self.script.as_ref().map(|s| s.questions.len()).unwrap_or(0)
    }
}
