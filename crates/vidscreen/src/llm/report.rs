//! Final narrative report of a scored record.

use std::sync::Arc;

use serde::Deserialize;

use super::prompt::{extract_json, report_prompt};
use super::{LlmClient, LlmError};
use crate::external::{ApplicantProfile, VacancyProfile};
use crate::pipeline::{PerQuestionAnalysis, PipelineRecord, Report};

#[derive(Deserialize)]
struct RawReport {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    recommendation: String,
}

pub struct ReportWriter {
    llm: Arc<dyn LlmClient>,
}

impl ReportWriter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn write(
        &self,
        vacancy: &VacancyProfile,
        applicant: &ApplicantProfile,
        record: &PipelineRecord,
        analyses: &[PerQuestionAnalysis],
    ) -> Result<Report, LlmError> {
        let prompt = report_prompt(vacancy, applicant, record, analyses);
        let response = self.llm.complete(&prompt.system, &prompt.user).await?;
        let json = extract_json(&response);
        let raw: RawReport = serde_json::from_str(json).map_err(|e| {
            LlmError::ResponseParse(format!("Failed to parse report: {}. Response was: {}", e, json))
        })?;
        if raw.summary.trim().is_empty() {
            return Err(LlmError::ResponseParse("Report has no summary".to_string()));
        }
        Ok(Report {
            summary: raw.summary,
            strengths: raw.strengths,
            risks: raw.risks,
            recommendation: raw.recommendation,
            file_id: None,
        })
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        return "<p>None.</p>".to_string();
    }
    let items: String = items
        .iter()
        .map(|i| format!("<li>{}</li>", escape_html(i)))
        .collect();
    format!("<ul>{}</ul>", items)
}

/// Renders the report as a standalone HTML page.
pub fn render_html(
    applicant: &ApplicantProfile,
    vacancy: &VacancyProfile,
    record: &PipelineRecord,
    analyses: &[PerQuestionAnalysis],
    report: &Report,
) -> String {
    let rows: String = record
        .script
        .iter()
        .flat_map(|s| s.questions.iter())
        .map(|q| {
            let score = analyses
                .iter()
                .find(|a| a.question_id == q.id)
                .map(|a| format!("{:.0}", a.similarity))
                .unwrap_or_else(|| "-".to_string());
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(&q.text),
                score
            )
        })
        .collect();

    let verdict = match record.pass {
        Some(true) => "Passed",
        Some(false) => "Not passed",
        None => "Not scored",
    };

    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>{name}: {title}</title></head>
<body>
<h1>{name}</h1>
<h2>{title}</h2>
<p><strong>{verdict}</strong>: score {score:.1} of threshold {threshold:.1}</p>
<h3>Summary</h3><p>{summary}</p>
<h3>Strengths</h3>{strengths}
<h3>Risks</h3>{risks}
<h3>Recommendation</h3><p>{recommendation}</p>
<h3>Questions</h3><table><tr><th>Question</th><th>Score</th></tr>{rows}</table>
</body></html>
"#,
        name = escape_html(&applicant.name),
        title = escape_html(&vacancy.title),
        verdict = verdict,
        score = record.total_score.unwrap_or(0.0),
        threshold = record.threshold,
        summary = escape_html(&report.summary),
        strengths = list(&report.strengths),
        risks = list(&report.risks),
        recommendation = escape_html(&report.recommendation),
        rows = rows,
    )
}
