//! Texts sent to applicants.

use crate::config::SurveyConfig;

use super::record::{InterviewScript, PipelineRecord};

/// A message in plain-text and HTML form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    pub text: String,
    pub html: String,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn link(portal_url: &str, page: &str, record: &PipelineRecord) -> String {
    format!("{}/{}/{}", portal_url.trim_end_matches('/'), page, record.id)
}

/// The screening survey invitation.
pub fn survey_invitation(
    survey: &SurveyConfig,
    portal_url: &str,
    record: &PipelineRecord,
) -> MessageBody {
    let url = link(portal_url, "survey", record);
    let mut text = String::from("Thank you for your application! Please answer a few short questions:\n");
    let mut items = String::new();
    for (i, q) in survey.questions.iter().enumerate() {
        text.push_str(&format!("{}. {}", i + 1, q.text));
        if !q.options.is_empty() {
            text.push_str(&format!(" ({})", q.options.join(" / ")));
        }
        text.push('\n');
        items.push_str(&format!("<li>{}</li>", escape(&q.text)));
    }
    text.push_str(&format!("\nAnswer here: {}", url));

    let html = format!(
        "<p>Thank you for your application! Please answer a few short questions:</p><ol>{}</ol><p><a href=\"{}\">Answer the survey</a></p>",
        items,
        escape(&url)
    );
    MessageBody { text, html }
}

/// The invitation to record the video interview.
pub fn video_invitation(
    script: &InterviewScript,
    portal_url: &str,
    record: &PipelineRecord,
) -> MessageBody {
    let url = link(portal_url, "interview", record);
    let text = format!(
        "{}\n\nThe interview has {} questions. Record your answers here: {}",
        script.intro,
        script.questions.len(),
        url
    );
    let html = format!(
        "<p>{}</p><p>The interview has {} questions.</p><p><a href=\"{}\">Start the video interview</a></p>",
        escape(&script.intro),
        script.questions.len(),
        escape(&url)
    );
    MessageBody { text, html }
}
