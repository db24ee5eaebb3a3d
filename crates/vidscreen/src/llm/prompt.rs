//! Prompt assembly and response clean-up.

use crate::external::{ApplicantProfile, VacancyProfile};
use crate::pipeline::{PerQuestionAnalysis, PipelineRecord, ScriptQuestion};

const MAX_RESUME_CHARS: usize = 3000;
const MAX_TRANSCRIPT_CHARS: usize = 4000;

/// A system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Escapes chat-template control tokens in untrusted text (resumes,
/// transcripts, survey answers) so they cannot steer the model.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}

fn clip(text: &str, max_chars: usize) -> String {
    sanitize_for_prompt(text).chars().take(max_chars).collect()
}

/// Returns the first balanced JSON object in `response`, skipping any prose
/// or code fences around it. Returns the input unchanged when it holds no
/// object.
pub fn extract_json(response: &str) -> &str {
    let Some(start) = response.find('{') else {
        return response;
    };

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end = response.len();

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    &response[start..end]
}

fn vacancy_block(vacancy: &VacancyProfile) -> String {
    let requirements = if vacancy.requirements.is_empty() {
        "(none listed)".to_string()
    } else {
        vacancy
            .requirements
            .iter()
            .map(|r| format!("- {}", sanitize_for_prompt(r)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Vacancy: {}\n{}\nRequirements:\n{}",
        sanitize_for_prompt(&vacancy.title),
        clip(&vacancy.description, MAX_RESUME_CHARS),
        requirements
    )
}

/// Prompt for the interview script of one applicant. `answers` pairs each
/// survey question text with the applicant's answer.
pub fn script_prompt(
    vacancy: &VacancyProfile,
    applicant: &ApplicantProfile,
    answers: &[(String, String)],
) -> Prompt {
    let survey = answers
        .iter()
        .map(|(q, a)| format!("Q: {}\nA: {}", sanitize_for_prompt(q), sanitize_for_prompt(a)))
        .collect::<Vec<_>>()
        .join("\n");

    Prompt {
        system: r#"You are a recruiter preparing a short asynchronous video interview.
Write 3 to 6 questions the candidate answers on camera, each with a short
description of what a strong answer covers.

Output ONLY a JSON object:
{"intro": "...", "outro": "...", "comment": "...",
 "questions": [{"id": "q1", "text": "...", "type": "text", "options": [], "expectedAnswer": "..."}]}
"type" is one of "text", "single_choice", "multiple_choice"."#
            .to_string(),
        user: format!(
            "{}\n\nCandidate: {}\nResume:\n{}\n\nScreening survey:\n{}",
            vacancy_block(vacancy),
            sanitize_for_prompt(&applicant.name),
            clip(&applicant.resume, MAX_RESUME_CHARS),
            if survey.is_empty() { "(no answers)".to_string() } else { survey }
        ),
    }
}

/// Prompt rating how well a transcript matches a question's expected answer.
pub fn scoring_prompt(question: &ScriptQuestion, transcript: &str) -> Prompt {
    Prompt {
        system: r#"You grade answers of a video interview. Compare the transcript with the
expected answer profile and rate their semantic similarity from 0 (unrelated)
to 100 (fully covers the profile).
Output ONLY a JSON object: {"similarity": <number>, "reasoning": "..."}"#
            .to_string(),
        user: format!(
            "Question: {}\nExpected answer profile: {}\nTranscript:\n{}",
            sanitize_for_prompt(&question.text),
            sanitize_for_prompt(&question.expected_answer),
            clip(transcript, MAX_TRANSCRIPT_CHARS)
        ),
    }
}

/// Prompt for the final narrative report of a scored record.
pub fn report_prompt(
    vacancy: &VacancyProfile,
    applicant: &ApplicantProfile,
    record: &PipelineRecord,
    analyses: &[PerQuestionAnalysis],
) -> Prompt {
    let answers = record
        .script
        .iter()
        .flat_map(|s| s.questions.iter())
        .map(|q| {
            let analysis = analyses.iter().find(|a| a.question_id == q.id);
            let (transcript, score) = match analysis {
                Some(a) if a.manual_skip && a.has_error() => ("(skipped)".to_string(), a.similarity),
                Some(a) => (clip(&a.transcript, MAX_TRANSCRIPT_CHARS / 2), a.similarity),
                None => ("(no answer)".to_string(), 0.0),
            };
            format!(
                "Q: {}\nScore: {:.0}\nTranscript: {}",
                sanitize_for_prompt(&q.text),
                score,
                transcript
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let verdict = match record.pass {
        Some(true) => "passed",
        Some(false) => "did not pass",
        None => "was not scored",
    };

    Prompt {
        system: r#"You write hiring reports for recruiters. Summarize the candidate's video
interview honestly and concisely.
Output ONLY a JSON object:
{"summary": "...", "strengths": ["..."], "risks": ["..."], "recommendation": "..."}"#
            .to_string(),
        user: format!(
            "{}\n\nCandidate: {}\nTotal score: {:.1} (threshold {:.1}); the candidate {}.\n\n{}",
            vacancy_block(vacancy),
            sanitize_for_prompt(&applicant.name),
            record.total_score.unwrap_or(0.0),
            record.threshold,
            verdict,
            answers
        ),
    }
}
