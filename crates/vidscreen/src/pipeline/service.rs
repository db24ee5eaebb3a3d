//! Operations the surrounding application calls on pipeline records.

use std::sync::Arc;

use chrono::Utc;

use super::messages::video_invitation;
use super::{PipelineError, PipelineRecord, PipelineStatus, SurveyAnswer, VideoAnswer, VideoStatus};
use crate::config::{MailConfig, SurveyConfig};
use crate::db::{analysis_repo, record_repo, Database};
use crate::external::{ApplicantDirectory, Delivery, Letter};

/// Entry point for everything outside the stage workers: record creation,
/// survey answers, video uploads and operator actions.
pub struct PipelineService {
    db: Database,
    delivery: Delivery,
    directory: Arc<dyn ApplicantDirectory>,
    survey: SurveyConfig,
    mail: MailConfig,
    default_threshold: f64,
}

impl PipelineService {
    pub fn new(
        db: Database,
        delivery: Delivery,
        directory: Arc<dyn ApplicantDirectory>,
        survey: SurveyConfig,
        mail: MailConfig,
        default_threshold: f64,
    ) -> Self {
        Self {
            db,
            delivery,
            directory,
            survey,
            mail,
            default_threshold,
        }
    }

    pub fn get_record(&self, id: &str) -> Result<PipelineRecord, PipelineError> {
        record_repo::find_by_id(&self.db, id)?.ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    /// Creates the applicant's record in `NotSent`, or returns the existing
    /// one.
    pub fn create_record(
        &self,
        space_id: &str,
        applicant_id: &str,
        vacancy_id: &str,
    ) -> Result<PipelineRecord, PipelineError> {
        if let Some(existing) = record_repo::find_by_applicant(&self.db, space_id, applicant_id)? {
            return Ok(existing);
        }
        let record = PipelineRecord::new(space_id, applicant_id, vacancy_id, self.default_threshold);
        record_repo::insert(&self.db, &record)?;
        log::info!(
            "Created pipeline record {} for applicant {}",
            record.id,
            applicant_id
        );
        Ok(record)
    }

    /// Stores the survey answers and moves the record to `Answered`, then to
    /// `Refuse` when an answer is a configured rejection or `Done` otherwise.
    pub fn submit_survey_answers(
        &self,
        record_id: &str,
        answers: Vec<SurveyAnswer>,
    ) -> Result<PipelineRecord, PipelineError> {
        let mut record = self.get_record(record_id)?;
        for answer in &answers {
            let question = self.survey.question(&answer.question_id).ok_or_else(|| {
                PipelineError::InvalidInput(format!("unknown survey question '{}'", answer.question_id))
            })?;
            if !question.options.is_empty() && !question.options.contains(&answer.answer) {
                return Err(PipelineError::InvalidInput(format!(
                    "'{}' is not an option of survey question '{}'",
                    answer.answer, answer.question_id
                )));
            }
        }

        let rejected = answers.iter().any(|a| {
            self.survey
                .question(&a.question_id)
                .is_some_and(|q| q.reject_on.contains(&a.answer))
        });

        let from = record.status;
        record.survey_answers = answers;
        record.status = PipelineStatus::Answered;
        record_repo::save_with_transition(&self.db, &record, from)?;

        let next = if rejected {
            PipelineStatus::Refuse
        } else {
            PipelineStatus::Done
        };
        record_repo::transition(&self.db, &record.id, PipelineStatus::Answered, next)?;
        record.status = next;
        log::info!("Survey of record {} answered: {}", record.id, next);
        Ok(record)
    }

    /// Asks the script worker for a new script.
    pub fn request_script_regeneration(&self, record_id: &str) -> Result<(), PipelineError> {
        let record = self.get_record(record_id)?;
        record_repo::transition(&self.db, &record.id, record.status, PipelineStatus::Regen)?;
        Ok(())
    }

    /// Sends the video-interview invitation of a drafted record.
    pub async fn send_video_invitation(&self, record_id: &str) -> Result<String, PipelineError> {
        let record = self.get_record(record_id)?;
        if !record.status.can_transition_to(PipelineStatus::VideoSuggestSent) {
            return Err(PipelineError::InvalidTransition {
                from: record.status.to_string(),
                to: PipelineStatus::VideoSuggestSent.to_string(),
            });
        }
        let script = record.script.as_ref().ok_or_else(|| {
            PipelineError::InvalidInput(format!("record '{}' has no interview script", record.id))
        })?;

        let applicant = self
            .directory
            .applicant(&record.space_id, &record.applicant_id)
            .await?;
        let body = video_invitation(script, &self.mail.portal_url, &record);
        let channel = self
            .delivery
            .deliver(&Letter {
                space_id: &record.space_id,
                applicant: &applicant,
                text: &body.text,
                html: &body.html,
                subject: &self.mail.video_subject,
            })
            .await
            .ok_or_else(|| PipelineError::Undelivered {
                applicant_id: record.applicant_id.clone(),
            })?;

        record_repo::transition(
            &self.db,
            &record.id,
            PipelineStatus::Draft,
            PipelineStatus::VideoSuggestSent,
        )?;
        log::info!("Video invitation for record {} sent via {}", record.id, channel);
        Ok(channel)
    }

    fn awaiting_video(&self, record_id: &str) -> Result<PipelineRecord, PipelineError> {
        let record = self.get_record(record_id)?;
        if record.status != PipelineStatus::VideoSuggestSent {
            return Err(PipelineError::InvalidInput(format!(
                "record '{}' is not collecting video answers (status {})",
                record.id, record.status
            )));
        }
        Ok(record)
    }

    /// Records the uploaded video of one script question.
    pub fn attach_video_answer(
        &self,
        record_id: &str,
        question_id: &str,
        file_id: &str,
    ) -> Result<(), PipelineError> {
        let mut record = self.awaiting_video(record_id)?;
        if !record.question_ids().contains(&question_id) {
            return Err(PipelineError::InvalidInput(format!(
                "record '{}' has no question '{}'",
                record.id, question_id
            )));
        }
        let interview = &mut record.video_interview;
        match interview.status {
            VideoStatus::Absent | VideoStatus::Uploading => {}
            other => {
                return Err(PipelineError::InvalidInput(format!(
                    "video interview of record '{}' is already {:?}",
                    record.id, other
                )))
            }
        }

        interview.status = VideoStatus::Uploading;
        interview.start_time.get_or_insert_with(Utc::now);
        interview.answers.insert(
            question_id.to_string(),
            VideoAnswer {
                file_id: file_id.to_string(),
            },
        );
        record_repo::update_data(&self.db, &record)?;
        Ok(())
    }

    /// Marks the video interview ready for analysis once every question has
    /// a video.
    pub fn complete_video_upload(&self, record_id: &str) -> Result<(), PipelineError> {
        let mut record = self.awaiting_video(record_id)?;
        let missing: Vec<&str> = record
            .question_ids()
            .into_iter()
            .filter(|id| !record.video_interview.answers.contains_key(*id))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "missing video answers for: {}",
                missing.join(", ")
            )));
        }
        if record.video_interview.status != VideoStatus::Uploading {
            return Err(PipelineError::InvalidInput(format!(
                "video interview of record '{}' is not uploading",
                record.id
            )));
        }

        record.video_interview.status = VideoStatus::Ready;
        record_repo::update_data(&self.db, &record)?;
        Ok(())
    }

    /// Operator action: retry a failed analysis on the next tick.
    pub fn mark_manual_retry(&self, record_id: &str, question_id: &str) -> Result<(), PipelineError> {
        if !analysis_repo::set_manual_retry(&self.db, record_id, question_id)? {
            return Err(PipelineError::NotFound(format!("{}/{}", record_id, question_id)));
        }
        log::info!("Manual retry requested for {}/{}", record_id, question_id);
        Ok(())
    }

    /// Operator action: accept a failed analysis as resolved.
    pub fn mark_manual_skip(&self, record_id: &str, question_id: &str) -> Result<(), PipelineError> {
        if !analysis_repo::set_manual_skip(&self.db, record_id, question_id)? {
            return Err(PipelineError::NotFound(format!("{}/{}", record_id, question_id)));
        }
        log::info!("Manual skip requested for {}/{}", record_id, question_id);
        Ok(())
    }
}
