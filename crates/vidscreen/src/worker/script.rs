//! Script generation: `Done | Regen -> Draft`, or `ScriptFailed` when the
//! language model fails.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Stage, StageKind, TickSummary, WorkerContext};
use crate::config::SurveyConfig;
use crate::db::record_repo;
use crate::pipeline::{PipelineError, PipelineRecord, PipelineStatus};

pub struct ScriptStage {
    ctx: WorkerContext,
}

/// Survey answers paired with their question text.
fn answered_questions(survey: &SurveyConfig, record: &PipelineRecord) -> Vec<(String, String)> {
    record
        .survey_answers
        .iter()
        .map(|a| {
            let question = survey
                .question(&a.question_id)
                .map(|q| q.text.clone())
                .unwrap_or_else(|| a.question_id.clone());
            (question, a.answer.clone())
        })
        .collect()
}

impl ScriptStage {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    async fn generate(&self, mut record: PipelineRecord) -> Result<bool, PipelineError> {
        let from = record.status;
        let vacancy = self
            .ctx
            .directory
            .vacancy(&record.space_id, &record.vacancy_id)
            .await?;
        let applicant = self
            .ctx
            .directory
            .applicant(&record.space_id, &record.applicant_id)
            .await?;
        let answers = answered_questions(&self.ctx.survey, &record);

        match self.ctx.scripts.generate(&vacancy, &applicant, &answers).await {
            Ok(script) => {
                log::info!(
                    "Generated script with {} questions for record {}",
                    script.questions.len(),
                    record.id
                );
                record.script = Some(script);
                record.status = PipelineStatus::Draft;
                record_repo::save_with_transition(&self.ctx.db, &record, from)?;
                Ok(true)
            }
            Err(e) => {
                record_repo::transition(
                    &self.ctx.db,
                    &record.id,
                    from,
                    PipelineStatus::ScriptFailed,
                )?;
                self.ctx
                    .escalation
                    .notify_result(
                        StageKind::Script.as_str(),
                        &record.space_id,
                        &record.applicant_id,
                        &e.to_string(),
                    )
                    .await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Stage for ScriptStage {
    fn kind(&self) -> StageKind {
        StageKind::Script
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, PipelineError> {
        let mut summary = TickSummary::default();
        for status in [PipelineStatus::Done, PipelineStatus::Regen] {
            for record in record_repo::list_by_status(&self.ctx.db, status)? {
                if cancel.is_cancelled() {
                    return Ok(summary);
                }
                let id = record.id.clone();
                let outcome = self.generate(record).await;
                summary.record(self.kind(), &id, outcome);
            }
        }
        Ok(summary)
    }
}
