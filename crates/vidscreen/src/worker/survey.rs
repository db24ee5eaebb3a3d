//! Survey dispatch: `NotSent -> Sent`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Stage, StageKind, TickSummary, WorkerContext};
use crate::db::record_repo;
use crate::external::Letter;
use crate::pipeline::messages::survey_invitation;
use crate::pipeline::{PipelineError, PipelineRecord, PipelineStatus};

/// Sends the screening survey. A record is marked `Sent` only when a
/// channel delivered the invitation; otherwise it is retried next tick.
pub struct SurveyStage {
    ctx: WorkerContext,
}

impl SurveyStage {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    async fn dispatch(&self, record: &PipelineRecord) -> Result<bool, PipelineError> {
        let applicant = self
            .ctx
            .directory
            .applicant(&record.space_id, &record.applicant_id)
            .await?;
        let body = survey_invitation(&self.ctx.survey, &self.ctx.mail.portal_url, record);

        let letter = Letter {
            space_id: &record.space_id,
            applicant: &applicant,
            text: &body.text,
            html: &body.html,
            subject: &self.ctx.mail.survey_subject,
        };
        let Some(channel) = self.ctx.delivery.deliver(&letter).await else {
            log::warn!(
                "Survey for applicant {} not delivered, retrying next tick",
                record.applicant_id
            );
            return Ok(false);
        };

        record_repo::transition(
            &self.ctx.db,
            &record.id,
            PipelineStatus::NotSent,
            PipelineStatus::Sent,
        )?;
        log::info!("Survey for record {} sent via {}", record.id, channel);
        Ok(true)
    }
}

#[async_trait]
impl Stage for SurveyStage {
    fn kind(&self) -> StageKind {
        StageKind::Survey
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, PipelineError> {
        let mut summary = TickSummary::default();
        for record in record_repo::list_by_status(&self.ctx.db, PipelineStatus::NotSent)? {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = self.dispatch(&record).await;
            summary.record(self.kind(), &record.id, outcome);
        }
        Ok(summary)
    }
}
