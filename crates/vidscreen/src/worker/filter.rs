//! Final scoring and the recruiting decision: `VideoSemanticEvaluated ->
//! Filtered`.

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::{Stage, StageKind, TickSummary, WorkerContext};
use crate::db::{analysis_repo, record_repo};
use crate::external::{
    HistoryEntry, RecruitingStatus, SelectionStageKind, StatusChange, SYSTEM_ACTOR,
};
use crate::pipeline::scoring::{evaluate, FilterOutcome};
use crate::pipeline::{PipelineError, PipelineRecord, PipelineStatus};

/// History action written for pipeline decisions.
pub const HISTORY_ACTION: &str = "video_interview_decision";

pub struct FilterStage {
    ctx: WorkerContext,
}

impl FilterStage {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Scores the record, applies the recruiting decision and then saves
    /// score, verdict and status together. A decision that fails with an
    /// error is logged and the score is still saved; a crash before the save
    /// leaves the record here so the next tick decides it again.
    async fn filter(&self, mut record: PipelineRecord) -> Result<bool, PipelineError> {
        let analyses = analysis_repo::list_by_record(&self.ctx.db, &record.id)?;
        let similarities: Vec<f64> = record
            .question_ids()
            .iter()
            .map(|qid| {
                analyses
                    .iter()
                    .find(|a| a.question_id == *qid)
                    .map(|a| a.similarity)
                    .unwrap_or(0.0)
            })
            .collect();

        let outcome = evaluate(&similarities, record.threshold);
        if let Err(e) = self.apply_decision(&record, outcome).await {
            log::error!(
                "Failed to update recruiting status of applicant {}: {}",
                record.applicant_id,
                e
            );
        }

        record.total_score = Some(outcome.total_score);
        record.pass = Some(outcome.pass);
        record.status = PipelineStatus::Filtered;
        record_repo::save_with_transition(
            &self.ctx.db,
            &record,
            PipelineStatus::VideoSemanticEvaluated,
        )?;
        log::info!(
            "Record {} scored {:.1} (threshold {:.1}): {}",
            record.id,
            outcome.total_score,
            record.threshold,
            if outcome.pass { "pass" } else { "fail" }
        );
        Ok(true)
    }

    async fn apply_decision(
        &self,
        record: &PipelineRecord,
        outcome: FilterOutcome,
    ) -> Result<(), PipelineError> {
        let status = if outcome.pass {
            RecruitingStatus::Accepted
        } else {
            RecruitingStatus::Rejected
        };

        let allowed = self
            .ctx
            .applicant_status
            .can_transition(&record.space_id, &record.applicant_id, status)
            .await?;
        if !allowed {
            log::info!(
                "Applicant {} cannot move to {}; recruiting status left unchanged",
                record.applicant_id,
                status.as_str()
            );
            return Ok(());
        }

        let change = match status {
            RecruitingStatus::Accepted => {
                let stages = self
                    .ctx
                    .applicant_status
                    .selection_stages(&record.space_id, &record.vacancy_id)
                    .await?;
                let added = stages.into_iter().find(|s| s.kind == SelectionStageKind::Added);
                if added.is_none() {
                    log::warn!(
                        "Vacancy {} has no 'added' selection stage",
                        record.vacancy_id
                    );
                }
                StatusChange {
                    status,
                    selection_stage_id: added.map(|s| s.id),
                    rejected_at: None,
                }
            }
            RecruitingStatus::Rejected => StatusChange {
                status,
                selection_stage_id: None,
                rejected_at: Some(Utc::now()),
            },
        };

        let description = self
            .ctx
            .applicant_status
            .update_status(&record.space_id, &record.applicant_id, &change)
            .await?;

        let entry = HistoryEntry {
            space_id: record.space_id.clone(),
            applicant_id: record.applicant_id.clone(),
            vacancy_id: record.vacancy_id.clone(),
            actor_id: SYSTEM_ACTOR.to_string(),
            action_type: HISTORY_ACTION.to_string(),
            description,
        };
        if let Err(e) = self.ctx.history.save(&entry).await {
            log::error!(
                "Failed to write history for applicant {}: {}",
                record.applicant_id,
                e
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for FilterStage {
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, PipelineError> {
        let mut summary = TickSummary::default();
        for record in
            record_repo::list_by_status(&self.ctx.db, PipelineStatus::VideoSemanticEvaluated)?
        {
            if cancel.is_cancelled() {
                break;
            }
            let id = record.id.clone();
            let outcome = self.filter(record).await;
            summary.record(self.kind(), &id, outcome);
        }
        Ok(summary)
    }
}
