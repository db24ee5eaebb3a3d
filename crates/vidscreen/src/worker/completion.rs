//! Completion detection: `VideoTranscripted -> VideoSemanticEvaluated`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Stage, StageKind, TickSummary, WorkerContext};
use crate::db::{analysis_repo, record_repo};
use crate::pipeline::{PipelineError, PipelineRecord, PipelineStatus};

/// Advances a record once every script question has a scored analysis.
pub struct CompletionStage {
    ctx: WorkerContext,
}

impl CompletionStage {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    fn check(&self, record: &PipelineRecord) -> Result<bool, PipelineError> {
        let scored = analysis_repo::count_semantic_evaluated(&self.ctx.db, &record.id)?;
        let expected = record.question_count();
        if scored < expected {
            log::debug!(
                "Record {}: {}/{} answers scored",
                record.id,
                scored,
                expected
            );
            return Ok(false);
        }

        record_repo::transition(
            &self.ctx.db,
            &record.id,
            PipelineStatus::VideoTranscripted,
            PipelineStatus::VideoSemanticEvaluated,
        )?;
        Ok(true)
    }
}

#[async_trait]
impl Stage for CompletionStage {
    fn kind(&self) -> StageKind {
        StageKind::Completion
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, PipelineError> {
        let mut summary = TickSummary::default();
        for record in record_repo::list_by_status(&self.ctx.db, PipelineStatus::VideoTranscripted)? {
            if cancel.is_cancelled() {
                break;
            }
            summary.record(self.kind(), &record.id, self.check(&record));
        }
        Ok(summary)
    }
}
