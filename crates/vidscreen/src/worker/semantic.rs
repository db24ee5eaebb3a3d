//! Semantic scoring of transcribed answers.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Stage, StageKind, TickSummary, WorkerContext};
use crate::db::{analysis_repo, record_repo};
use crate::pipeline::{PerQuestionAnalysis, PipelineError, PipelineRecord, PipelineStatus};

/// Scores every unscored analysis of transcribed records against the
/// question's expected answer. The status change is left to
/// [`CompletionStage`](super::CompletionStage).
pub struct SemanticStage {
    ctx: WorkerContext,
}

impl SemanticStage {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    async fn score(
        &self,
        record: &PipelineRecord,
        row: &PerQuestionAnalysis,
    ) -> Result<bool, PipelineError> {
        let question = record.script.as_ref().and_then(|s| s.question(&row.question_id));
        let similarity = match question {
            // Skipped by an operator after a failed analysis.
            _ if row.has_error() => 0.0,
            None => {
                log::warn!(
                    "Record {} has no question {}; scoring it 0",
                    record.id,
                    row.question_id
                );
                0.0
            }
            Some(question) => self.ctx.scorer.score(question, &row.transcript).await?,
        };

        analysis_repo::save_similarity(&self.ctx.db, &row.id, similarity)?;
        log::debug!(
            "Record {} question {} scored {:.1}",
            record.id,
            row.question_id,
            similarity
        );
        Ok(true)
    }
}

#[async_trait]
impl Stage for SemanticStage {
    fn kind(&self) -> StageKind {
        StageKind::Semantic
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, PipelineError> {
        let mut summary = TickSummary::default();
        for record in record_repo::list_by_status(&self.ctx.db, PipelineStatus::VideoTranscripted)? {
            for row in analysis_repo::list_unscored(&self.ctx.db, &record.id)? {
                if cancel.is_cancelled() {
                    return Ok(summary);
                }
                let outcome = self.score(&record, &row).await;
                summary.record(self.kind(), &row.id, outcome);
            }
        }
        Ok(summary)
    }
}
