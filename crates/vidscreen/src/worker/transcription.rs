//! Transcription and analysis of video answers: `VideoSuggestSent ->
//! VideoTranscripted`.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::{Stage, StageKind, TickSummary, WorkerContext};
use crate::ai::{AiError, AiSession, AnalysisResult, AnalysisTarget, ArtifactKind, VideoSource};
use crate::db::{analysis_repo, record_repo};
use crate::external::{ByteStream, FileInfo, ObjectStorage};
use crate::pipeline::{
    PerQuestionAnalysis, PipelineError, PipelineRecord, PipelineStatus, RetryDecision, VideoStatus,
};

/// Owner tag of the AI lock while this stage talks to the backend.
pub const LOCK_OWNER: &str = "transcription";

/// A video answer read from object storage.
struct StoredVideo {
    storage: Arc<dyn ObjectStorage>,
    space_id: String,
    file_id: String,
}

#[async_trait]
impl VideoSource for StoredVideo {
    async fn open(&self) -> Result<(ByteStream, String), AiError> {
        let stream = self
            .storage
            .get_object(&self.space_id, &self.file_id)
            .await
            .map_err(|e| AiError::Video(e.to_string()))?;
        Ok((stream, format!("{}.mp4", self.file_id)))
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn is_cancelled(err: &PipelineError) -> bool {
    matches!(err, PipelineError::Ai(e) if e.is_cancelled())
}

/// Sends every unresolved video answer through the AI backend, one at a
/// time under the AI lock, and applies the retry policy to failed ones.
pub struct TranscriptionStage {
    ctx: WorkerContext,
}

impl TranscriptionStage {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Whether the record's videos are uploaded and awaiting analysis.
    fn is_eligible(record: &PipelineRecord) -> bool {
        record.status == PipelineStatus::VideoSuggestSent
            && matches!(
                record.video_interview.status,
                VideoStatus::Ready | VideoStatus::Processing | VideoStatus::Error
            )
    }

    /// Resumes sessions left behind by an interrupted run. A session that
    /// no longer matches an analyzable answer is discarded.
    async fn resume_orphans(
        &self,
        cancel: &CancellationToken,
        summary: &mut TickSummary,
    ) -> Result<(), PipelineError> {
        for session in self.ctx.ai.sessions().get_all()? {
            if cancel.is_cancelled() {
                break;
            }
            let record = record_repo::find_by_id(&self.ctx.db, &session.record_id)?;
            let Some(record) = record.filter(|r| Self::is_orphan_resumable(r, &session)) else {
                log::warn!(
                    "Discarding stale AI session {} for record {} question {}",
                    session.id,
                    session.record_id,
                    session.question_id
                );
                self.ctx.ai.sessions().delete(&session.id)?;
                continue;
            };

            log::info!(
                "Resuming orphaned AI session {} for record {} question {}",
                session.id,
                session.record_id,
                session.question_id
            );
            let existing =
                analysis_repo::find(&self.ctx.db, &record.id, &session.question_id)?;
            let outcome = self
                .analyze(cancel, &record, &session.question_id, existing)
                .await
                .map(|_| false);
            summary.record(StageKind::Transcription, &session.id, outcome);
        }
        Ok(())
    }

    fn is_orphan_resumable(record: &PipelineRecord, session: &AiSession) -> bool {
        Self::is_eligible(record)
            && record.question_ids().contains(&session.question_id.as_str())
            && record
                .video_interview
                .answers
                .contains_key(&session.question_id)
    }

    async fn process(
        &self,
        cancel: &CancellationToken,
        mut record: PipelineRecord,
    ) -> Result<bool, PipelineError> {
        if record.video_interview.status == VideoStatus::Ready {
            record.video_interview.status = VideoStatus::Processing;
            record_repo::update_data(&self.ctx.db, &record)?;
        }

        for question_id in record.question_ids() {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            let existing = analysis_repo::find(&self.ctx.db, &record.id, question_id)?;
            let decision = match &existing {
                None => RetryDecision::Retry,
                Some(row) => self.ctx.retry_policy.decide(row, Utc::now()),
            };

            match (decision, existing) {
                (RetryDecision::Retry, existing) => {
                    match self.analyze(cancel, &record, question_id, existing).await {
                        Err(e) if is_cancelled(&e) => return Ok(false),
                        other => other?,
                    }
                }
                (RetryDecision::Escalate, Some(row)) => self.escalate(&record, &row).await?,
                (decision, _) => {
                    log::debug!(
                        "Record {} question {}: {:?}",
                        record.id,
                        question_id,
                        decision
                    );
                }
            }
        }

        let analyses = analysis_repo::list_by_record(&self.ctx.db, &record.id)?;
        let all_resolved = record.question_ids().iter().all(|qid| {
            analyses
                .iter()
                .any(|a| a.question_id == *qid && a.is_resolved())
        });
        if !all_resolved {
            return Ok(false);
        }

        record.video_interview.status = VideoStatus::Ready;
        record.status = PipelineStatus::VideoTranscripted;
        record_repo::save_with_transition(
            &self.ctx.db,
            &record,
            PipelineStatus::VideoSuggestSent,
        )?;
        log::info!("All video answers of record {} transcribed", record.id);
        Ok(true)
    }

    /// Runs one analysis attempt under the AI lock and stores the outcome
    /// on the question's row. A failed attempt is recorded, not returned.
    async fn analyze(
        &self,
        cancel: &CancellationToken,
        record: &PipelineRecord,
        question_id: &str,
        existing: Option<PerQuestionAnalysis>,
    ) -> Result<(), PipelineError> {
        let answer = record
            .video_interview
            .answers
            .get(question_id)
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "record '{}' has no video for question '{}'",
                    record.id, question_id
                ))
            })?;

        let Some(_guard) = self.ctx.lock.lock(cancel, LOCK_OWNER).await else {
            return Err(AiError::Cancelled.into());
        };

        let source = StoredVideo {
            storage: Arc::clone(&self.ctx.storage),
            space_id: record.space_id.clone(),
            file_id: answer.file_id.clone(),
        };
        let target = AnalysisTarget {
            record_id: record.id.clone(),
            applicant_id: record.applicant_id.clone(),
            question_id: question_id.to_string(),
        };

        let first_attempt = existing.is_none();
        let mut row =
            existing.unwrap_or_else(|| PerQuestionAnalysis::new(&record.id, question_id));
        if row.manual_retry {
            analysis_repo::clear_manual_retry(&self.ctx.db, &row.id)?;
        }

        let span = info_span!("analyze", record = %record.id, question = %question_id);
        let outcome = self
            .ctx
            .ai
            .analyze(cancel, LOCK_OWNER, &target, &source)
            .instrument(span)
            .await;

        match outcome {
            Ok(result) => {
                self.store_artifacts(cancel, record, &mut row, &result).await;
                row.record_success(result.text, Utc::now());
                analysis_repo::save_attempt(&self.ctx.db, &row)?;
                log::info!("Transcribed record {} question {}", record.id, question_id);
                Ok(())
            }
            Err(e) if e.is_cancelled() => Err(e.into()),
            Err(e) => {
                log::warn!(
                    "Analysis of record {} question {} failed: {}",
                    record.id,
                    question_id,
                    e
                );
                row.record_failure(e.to_string(), Utc::now(), first_attempt);
                analysis_repo::save_attempt(&self.ctx.db, &row)?;
                Ok(())
            }
        }
    }

    /// Copies the result's artifacts into object storage. An artifact that
    /// cannot be copied leaves its slot empty.
    async fn store_artifacts(
        &self,
        cancel: &CancellationToken,
        record: &PipelineRecord,
        row: &mut PerQuestionAnalysis,
        result: &AnalysisResult,
    ) {
        for kind in ArtifactKind::ALL {
            let Some(artifact) = result.artifact(kind) else {
                continue;
            };
            let bytes = match self.ctx.ai.download(cancel, artifact).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!(
                        "Failed to download {} artifact of record {}: {}",
                        kind.as_str(),
                        record.id,
                        e
                    );
                    continue;
                }
            };

            let info = FileInfo {
                space_id: record.space_id.clone(),
                name: format!(
                    "{}-{}-{}-{}",
                    record.id,
                    row.question_id,
                    kind.as_str(),
                    artifact.file_name()
                ),
                content_type: content_type_for(artifact.file_name()).to_string(),
            };
            let size = bytes.len() as u64;
            let stream: ByteStream = Box::pin(Cursor::new(bytes));
            match self.ctx.storage.upload_object(&info, stream, size).await {
                Ok(file_id) => *row.artifact_slot(kind) = Some(file_id),
                Err(e) => log::warn!(
                    "Failed to store {} artifact of record {}: {}",
                    kind.as_str(),
                    record.id,
                    e
                ),
            }
        }
    }

    /// Hands a failure that exhausted its automatic retries to operators.
    async fn escalate(
        &self,
        record: &PipelineRecord,
        row: &PerQuestionAnalysis,
    ) -> Result<(), PipelineError> {
        let (retry_link, skip_link) = self.ctx.escalation.action_links(&record.id, &row.question_id);
        self.ctx
            .escalation
            .notify_retryable(
                StageKind::Transcription.as_str(),
                &record.space_id,
                &record.applicant_id,
                &row.error,
                &retry_link,
                &skip_link,
            )
            .await;
        analysis_repo::mark_escalated(&self.ctx.db, &row.id)?;

        let mut record = record.clone();
        record.video_interview.status = VideoStatus::Error;
        record_repo::update_data(&self.ctx.db, &record)?;
        log::warn!(
            "Escalated failed analysis of record {} question {} after {} retries",
            record.id,
            row.question_id,
            row.retry_count
        );
        Ok(())
    }
}

#[async_trait]
impl Stage for TranscriptionStage {
    fn kind(&self) -> StageKind {
        StageKind::Transcription
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, PipelineError> {
        let mut summary = TickSummary::default();
        self.resume_orphans(cancel, &mut summary).await?;

        for record in record_repo::list_by_status(&self.ctx.db, PipelineStatus::VideoSuggestSent)? {
            if cancel.is_cancelled() {
                break;
            }
            if !Self::is_eligible(&record) {
                continue;
            }
            let id = record.id.clone();
            let outcome = self.process(cancel, record).await;
            summary.record(self.kind(), &id, outcome);
        }
        Ok(summary)
    }
}
