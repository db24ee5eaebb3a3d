//! The AI client adapter: resumable upload → submit → await result.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::result::{AnalysisResult, ArtifactRef};
use super::session::{AiSession, AiSessionStore};
use super::transport::AnalysisTransport;
use super::AiError;
use crate::external::ByteStream;
use crate::lock::ExclusiveLock;

/// Supplies the video of one answer. Only opened when the video has not
/// been uploaded yet.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Returns the byte stream and a file name for the upload.
    async fn open(&self) -> Result<(ByteStream, String), AiError>;
}

/// The answer being analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTarget {
    pub record_id: String,
    pub applicant_id: String,
    pub question_id: String,
}

impl From<&AiSession> for AnalysisTarget {
    fn from(session: &AiSession) -> Self {
        Self {
            record_id: session.record_id.clone(),
            applicant_id: session.applicant_id.clone(),
            question_id: session.question_id.clone(),
        }
    }
}

/// Runs analysis jobs against the AI backend, persisting every handle in
/// the session store so an interrupted job can be resumed.
///
/// Callers must hold the [`ExclusiveLock`] under the owner tag they pass in.
pub struct AnalysisClient {
    transport: Arc<dyn AnalysisTransport>,
    sessions: AiSessionStore,
    lock: Arc<ExclusiveLock>,
}

impl AnalysisClient {
    pub fn new(
        transport: Arc<dyn AnalysisTransport>,
        sessions: AiSessionStore,
        lock: Arc<ExclusiveLock>,
    ) -> Self {
        Self {
            transport,
            sessions,
            lock,
        }
    }

    pub fn sessions(&self) -> &AiSessionStore {
        &self.sessions
    }

    /// Analyzes one video answer.
    ///
    /// A stored session for the same (record, question) is resumed: a stored
    /// upload handle skips the upload and a stored event id skips the submit.
    /// The session is deleted when the call finishes, except on cancellation
    /// where it is kept for a later resumption.
    pub async fn analyze(
        &self,
        cancel: &CancellationToken,
        owner: &str,
        target: &AnalysisTarget,
        video: &dyn VideoSource,
    ) -> Result<AnalysisResult, AiError> {
        if !self.lock.is_held_by(owner) {
            return Err(AiError::LockNotHeld {
                owner: owner.to_string(),
            });
        }

        let mut session = match self
            .sessions
            .find_for(&target.record_id, &target.question_id)?
        {
            Some(existing) => {
                log::info!(
                    "Resuming AI session {} for record {} question {}",
                    existing.id,
                    existing.record_id,
                    existing.question_id
                );
                existing
            }
            None => AiSession::new(&target.record_id, &target.question_id, &target.applicant_id),
        };

        let outcome = self.run(cancel, &mut session, video).await;
        match &outcome {
            Err(e) if e.is_cancelled() => {
                log::info!("AI session {} kept for resumption: {}", session.id, e);
            }
            Err(e) if e.is_unfinished_request() => {}
            _ => {
                if let Err(e) = self.sessions.delete(&session.id) {
                    log::error!("Failed to delete AI session {}: {}", session.id, e);
                }
            }
        }
        outcome
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        session: &mut AiSession,
        video: &dyn VideoSource,
    ) -> Result<AnalysisResult, AiError> {
        session.id = self
            .sessions
            .save(session)
            .map_err(|e| AiError::from(e).at("save session"))?;

        let video_path = match session.video_path.clone() {
            Some(path) => path,
            None => {
                let (stream, file_name) = cancellable(cancel, video.open())
                    .await
                    .map_err(|e| e.at("open video"))?;
                let path = cancellable(cancel, self.transport.upload(&file_name, stream))
                    .await
                    .map_err(|e| e.at("upload"))?;
                log::debug!("Uploaded {} as {}", file_name, path);
                session.video_path = Some(path.clone());
                self.sessions
                    .save(session)
                    .map_err(|e| AiError::from(e).at("save session"))?;
                path
            }
        };

        let event_id = match session.event_id.clone() {
            Some(id) => id,
            None => {
                let id = cancellable(cancel, self.transport.submit(&video_path))
                    .await
                    .map_err(|e| e.at("submit"))?;
                session.event_id = Some(id.clone());
                self.sessions
                    .save(session)
                    .map_err(|e| AiError::from(e).at("save session"))?;
                id
            }
        };

        let payload = cancellable(cancel, self.transport.await_result(&event_id))
            .await
            .map_err(|e| e.at("await result"))?;
        AnalysisResult::from_payload(&payload).map_err(|e| e.at("decode result"))
    }

    /// Fetches an artifact of a finished job.
    pub async fn download(
        &self,
        cancel: &CancellationToken,
        artifact: &ArtifactRef,
    ) -> Result<Vec<u8>, AiError> {
        cancellable(cancel, self.transport.download(artifact)).await
    }
}

async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, AiError>
where
    F: Future<Output = Result<T, AiError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AiError::Cancelled),
        result = fut => result,
    }
}
