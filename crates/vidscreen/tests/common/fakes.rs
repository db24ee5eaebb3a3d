//! In-memory stand-ins for the services the pipeline consumes.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::sync::Notify;

use vidscreen::ai::{AiError, AnalysisTransport, ArtifactRef};
use vidscreen::external::{
    ApplicantDirectory, ApplicantProfile, ApplicantStatusService, ByteStream, EmailSender,
    ExternalError, FileInfo, HistoryEntry, HistoryService, MessagingChannel, ObjectStorage,
    OutboundMessage, RecruitingStatus, SelectionStage, SelectionStageKind, StatusChange,
    VacancyProfile,
};
use vidscreen::llm::{LlmClient, LlmError};
use vidscreen::notify::{NotifyError, OperatorAlert, OperatorNotifier};

/// AI backend returning one canned transcript.
pub struct FakeTransport {
    pub transcript: Mutex<String>,
    /// Remote error message returned instead of a result.
    pub remote_error: Mutex<Option<String>>,
    /// Never answers `await_result`.
    pub hang: AtomicBool,
    /// Holds `await_result` until `gate` is notified; `entered` fires when a
    /// call starts waiting.
    pub gated: AtomicBool,
    pub gate: Notify,
    pub entered: Notify,
    pub with_artifacts: AtomicBool,
    pub uploads: Mutex<Vec<String>>,
    pub submits: Mutex<Vec<String>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            transcript: Mutex::new("I designed database schemas and wrote Rust services".into()),
            remote_error: Mutex::new(None),
            hang: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
            entered: Notify::new(),
            with_artifacts: AtomicBool::new(true),
            uploads: Mutex::new(Vec::new()),
            submits: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTransport {
    pub fn fail_with(&self, message: &str) {
        *self.remote_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.remote_error.lock().unwrap() = None;
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn submit_count(&self) -> usize {
        self.submits.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisTransport for FakeTransport {
    async fn upload(&self, file_name: &str, mut video: ByteStream) -> Result<String, AiError> {
        let mut bytes = Vec::new();
        video
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| AiError::Video(e.to_string()))?;
        self.uploads.lock().unwrap().push(file_name.to_string());
        Ok(format!("/tmp/gradio/{}", file_name))
    }

    async fn submit(&self, video_path: &str) -> Result<String, AiError> {
        let mut submits = self.submits.lock().unwrap();
        submits.push(video_path.to_string());
        Ok(format!("event-{}", submits.len()))
    }

    async fn await_result(&self, _event_id: &str) -> Result<Value, AiError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.notified().await;
        }
        if let Some(message) = self.remote_error.lock().unwrap().clone() {
            return Err(AiError::Remote(message));
        }
        let text = self.transcript.lock().unwrap().clone();
        if self.with_artifacts.load(Ordering::SeqCst) {
            Ok(json!([
                text,
                "/tmp/gradio/voice.png",
                {"url": "http://ai.invalid/file=/tmp/gradio/frames.png"},
                {"path": "/tmp/gradio/emotions.png"},
                null
            ]))
        } else {
            Ok(json!([text]))
        }
    }

    async fn download(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, AiError> {
        Ok(format!("image:{}", artifact.file_name()).into_bytes())
    }
}

/// Language model answering from a queue of canned responses.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, String>>>,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn respond(&self, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(response.to_string()));
    }

    pub fn fail(&self, status: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(status.to_string()));
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(body)) => Err(LlmError::Status { status: 503, body }),
            None => Err(LlmError::EmptyResponse),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<OperatorAlert>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<OperatorAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperatorNotifier for RecordingNotifier {
    async fn notify(&self, alert: &OperatorAlert) -> Result<(), NotifyError> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Object storage keeping everything in memory.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (FileInfo, Vec<u8>)>>,
    next_id: AtomicUsize,
}

impl MemoryStorage {
    pub fn put(&self, file_id: &str, bytes: &[u8]) {
        let info = FileInfo {
            space_id: "space-1".into(),
            name: format!("{}.mp4", file_id),
            content_type: "video/mp4".into(),
        };
        self.objects
            .lock()
            .unwrap()
            .insert(file_id.to_string(), (info, bytes.to_vec()));
    }

    pub fn get(&self, file_id: &str) -> Option<(FileInfo, Vec<u8>)> {
        self.objects.lock().unwrap().get(file_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn get_object(&self, _space_id: &str, file_id: &str) -> Result<ByteStream, ExternalError> {
        let bytes = self
            .get(file_id)
            .map(|(_, bytes)| bytes)
            .ok_or_else(|| ExternalError::NotFound(file_id.to_string()))?;
        let stream: ByteStream = Box::pin(Cursor::new(bytes));
        Ok(stream)
    }

    async fn upload_object(
        &self,
        info: &FileInfo,
        mut data: ByteStream,
        size: u64,
    ) -> Result<String, ExternalError> {
        let mut bytes = Vec::new();
        data.read_to_end(&mut bytes).await?;
        assert_eq!(bytes.len() as u64, size, "declared size must match the stream");

        let id = format!("stored-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.objects
            .lock()
            .unwrap()
            .insert(id.clone(), (info.clone(), bytes));
        Ok(id)
    }
}

pub struct FakeChannel {
    pub available: AtomicBool,
    pub fails: AtomicBool,
    pub sent: Mutex<Vec<OutboundMessage>>,
}

impl Default for FakeChannel {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            fails: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MessagingChannel for FakeChannel {
    fn name(&self) -> &str {
        "chat"
    }

    async fn is_available(&self, _space_id: &str, _applicant_id: &str) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn send(&self, _space_id: &str, message: &OutboundMessage) -> Result<(), ExternalError> {
        if self.fails.load(Ordering::SeqCst) {
            return Err(ExternalError::Unavailable {
                service: "chat",
                message: "bot is offline".into(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEmail {
    pub fails: AtomicBool,
    /// (to, subject) of every sent email.
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl EmailSender for FakeEmail {
    async fn send_html_email(
        &self,
        _from: &str,
        to: &str,
        _html: &str,
        subject: &str,
    ) -> Result<(), ExternalError> {
        if self.fails.load(Ordering::SeqCst) {
            return Err(ExternalError::Unavailable {
                service: "smtp",
                message: "connection refused".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDirectory;

#[async_trait]
impl ApplicantDirectory for FakeDirectory {
    async fn applicant(
        &self,
        _space_id: &str,
        applicant_id: &str,
    ) -> Result<ApplicantProfile, ExternalError> {
        Ok(ApplicantProfile {
            id: applicant_id.to_string(),
            name: format!("Applicant {}", applicant_id),
            email: Some(format!("{}@example.com", applicant_id)),
            resume: "Five years of backend development".into(),
        })
    }

    async fn vacancy(&self, _space_id: &str, vacancy_id: &str) -> Result<VacancyProfile, ExternalError> {
        Ok(VacancyProfile {
            id: vacancy_id.to_string(),
            title: "Backend engineer".into(),
            description: "Build data services".into(),
            requirements: vec!["Rust".into(), "SQL".into()],
        })
    }
}

pub struct FakeStatusService {
    pub allow: AtomicBool,
    pub fail_update: AtomicBool,
    pub panic_update: AtomicBool,
    pub changes: Mutex<Vec<(String, StatusChange)>>,
}

impl Default for FakeStatusService {
    fn default() -> Self {
        Self {
            allow: AtomicBool::new(true),
            fail_update: AtomicBool::new(false),
            panic_update: AtomicBool::new(false),
            changes: Mutex::new(Vec::new()),
        }
    }
}

impl FakeStatusService {
    pub fn changes(&self) -> Vec<(String, StatusChange)> {
        self.changes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApplicantStatusService for FakeStatusService {
    async fn can_transition(
        &self,
        _space_id: &str,
        _applicant_id: &str,
        _status: RecruitingStatus,
    ) -> Result<bool, ExternalError> {
        Ok(self.allow.load(Ordering::SeqCst))
    }

    async fn update_status(
        &self,
        _space_id: &str,
        applicant_id: &str,
        change: &StatusChange,
    ) -> Result<String, ExternalError> {
        if self.panic_update.load(Ordering::SeqCst) {
            panic!("status service crashed");
        }
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(ExternalError::Unavailable {
                service: "applicants",
                message: "status service down".into(),
            });
        }
        self.changes
            .lock()
            .unwrap()
            .push((applicant_id.to_string(), change.clone()));
        Ok(format!("Status changed to {}", change.status.as_str()))
    }

    async fn selection_stages(
        &self,
        _space_id: &str,
        _vacancy_id: &str,
    ) -> Result<Vec<SelectionStage>, ExternalError> {
        Ok(vec![
            SelectionStage {
                id: "stage-screening".into(),
                name: "Screening".into(),
                kind: SelectionStageKind::Screening,
            },
            SelectionStage {
                id: "stage-added".into(),
                name: "Added".into(),
                kind: SelectionStageKind::Added,
            },
        ])
    }
}

#[derive(Default)]
pub struct FakeHistory {
    pub entries: Mutex<Vec<HistoryEntry>>,
}

impl FakeHistory {
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryService for FakeHistory {
    async fn save(&self, entry: &HistoryEntry) -> Result<(), ExternalError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
