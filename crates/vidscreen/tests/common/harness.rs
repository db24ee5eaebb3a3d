//! Test harness wiring the workers over an in-memory database.

use std::sync::Arc;

use chrono::{Duration, Utc};

use vidscreen::config::{load_config_from_str, Config};
use vidscreen::db::{analysis_repo, record_repo, Database};
use vidscreen::external::{Delivery, EmailSender, MessagingChannel};
use vidscreen::pipeline::{
    InterviewScript, PerQuestionAnalysis, PipelineRecord, PipelineService, PipelineStatus,
    ScriptQuestion, VideoAnswer, VideoStatus,
};
use vidscreen::worker::{Backends, Collaborators, WorkerContext};

use super::fakes::*;

pub const BASE_CONFIG: &str = r#"{
    "version": "1.0",
    "ai_backend": { "base_url": "http://ai.invalid" },
    "llm": { "base_url": "http://llm.invalid", "model": "test-model" },
    "scoring": { "scorer": "lexical", "default_threshold": 60 },
    "notifications": { "action_base_url": "https://ops.example.com" },
    "mail": { "from": "hr@example.com", "portal_url": "https://jobs.example.com" },
    "survey": {
        "questions": [
            { "id": "relocate", "text": "Ready to relocate?", "options": ["yes", "no"], "reject_on": ["no"] },
            { "id": "experience", "text": "Years of experience?" }
        ]
    }
}"#;

/// Test harness giving access to the context and every fake behind it.
pub struct TestHarness {
    pub config: Config,
    pub db: Database,
    pub ctx: WorkerContext,
    pub transport: Arc<FakeTransport>,
    pub llm: Arc<ScriptedLlm>,
    pub notifier: Arc<RecordingNotifier>,
    pub storage: Arc<MemoryStorage>,
    pub channel: Arc<FakeChannel>,
    pub email: Arc<FakeEmail>,
    pub status: Arc<FakeStatusService>,
    pub history: Arc<FakeHistory>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(BASE_CONFIG)
    }

    pub fn with_config(json: &str) -> Self {
        let config = load_config_from_str(json).expect("test config must be valid");
        let db = Database::open_in_memory().expect("Failed to open in-memory database");

        let transport = Arc::new(FakeTransport::default());
        let llm = Arc::new(ScriptedLlm::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let storage = Arc::new(MemoryStorage::default());
        let channel = Arc::new(FakeChannel::default());
        let email = Arc::new(FakeEmail::default());
        let status = Arc::new(FakeStatusService::default());
        let history = Arc::new(FakeHistory::default());

        let collaborators = fake_collaborators(&channel, &email, &storage, &status, &history);
        let backends = Backends {
            transport: transport.clone(),
            llm: llm.clone(),
            notifier: notifier.clone(),
        };
        let ctx = WorkerContext::with_backends(&config, db.clone(), collaborators, backends);

        Self {
            config,
            db,
            ctx,
            transport,
            llm,
            notifier,
            storage,
            channel,
            email,
            status,
            history,
        }
    }

    /// A fresh set of collaborators sharing this harness's fakes.
    pub fn collaborators(&self) -> Collaborators {
        fake_collaborators(
            &self.channel,
            &self.email,
            &self.storage,
            &self.status,
            &self.history,
        )
    }

    pub fn service(&self) -> PipelineService {
        PipelineService::new(
            self.db.clone(),
            self.ctx.delivery.clone(),
            self.ctx.directory.clone(),
            self.config.survey.clone(),
            self.config.mail.clone(),
            self.config.scoring.default_threshold,
        )
    }

    pub fn record(&self, id: &str) -> PipelineRecord {
        record_repo::find_by_id(&self.db, id)
            .unwrap()
            .expect("record should exist")
    }

    pub fn analysis(&self, record_id: &str, question_id: &str) -> Option<PerQuestionAnalysis> {
        analysis_repo::find(&self.db, record_id, question_id).unwrap()
    }

    /// Inserts a record in `status` with a script of the given
    /// (question id, expected answer) pairs.
    pub fn seed_record(
        &self,
        applicant_id: &str,
        status: PipelineStatus,
        questions: &[(&str, &str)],
    ) -> PipelineRecord {
        let mut record = PipelineRecord::new("space-1", applicant_id, "vacancy-1", 60.0);
        record.status = status;
        if !questions.is_empty() {
            record.script = Some(InterviewScript {
                intro: "Welcome to the interview".into(),
                outro: "Thank you".into(),
                comment: String::new(),
                questions: questions
                    .iter()
                    .map(|(id, expected)| ScriptQuestion {
                        id: id.to_string(),
                        text: format!("Question {}", id),
                        kind: Default::default(),
                        options: vec![],
                        expected_answer: expected.to_string(),
                    })
                    .collect(),
            });
        }
        record_repo::insert(&self.db, &record).unwrap();
        record
    }

    /// A `VideoSuggestSent` record whose videos are uploaded and stored.
    pub fn seed_uploaded(&self, applicant_id: &str, questions: &[&str]) -> PipelineRecord {
        let pairs: Vec<(&str, &str)> = questions.iter().map(|q| (*q, "")).collect();
        let mut record = self.seed_record(applicant_id, PipelineStatus::VideoSuggestSent, &pairs);
        for q in questions {
            let file_id = format!("video-{}-{}", applicant_id, q);
            self.storage.put(&file_id, b"fake video bytes");
            record
                .video_interview
                .answers
                .insert(q.to_string(), VideoAnswer { file_id });
        }
        record.video_interview.status = VideoStatus::Ready;
        record.video_interview.start_time = Some(Utc::now());
        record_repo::update_data(&self.db, &record).unwrap();
        record
    }

    /// Stores a failed analysis row.
    pub fn seed_failure(
        &self,
        record_id: &str,
        question_id: &str,
        retry_count: u32,
        minutes_ago: i64,
    ) -> PerQuestionAnalysis {
        let mut row = PerQuestionAnalysis::new(record_id, question_id);
        row.error = "AI backend returned 502 during upload".into();
        row.retry_count = retry_count;
        row.last_attempt_at = Utc::now() - Duration::minutes(minutes_ago);
        analysis_repo::upsert(&self.db, &row).unwrap();
        row
    }

    /// Stores a scored analysis row.
    pub fn seed_scored(&self, record_id: &str, question_id: &str, similarity: f64) {
        let mut row = PerQuestionAnalysis::new(record_id, question_id);
        row.transcript = format!("answer to {}", question_id);
        row.is_semantic_evaluated = true;
        row.similarity = similarity;
        analysis_repo::upsert(&self.db, &row).unwrap();
    }
}

fn fake_collaborators(
    channel: &Arc<FakeChannel>,
    email: &Arc<FakeEmail>,
    storage: &Arc<MemoryStorage>,
    status: &Arc<FakeStatusService>,
    history: &Arc<FakeHistory>,
) -> Collaborators {
    let channels: Vec<Arc<dyn MessagingChannel>> = vec![channel.clone()];
    let email_sender: Arc<dyn EmailSender> = email.clone();
    Collaborators {
        channels,
        email: Some(email_sender),
        storage: storage.clone(),
        directory: Arc::new(FakeDirectory),
        applicant_status: status.clone(),
        history: history.clone(),
    }
}
