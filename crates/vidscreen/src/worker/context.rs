//! Everything a stage worker needs, wired from the configuration.

use std::sync::Arc;

use chrono::Duration;

use crate::ai::{AiSessionStore, AnalysisClient, AnalysisTransport, HttpTransport};
use crate::config::{resolve_llm_api_key, Config, MailConfig, ScorerKind, SurveyConfig};
use crate::db::Database;
use crate::error::Result;
use crate::external::{
    ApplicantDirectory, ApplicantStatusService, Delivery, EmailSender, HistoryService,
    MessagingChannel, ObjectStorage,
};
use crate::llm::{
    AnswerScorer, ChatCompletionsClient, LexicalScorer, LlmAnswerScorer, LlmClient,
    ReportWriter, ScriptGenerator,
};
use crate::lock::ExclusiveLock;
use crate::notify::{Escalation, LogNotifier, OperatorNotifier, WebhookNotifier};
use crate::pipeline::RetryPolicy;

/// Services provided by the surrounding application.
#[derive(Clone)]
pub struct Collaborators {
    pub channels: Vec<Arc<dyn MessagingChannel>>,
    pub email: Option<Arc<dyn EmailSender>>,
    pub storage: Arc<dyn ObjectStorage>,
    pub directory: Arc<dyn ApplicantDirectory>,
    pub applicant_status: Arc<dyn ApplicantStatusService>,
    pub history: Arc<dyn HistoryService>,
}

/// Remote backends the pipeline talks to.
#[derive(Clone)]
pub struct Backends {
    pub transport: Arc<dyn AnalysisTransport>,
    pub llm: Arc<dyn LlmClient>,
    pub notifier: Arc<dyn OperatorNotifier>,
}

impl Backends {
    /// HTTP backends as configured. Without a webhook URL operator alerts
    /// only go to the log.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.ai_backend)?;
        let api_key = resolve_llm_api_key(&config.llm)?;
        let llm = ChatCompletionsClient::new(&config.llm, api_key)?;
        let notifier: Arc<dyn OperatorNotifier> = match &config.notifications.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
            None => {
                log::warn!("No notification webhook configured; operator alerts go to the log");
                Arc::new(LogNotifier)
            }
        };
        Ok(Self {
            transport: Arc::new(transport),
            llm: Arc::new(llm),
            notifier,
        })
    }
}

/// Shared state of all stage workers. Cloning is cheap.
#[derive(Clone)]
pub struct WorkerContext {
    pub db: Database,
    pub lock: Arc<ExclusiveLock>,
    pub ai: Arc<AnalysisClient>,
    pub scripts: Arc<ScriptGenerator>,
    pub scorer: Arc<dyn AnswerScorer>,
    pub reports: Arc<ReportWriter>,
    pub delivery: Delivery,
    pub storage: Arc<dyn ObjectStorage>,
    pub directory: Arc<dyn ApplicantDirectory>,
    pub applicant_status: Arc<dyn ApplicantStatusService>,
    pub history: Arc<dyn HistoryService>,
    pub escalation: Escalation,
    pub retry_policy: RetryPolicy,
    pub mail: MailConfig,
    pub survey: SurveyConfig,
}

impl WorkerContext {
    /// Wires the context with the configured HTTP backends.
    pub fn build(config: &Config, db: Database, collaborators: Collaborators) -> Result<Self> {
        let backends = Backends::from_config(config)?;
        Ok(Self::with_backends(config, db, collaborators, backends))
    }

    pub fn with_backends(
        config: &Config,
        db: Database,
        collaborators: Collaborators,
        backends: Backends,
    ) -> Self {
        let lock = Arc::new(ExclusiveLock::new());
        let ai = AnalysisClient::new(
            backends.transport,
            AiSessionStore::new(db.clone()),
            Arc::clone(&lock),
        );
        let scorer: Arc<dyn AnswerScorer> = match config.scoring.scorer {
            ScorerKind::Llm => Arc::new(LlmAnswerScorer::new(Arc::clone(&backends.llm))),
            ScorerKind::Lexical => Arc::new(LexicalScorer::default()),
        };

        Self {
            db,
            lock,
            ai: Arc::new(ai),
            scripts: Arc::new(ScriptGenerator::new(Arc::clone(&backends.llm))),
            scorer,
            reports: Arc::new(ReportWriter::new(backends.llm)),
            delivery: Delivery::new(
                collaborators.channels,
                collaborators.email,
                config.mail.from.clone(),
            ),
            storage: collaborators.storage,
            directory: collaborators.directory,
            applicant_status: collaborators.applicant_status,
            history: collaborators.history,
            escalation: Escalation::new(
                backends.notifier,
                config.notifications.action_base_url.clone(),
            ),
            retry_policy: RetryPolicy {
                cooldown: Duration::minutes(i64::from(config.retry.cooldown_minutes)),
                max_auto_retries: config.retry.max_auto_retries,
            },
            mail: config.mail.clone(),
            survey: config.survey.clone(),
        }
    }
}
