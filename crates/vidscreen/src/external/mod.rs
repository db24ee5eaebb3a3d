//! Interfaces of the services the pipeline consumes. The surrounding
//! application provides the implementations.

pub mod delivery;

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::AsyncRead;

pub use delivery::{Delivery, Letter};

/// Streamed file contents.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// Actor recorded in history entries written by the workers.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("{service} is unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A chat message to an applicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub applicant_id: String,
    pub text: String,
}

/// A chat channel (messenger integration) that can reach applicants.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the applicant can be reached over this channel.
    async fn is_available(&self, space_id: &str, applicant_id: &str) -> bool;

    async fn send(&self, space_id: &str, message: &OutboundMessage) -> Result<(), ExternalError>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_html_email(
        &self,
        from: &str,
        to: &str,
        html: &str,
        subject: &str,
    ) -> Result<(), ExternalError>;
}

/// Metadata of an object to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub space_id: String,
    pub name: String,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn get_object(&self, space_id: &str, file_id: &str) -> Result<ByteStream, ExternalError>;

    /// Stores `data` and returns the new file id.
    async fn upload_object(
        &self,
        info: &FileInfo,
        data: ByteStream,
        size: u64,
    ) -> Result<String, ExternalError>;
}

/// Recruiting decision written back to the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecruitingStatus {
    Accepted,
    Rejected,
}

impl RecruitingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecruitingStatus::Accepted => "accepted",
            RecruitingStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStageKind {
    /// The canonical stage applicants enter when they are accepted.
    Added,
    Screening,
    Interview,
    Offer,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionStage {
    pub id: String,
    pub name: String,
    pub kind: SelectionStageKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: RecruitingStatus,
    pub selection_stage_id: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
}

/// The applicant's own recruiting state machine.
#[async_trait]
pub trait ApplicantStatusService: Send + Sync {
    /// Whether the applicant's current status allows moving to `status`.
    async fn can_transition(
        &self,
        space_id: &str,
        applicant_id: &str,
        status: RecruitingStatus,
    ) -> Result<bool, ExternalError>;

    /// Applies the change and returns a human-readable description of it.
    async fn update_status(
        &self,
        space_id: &str,
        applicant_id: &str,
        change: &StatusChange,
    ) -> Result<String, ExternalError>;

    async fn selection_stages(
        &self,
        space_id: &str,
        vacancy_id: &str,
    ) -> Result<Vec<SelectionStage>, ExternalError>;
}

/// Audit-history entry of an applicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub space_id: String,
    pub applicant_id: String,
    pub vacancy_id: String,
    pub actor_id: String,
    pub action_type: String,
    pub description: String,
}

#[async_trait]
pub trait HistoryService: Send + Sync {
    async fn save(&self, entry: &HistoryEntry) -> Result<(), ExternalError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplicantProfile {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub resume: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VacancyProfile {
    pub id: String,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
}

/// Read access to applicant and vacancy data.
#[async_trait]
pub trait ApplicantDirectory: Send + Sync {
    async fn applicant(
        &self,
        space_id: &str,
        applicant_id: &str,
    ) -> Result<ApplicantProfile, ExternalError>;

    async fn vacancy(&self, space_id: &str, vacancy_id: &str)
        -> Result<VacancyProfile, ExternalError>;
}
