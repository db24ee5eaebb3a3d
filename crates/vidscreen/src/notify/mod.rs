//! Operator notifications for stage failures.

pub mod escalation;
pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use escalation::Escalation;
pub use webhook::WebhookNotifier;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// An alert for the operators of a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorAlert {
    pub stage: String,
    pub space_id: String,
    pub applicant_id: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_link: Option<String>,
}

/// Channel that reaches operators.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, alert: &OperatorAlert) -> Result<(), NotifyError>;
}

/// Writes alerts to the log only. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl OperatorNotifier for LogNotifier {
    async fn notify(&self, alert: &OperatorAlert) -> Result<(), NotifyError> {
        log::warn!(
            "[{}] applicant {} in space {}: {}",
            alert.stage,
            alert.applicant_id,
            alert.space_id,
            alert.error
        );
        if let (Some(retry), Some(skip)) = (&alert.retry_link, &alert.skip_link) {
            log::warn!("[{}] retry: {} skip: {}", alert.stage, retry, skip);
        }
        Ok(())
    }
}
