//! Fire-and-forget operator alerts with retry/skip actions.

use std::sync::Arc;

use super::{OperatorAlert, OperatorNotifier};

/// Sends stage failures to operators. Notification failures are logged
/// and never propagated.
#[derive(Clone)]
pub struct Escalation {
    notifier: Arc<dyn OperatorNotifier>,
    action_base_url: String,
}

impl Escalation {
    pub fn new(notifier: Arc<dyn OperatorNotifier>, action_base_url: impl Into<String>) -> Self {
        Self {
            notifier,
            action_base_url: action_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reports a failure that needs no operator action.
    pub async fn notify_result(&self, stage: &str, space_id: &str, applicant_id: &str, error: &str) {
        self.send(OperatorAlert {
            stage: stage.to_string(),
            space_id: space_id.to_string(),
            applicant_id: applicant_id.to_string(),
            error: error.to_string(),
            retry_link: None,
            skip_link: None,
        })
        .await;
    }

    /// Reports a failure the operator resolves by retrying or skipping.
    pub async fn notify_retryable(
        &self,
        stage: &str,
        space_id: &str,
        applicant_id: &str,
        error: &str,
        retry_link: &str,
        skip_link: &str,
    ) {
        self.send(OperatorAlert {
            stage: stage.to_string(),
            space_id: space_id.to_string(),
            applicant_id: applicant_id.to_string(),
            error: error.to_string(),
            retry_link: Some(retry_link.to_string()),
            skip_link: Some(skip_link.to_string()),
        })
        .await;
    }

    /// Retry and skip links for one question of a record.
    pub fn action_links(&self, record_id: &str, question_id: &str) -> (String, String) {
        let base = format!(
            "{}/pipeline/{}/questions/{}",
            self.action_base_url, record_id, question_id
        );
        (format!("{}/retry", base), format!("{}/skip", base))
    }

    async fn send(&self, alert: OperatorAlert) {
        if let Err(e) = self.notifier.notify(&alert).await {
            log::error!(
                "Failed to notify operators about {} for applicant {}: {}",
                alert.stage,
                alert.applicant_id,
                e
            );
        }
    }
}
