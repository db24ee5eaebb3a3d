//! Applicant message delivery: chat channels first, then email.

use std::sync::Arc;

use super::{ApplicantProfile, EmailSender, MessagingChannel, OutboundMessage};

/// A message in both chat and email form.
#[derive(Debug, Clone, Copy)]
pub struct Letter<'a> {
    pub space_id: &'a str,
    pub applicant: &'a ApplicantProfile,
    pub text: &'a str,
    pub html: &'a str,
    pub subject: &'a str,
}

/// Tries every available chat channel in order, then email. The first
/// successful channel wins.
#[derive(Clone)]
pub struct Delivery {
    channels: Vec<Arc<dyn MessagingChannel>>,
    email: Option<Arc<dyn EmailSender>>,
    from: String,
}

impl Delivery {
    pub fn new(
        channels: Vec<Arc<dyn MessagingChannel>>,
        email: Option<Arc<dyn EmailSender>>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            channels,
            email,
            from: from.into(),
        }
    }

    /// Returns the name of the channel that delivered the letter, or `None`
    /// when every channel failed or none could reach the applicant.
    pub async fn deliver(&self, letter: &Letter<'_>) -> Option<String> {
        let applicant_id = letter.applicant.id.as_str();

        for channel in &self.channels {
            if !channel.is_available(letter.space_id, applicant_id).await {
                continue;
            }
            let message = OutboundMessage {
                applicant_id: applicant_id.to_string(),
                text: letter.text.to_string(),
            };
            match channel.send(letter.space_id, &message).await {
                Ok(()) => return Some(channel.name().to_string()),
                Err(e) => log::warn!(
                    "Delivery to applicant {} over {} failed: {}",
                    applicant_id,
                    channel.name(),
                    e
                ),
            }
        }

        let (Some(email), Some(to)) = (&self.email, letter.applicant.email.as_deref()) else {
            return None;
        };
        match email
            .send_html_email(&self.from, to, letter.html, letter.subject)
            .await
        {
            Ok(()) => Some("email".to_string()),
            Err(e) => {
                log::warn!("Email to applicant {} failed: {}", applicant_id, e);
                None
            }
        }
    }
}
