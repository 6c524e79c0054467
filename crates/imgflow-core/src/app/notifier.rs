//! Notifier - 確認 / 却下メールの組み立てと送信

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::MailSettings;
use crate::ports::{Mailer, OutboundMail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientRole {
    Confirmation,
    Rejection,
}

impl RecipientRole {
    pub fn subject(self) -> &'static str {
        match self {
            RecipientRole::Confirmation => "New Image Upload",
            RecipientRole::Rejection => "New image Upload Failed",
        }
    }
}

impl fmt::Display for RecipientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientRole::Confirmation => f.write_str("confirmation"),
            RecipientRole::Rejection => f.write_str("rejection"),
        }
    }
}

pub fn confirmation_message(bucket: &str, object_key: &str) -> String {
    format!("We received your image. Its URL is s3://{bucket}/{object_key}")
}

pub fn rejection_message(bucket: &str, object_key: &str) -> String {
    format!("The image {object_key} that was sent to {bucket} was not of format .jpg or .png")
}

/// For dead-lettered uploads the classifier would have accepted.
pub fn unprocessable_message(bucket: &str, object_key: &str) -> String {
    format!("The image {object_key} that was sent to {bucket} could not be processed")
}

/// The message is substituted as-is.
pub fn html_body(message: &str) -> String {
    format!(r#"<html><body><p style="font-size:18px">{message}</p></body></html>"#)
}

/// Sends fixed-recipient notifications through a [`Mailer`].
///
/// `notify` never fails: a transport error is logged and reported as `false`
/// so that callers cannot turn a lost mail into a redelivery.
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    to: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn from_settings(mailer: Arc<dyn Mailer>, settings: &MailSettings) -> Self {
        Self::new(mailer, settings.from.clone(), settings.to.clone())
    }

    pub fn compose(&self, role: RecipientRole, message: &str) -> OutboundMail {
        OutboundMail {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: role.subject().to_string(),
            html_body: html_body(message),
        }
    }

    /// Returns whether the transport accepted the mail.
    pub async fn notify(&self, role: RecipientRole, message: &str) -> bool {
        match self.mailer.send(self.compose(role, message)).await {
            Ok(()) => {
                info!(%role, to = %self.to, "notification sent");
                true
            }
            Err(err) => {
                warn!(%role, to = %self.to, error = %err, "notification failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryMailer;

    fn notifier(mailer: Arc<InMemoryMailer>) -> Notifier {
        Notifier::new(mailer, "noreply@example.com", "owner@example.com")
    }

    #[test]
    fn composes_subject_and_body() {
        let n = notifier(Arc::new(InMemoryMailer::new()));

        let mail = n.compose(RecipientRole::Rejection, &rejection_message("images", "doc.pdf"));

        assert_eq!(mail.subject, "New image Upload Failed");
        assert_eq!(mail.from, "noreply@example.com");
        assert_eq!(mail.to, "owner@example.com");
        assert_eq!(
            mail.html_body,
            r#"<html><body><p style="font-size:18px">The image doc.pdf that was sent to images was not of format .jpg or .png</p></body></html>"#
        );
    }

    #[test]
    fn confirmation_carries_object_url() {
        assert_eq!(
            confirmation_message("images", "cat.jpg"),
            "We received your image. Its URL is s3://images/cat.jpg"
        );
        assert_eq!(RecipientRole::Confirmation.subject(), "New Image Upload");
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let mailer = Arc::new(InMemoryMailer::new());
        mailer.set_failing(true);
        let n = notifier(mailer.clone());

        assert!(!n.notify(RecipientRole::Confirmation, "hello").await);
        assert!(mailer.sent().await.is_empty());

        mailer.set_failing(false);
        assert!(n.notify(RecipientRole::Confirmation, "hello").await);
        assert_eq!(mailer.sent().await.len(), 1);
    }
}
