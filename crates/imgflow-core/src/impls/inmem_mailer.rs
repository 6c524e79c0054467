//! Mailers that never leave the process.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::ports::{MailError, Mailer, OutboundMail};

/// Records every accepted message; used by tests and the demo.
#[derive(Default)]
pub struct InMemoryMailer {
    outbox: Mutex<Vec<OutboundMail>>,
    failing: AtomicBool,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, `send` fails with a transport error and records nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<OutboundMail> {
        self.outbox.lock().await.clone()
    }

    pub async fn sent_with_subject(&self, subject: &str) -> Vec<OutboundMail> {
        self.outbox
            .lock()
            .await
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Transport("connection reset".into()));
        }
        self.outbox.lock().await.push(mail);
        Ok(())
    }
}

/// Writes each message to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError> {
        info!(from = %mail.from, to = %mail.to, subject = %mail.subject, body = %mail.html_body, "mail");
        Ok(())
    }
}
