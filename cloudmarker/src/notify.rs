//! SMTP-backed notifier.
//!
//! Sends one message at the start of an audit/run and one at the end,
//! each message carrying the audit key (or `"all audits"` for a
//! run-level bracket), start time, and on end, end time and wall-clock
//! duration. `lettre` is already in the workspace's dependency table;
//! its `SmtpTransport` is synchronous, so sends are dispatched through
//! `spawn_blocking` rather than blocking a tokio worker thread.

use crate::config::{EmailConfig, SmtpMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudmarker_engine::notify::Notifier;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::error;

pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> Result<SmtpTransport, lettre::transport::smtp::Error> {
        let mut builder = match self.config.mode {
            SmtpMode::Ssl => SmtpTransport::relay(&self.config.host)?,
            SmtpMode::StartTls => SmtpTransport::starttls_relay(&self.config.host)?,
            SmtpMode::Disable => SmtpTransport::builder_dangerous(&self.config.host),
        };
        if let Some(port) = self.config.port {
            builder = builder.port(port);
        }
        if let Some(username) = &self.config.username {
            let password = self.config.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }
        Ok(builder.build())
    }

    fn send(&self, subject: &str, body: String) {
        let from = match self.config.from_addr.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                error!(addr = %self.config.from_addr, error = %e, "invalid notification sender address");
                return;
            }
        };
        let Some(first_to) = self.config.to_addrs.first() else {
            error!("notification email has no recipients configured");
            return;
        };
        let to = match first_to.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                error!(addr = %first_to, error = %e, "invalid notification recipient address");
                return;
            }
        };
        let message = Message::builder().from(from).to(to);
        let message = self
            .config
            .to_addrs
            .iter()
            .skip(1)
            .fold(message, |m, addr| match addr.parse() {
                Ok(mailbox) => m.to(mailbox),
                Err(e) => {
                    error!(addr = %addr, error = %e, "skipping invalid notification recipient");
                    m
                }
            })
            .subject(subject.to_string())
            .body(body);

        let message = match message {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "failed to build notification email");
                return;
            }
        };

        let transport = match self.build_transport() {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "failed to build SMTP transport");
                return;
            }
        };

        if let Err(e) = transport.send(&message) {
            error!(error = %e, "failed to send notification email");
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn start(&self, subject: &str, at: DateTime<Utc>) {
        let line = format!("{subject} started at {at}");
        let config = self.config.clone();
        let line_subject = format!("cloudmarker: {subject} started");
        let notifier = EmailNotifier::new(config);
        tokio::task::spawn_blocking(move || notifier.send(&line_subject, line))
            .await
            .unwrap_or_else(|e| error!(error = %e, "notification task panicked"));
    }

    async fn end(&self, subject: &str, started: DateTime<Utc>, ended: DateTime<Utc>, duration: &str) {
        let line = format!("{subject} started at {started}, ended at {ended}, took {duration}");
        let config = self.config.clone();
        let line_subject = format!("cloudmarker: {subject} finished");
        let notifier = EmailNotifier::new(config);
        tokio::task::spawn_blocking(move || notifier.send(&line_subject, line))
            .await
            .unwrap_or_else(|e| error!(error = %e, "notification task panicked"));
    }
}
