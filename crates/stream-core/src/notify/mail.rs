use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{notification_subject, Notifier, NotifyError};

/// SMTP relay settings for the report mail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    /// Upgrade the connection with STARTTLS before sending.
    #[serde(default)]
    pub use_tls: bool,
    pub sender: String,
    pub destination: String,
    #[serde(default = "default_mail_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_smtp_port() -> u16 {
    25
}

fn default_mail_timeout_ms() -> u64 {
    30_000
}

/// `X-Priority` header set on failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct XPriority(u8);

impl Header for XPriority {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Priority")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.trim().parse()?))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.to_string())
    }
}

/// Sends the report as a plain-text mail through an SMTP relay.
pub struct SmtpNotifier {
    config: MailConfig,
}

impl SmtpNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub fn build_message(&self, report: &str, fail_count: usize) -> Result<Message, NotifyError> {
        let from: Mailbox = parse_mailbox(&self.config.sender)?;
        let to: Mailbox = parse_mailbox(&self.config.destination)?;

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(notification_subject(fail_count))
            .header(ContentType::TEXT_PLAIN);
        if fail_count > 0 {
            builder = builder.header(XPriority(2));
        }
        builder
            .body(report.to_string())
            .map_err(|e| NotifyError::Mail(e.to_string()))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let host = self.config.smtp_host.as_str();
        let builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Mail(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let mut builder = builder
            .port(self.config.smtp_port)
            .timeout(Some(Duration::from_millis(self.config.timeout_ms)));

        if let Some(ref username) = self.config.smtp_username {
            if !username.is_empty() {
                let password = self.config.smtp_password.clone().unwrap_or_default();
                builder = builder.credentials(Credentials::new(username.clone(), password));
            }
        }
        Ok(builder.build())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|e| NotifyError::Address(format!("{}: {}", address, e)))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, report: &str, fail_count: usize) -> Result<(), NotifyError> {
        let message = self.build_message(report, fail_count)?;
        debug!(
            host = %self.config.smtp_host,
            port = self.config.smtp_port,
            to = %self.config.destination,
            "Sending email"
        );

        let transport = self.transport()?;
        let response = transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Mail(e.to_string()))?;
        debug!(code = %response.code(), "Email accepted by relay");
        Ok(())
    }
}
