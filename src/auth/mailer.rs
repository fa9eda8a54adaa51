use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::MailConfig;

/// A single HTML mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// SMTP delivery
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailer {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl SmtpMailer {
    #[inline]
    pub fn new(config: &MailConfig) -> Result<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
        }
        .with_context(|| format!("Invalid SMTP server: {}", config.server))?;

        let mut builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let address = config
            .from
            .parse()
            .with_context(|| format!("Invalid sender address: {}", config.from))?;

        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(Some(config.from_name.clone()), address),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let to: Mailbox = mail
            .to
            .parse()
            .with_context(|| format!("Invalid recipient address: {}", mail.to))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body)
            .context("Failed to build mail")?;

        self.transport
            .send(message)
            .await
            .with_context(|| format!("Failed to deliver mail to {}", mail.to))?;

        debug!("Delivered mail to {}", mail.to);
        Ok(())
    }
}

/// Writes mail to the log instead of delivering it
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        info!(
            "Mail to {} ({}): {}",
            mail.to, mail.subject, mail.html_body
        );
        Ok(())
    }
}

/// SMTP when mail is configured, otherwise the log
#[inline]
pub fn mailer_from_config(config: Option<&MailConfig>) -> Result<Arc<dyn Mailer>> {
    match config {
        Some(mail) => {
            info!("Sending mail through {}:{}", mail.server, mail.port);
            Ok(Arc::new(SmtpMailer::new(mail)?))
        }
        None => {
            info!("No mail server configured; activation links will be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
