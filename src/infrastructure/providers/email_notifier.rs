use crate::config::SmtpConfig;
use crate::domain::errors::{SlaError, SlaResult};
use crate::domain::ports::notifier::{NotificationMessage, Notifier};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor,
};

/// Sends SLA notifications over SMTP.
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> SlaResult<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| SlaError::Delivery(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: NotificationMessage) -> SlaResult<()> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| SlaError::Delivery(format!("Invalid from address: {}", e)))?;

        for recipient in &message.recipient_emails {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| SlaError::Delivery(format!("Invalid to address {}: {}", recipient, e)))?;

            let email = LettreMessage::builder()
                .from(from.clone())
                .to(to)
                .subject(&message.subject)
                .header(ContentType::TEXT_HTML)
                .body(message.content.clone())
                .map_err(|e| SlaError::Delivery(format!("Failed to build email: {}", e)))?;

            self.mailer
                .send(email)
                .await
                .map_err(|e| SlaError::Delivery(format!("SMTP send failed: {}", e)))?;

            tracing::debug!(recipient = %recipient, "SLA email sent");
        }
        Ok(())
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: NotificationMessage) -> SlaResult<()> {
        tracing::info!(
            recipients = ?message.recipient_emails,
            subject = %message.subject,
            provider = ?message.provider,
            "SLA notification (log only, SMTP not configured)"
        );
        Ok(())
    }
}
