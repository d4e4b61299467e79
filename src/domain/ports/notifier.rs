use crate::domain::errors::SlaResult;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryProvider {
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub recipient_emails: Vec<String>,
    pub subject: String,
    pub content: String,
    pub provider: DeliveryProvider,
}

/// Outbound delivery channel for rendered notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: NotificationMessage) -> SlaResult<()>;
}
