use crate::domain::errors::SlaResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    SlaBreachWarning,
    SlaBreached,
}

impl NotificationTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationTemplate::SlaBreachWarning => "sla_breach_warning",
            NotificationTemplate::SlaBreached => "sla_breached",
        }
    }
}

/// Values available to SLA notification templates.
#[derive(Debug, Clone, Default)]
pub struct NotificationContext {
    pub metric: String,
    pub due_in: String,
    pub overdue_by: String,
    pub conversation_reference_number: String,
    pub conversation_subject: String,
    pub conversation_uuid: String,
    pub recipient_first_name: String,
    pub recipient_last_name: String,
    pub recipient_full_name: String,
    pub recipient_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub subject: String,
    pub content: String,
}

pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        template: NotificationTemplate,
        context: &NotificationContext,
    ) -> SlaResult<RenderedNotification>;
}
