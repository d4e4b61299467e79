use crate::domain::errors::{SlaError, SlaResult};
use crate::domain::ports::template_renderer::{
    NotificationContext, NotificationTemplate, RenderedNotification, TemplateRenderer,
};
use askama::Template;

#[derive(Template)]
#[template(path = "sla_breach_warning.html")]
struct SlaBreachWarningTemplate<'a> {
    metric: &'a str,
    due_in: &'a str,
    reference_number: &'a str,
    subject: &'a str,
    conversation_uuid: &'a str,
    recipient_first_name: &'a str,
}

#[derive(Template)]
#[template(path = "sla_breached.html")]
struct SlaBreachedTemplate<'a> {
    metric: &'a str,
    overdue_by: &'a str,
    reference_number: &'a str,
    subject: &'a str,
    conversation_uuid: &'a str,
    recipient_first_name: &'a str,
}

/// Renders the built-in SLA email templates compiled into the binary.
#[derive(Debug, Default, Clone)]
pub struct AskamaTemplateRenderer;

impl AskamaTemplateRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateRenderer for AskamaTemplateRenderer {
    fn render(
        &self,
        template: NotificationTemplate,
        context: &NotificationContext,
    ) -> SlaResult<RenderedNotification> {
        let reference = context.conversation_reference_number.as_str();
        let (subject, content) = match template {
            NotificationTemplate::SlaBreachWarning => {
                let body = SlaBreachWarningTemplate {
                    metric: &context.metric,
                    due_in: &context.due_in,
                    reference_number: reference,
                    subject: &context.conversation_subject,
                    conversation_uuid: &context.conversation_uuid,
                    recipient_first_name: &context.recipient_first_name,
                };
                (
                    format!(
                        "SLA warning: {} due in {} (#{})",
                        context.metric, context.due_in, reference
                    ),
                    body.render(),
                )
            }
            NotificationTemplate::SlaBreached => {
                let body = SlaBreachedTemplate {
                    metric: &context.metric,
                    overdue_by: &context.overdue_by,
                    reference_number: reference,
                    subject: &context.conversation_subject,
                    conversation_uuid: &context.conversation_uuid,
                    recipient_first_name: &context.recipient_first_name,
                };
                (
                    format!("SLA breached: {} (#{})", context.metric, reference),
                    body.render(),
                )
            }
        };

        let content = content.map_err(|e| {
            SlaError::Template(format!("failed to render {}: {}", template.name(), e))
        })?;
        Ok(RenderedNotification { subject, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> NotificationContext {
        NotificationContext {
            metric: "First Response".into(),
            due_in: "10 minutes".into(),
            overdue_by: "5 minutes".into(),
            conversation_reference_number: "1042".into(),
            conversation_subject: "Printer <on fire>".into(),
            conversation_uuid: "c0ffee".into(),
            recipient_first_name: "Ana".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_warning_subject_and_body() {
        let rendered = AskamaTemplateRenderer::new()
            .render(NotificationTemplate::SlaBreachWarning, &context())
            .unwrap();
        assert_eq!(
            rendered.subject,
            "SLA warning: First Response due in 10 minutes (#1042)"
        );
        assert!(rendered.content.contains("Hi Ana"));
        assert!(rendered.content.contains("10 minutes"));
        // HTML is escaped
        assert!(rendered.content.contains("Printer &lt;on fire&gt;"));
    }

    #[test]
    fn test_breached_subject_and_body() {
        let rendered = AskamaTemplateRenderer::new()
            .render(NotificationTemplate::SlaBreached, &context())
            .unwrap();
        assert_eq!(rendered.subject, "SLA breached: First Response (#1042)");
        assert!(rendered.content.contains("overdue by"));
        assert!(rendered.content.contains("5 minutes"));
    }
}
