use crate::domain::entities::{
    Agent, AppliedSla, NotificationType, Recipient, ScheduledSlaNotification, SlaEvent, SlaMetric,
};
use crate::domain::errors::SlaResult;
use crate::domain::ports::agent_repository::AgentRepository;
use crate::domain::ports::notifier::{DeliveryProvider, NotificationMessage, Notifier};
use crate::domain::ports::sla_repository::SlaRepository;
use crate::domain::ports::template_renderer::{
    NotificationContext, NotificationTemplate, TemplateRenderer,
};
use crate::domain::ports::time_service::TimeService;
use crate::domain::services::format_duration;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drains due schedule rows and delivers them.
///
/// Each row is marked processed once every recipient has been handled,
/// whether it was sent, skipped or suppressed. Rows whose applied SLA or
/// event no longer exists are marked processed too; only a database error
/// while loading them leaves the row for the next pass.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sla_repo: Arc<dyn SlaRepository>,
    agent_repo: Arc<dyn AgentRepository>,
    renderer: Arc<dyn TemplateRenderer>,
    notifier: Arc<dyn Notifier>,
    time_service: Arc<dyn TimeService>,
}

impl NotificationDispatcher {
    pub fn new(
        sla_repo: Arc<dyn SlaRepository>,
        agent_repo: Arc<dyn AgentRepository>,
        renderer: Arc<dyn TemplateRenderer>,
        notifier: Arc<dyn Notifier>,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            sla_repo,
            agent_repo,
            renderer,
            notifier,
            time_service,
        }
    }

    /// One pass over the rows due now. Returns how many rows were processed.
    pub async fn send_due_notifications(&self, shutdown: &CancellationToken) -> SlaResult<usize> {
        let now = self.time_service.now();
        let due = self.sla_repo.get_due_scheduled_notifications(now).await?;
        if due.is_empty() {
            return Ok(0);
        }
        debug!(count = due.len(), "Sending due SLA notifications");

        let mut processed = 0;
        for notification in &due {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, stopping SLA notification pass");
                break;
            }
            match self.send_notification(notification).await {
                Ok(()) => processed += 1,
                Err(e) => error!(
                    scheduled_notification_id = %notification.id,
                    applied_sla_id = %notification.applied_sla_id,
                    error = %e,
                    "Failed to send SLA notification"
                ),
            }
        }
        Ok(processed)
    }

    pub async fn send_notification(&self, notification: &ScheduledSlaNotification) -> SlaResult<()> {
        // Database errors propagate and leave the row for the next pass. A
        // record that is gone for good will never load, so the row is closed.
        let event = match &notification.sla_event_id {
            Some(event_id) => match self.sla_repo.get_sla_event(event_id).await? {
                Some(event) => Some(event),
                None => {
                    return self
                        .discard_orphan(notification, &format!("SLA event {} not found", event_id))
                        .await
                }
            },
            None => None,
        };
        let Some(applied) = self
            .sla_repo
            .get_applied_sla(&notification.applied_sla_id)
            .await?
        else {
            return self
                .discard_orphan(
                    notification,
                    &format!("Applied SLA {} not found", notification.applied_sla_id),
                )
                .await;
        };

        if applied.conversation.status.is_finished() {
            info!(
                scheduled_notification_id = %notification.id,
                status = %applied.conversation.status,
                "Conversation resolved or closed, suppressing SLA notification"
            );
            counter!("sla_notifications_suppressed_total", "reason" => "conversation_finished")
                .increment(1);
            return self.mark_processed(notification).await;
        }

        if notification.metric == SlaMetric::NextResponse && event.is_none() {
            return self
                .discard_orphan(notification, "next response notification has no SLA event")
                .await;
        }

        if metric_already_met(notification.metric, &applied, event.as_ref()) {
            info!(
                scheduled_notification_id = %notification.id,
                applied_sla_id = %applied.id,
                metric = %notification.metric,
                "SLA metric already met, skipping notification"
            );
            counter!("sla_notifications_suppressed_total", "reason" => "metric_met").increment(1);
            return self.mark_processed(notification).await;
        }

        for token in &notification.recipients {
            let agent_id = match Recipient::parse(token) {
                Some(Recipient::AssignedUser) => match &applied.conversation.assigned_user_id {
                    Some(id) => id.clone(),
                    None => {
                        info!(
                            scheduled_notification_id = %notification.id,
                            conversation_id = %applied.conversation_id,
                            "Conversation is unassigned, skipping assigned_user recipient"
                        );
                        counter!("sla_notifications_suppressed_total", "reason" => "unassigned")
                            .increment(1);
                        continue;
                    }
                },
                Some(Recipient::Agent(id)) => id,
                None => continue,
            };

            let agent = match self.agent_repo.get_agent(&agent_id).await {
                Ok(Some(agent)) => agent,
                Ok(None) => {
                    warn!(recipient_id = %agent_id, "SLA notification recipient not found");
                    continue;
                }
                Err(e) => {
                    error!(
                        recipient_id = %agent_id,
                        error = %e,
                        "Failed to fetch agent for SLA notification"
                    );
                    continue;
                }
            };

            if let Err(e) = self
                .deliver(notification, &applied, event.as_ref(), &agent)
                .await
            {
                error!(
                    scheduled_notification_id = %notification.id,
                    recipient_id = %agent.id,
                    error = %e,
                    "Failed to deliver SLA notification"
                );
            }
        }

        self.mark_processed(notification).await
    }

    async fn deliver(
        &self,
        notification: &ScheduledSlaNotification,
        applied: &AppliedSla,
        event: Option<&SlaEvent>,
        agent: &Agent,
    ) -> SlaResult<()> {
        let now = self.time_service.now();
        let context = build_context(notification.metric, applied, event, agent, now);
        let template = match notification.notification_type {
            NotificationType::Warning => NotificationTemplate::SlaBreachWarning,
            NotificationType::Breach => NotificationTemplate::SlaBreached,
        };
        let rendered = self.renderer.render(template, &context)?;

        self.notifier
            .send(NotificationMessage {
                recipient_emails: vec![agent.email.clone()],
                subject: rendered.subject,
                content: rendered.content,
                provider: DeliveryProvider::Email,
            })
            .await?;

        counter!(
            "sla_notifications_sent_total",
            "type" => notification.notification_type.to_string()
        )
        .increment(1);
        info!(
            scheduled_notification_id = %notification.id,
            recipient_id = %agent.id,
            notification_type = %notification.notification_type,
            "Sent SLA notification"
        );
        Ok(())
    }

    async fn mark_processed(&self, notification: &ScheduledSlaNotification) -> SlaResult<()> {
        let now = self.time_service.now();
        if !self
            .sla_repo
            .mark_notification_processed(&notification.id, now)
            .await?
        {
            debug!(
                scheduled_notification_id = %notification.id,
                "SLA notification was already processed"
            );
        }
        Ok(())
    }

    async fn discard_orphan(
        &self,
        notification: &ScheduledSlaNotification,
        reason: &str,
    ) -> SlaResult<()> {
        warn!(
            scheduled_notification_id = %notification.id,
            applied_sla_id = %notification.applied_sla_id,
            reason = %reason,
            "Discarding SLA notification without a backing record"
        );
        counter!("sla_notifications_suppressed_total", "reason" => "orphaned").increment(1);
        self.mark_processed(notification).await
    }
}

fn metric_already_met(metric: SlaMetric, applied: &AppliedSla, event: Option<&SlaEvent>) -> bool {
    match metric {
        SlaMetric::FirstResponse | SlaMetric::Resolution => applied.met_at(metric).is_some(),
        SlaMetric::NextResponse => event.map(|e| e.met_at.is_some()).unwrap_or(false),
    }
}

/// Template values; durations are relative to `now` because the recipient's
/// timezone is unknown.
fn build_context(
    metric: SlaMetric,
    applied: &AppliedSla,
    event: Option<&SlaEvent>,
    agent: &Agent,
    now: DateTime<Utc>,
) -> NotificationContext {
    let (deadline, breached_at) = match metric {
        SlaMetric::NextResponse => (
            event.and_then(|e| e.deadline_at),
            event.and_then(|e| e.breached_at),
        ),
        _ => (applied.deadline(metric), applied.breached_at(metric)),
    };
    let relative = |at: Option<DateTime<Utc>>| at.map(|t| format_duration(t - now)).unwrap_or_default();

    NotificationContext {
        metric: metric.label().to_string(),
        due_in: relative(deadline),
        overdue_by: relative(breached_at),
        conversation_reference_number: applied.conversation.reference_number.clone(),
        conversation_subject: applied.conversation.subject.clone(),
        conversation_uuid: applied.conversation.uuid.clone(),
        recipient_first_name: agent.first_name.clone(),
        recipient_last_name: agent.last_name.clone(),
        recipient_full_name: agent.full_name(),
        recipient_email: agent.email.clone(),
    }
}
