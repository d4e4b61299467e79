use crate::domain::entities::{
    Breaches, Deadlines, NotificationRule, NotificationType, ScheduledSlaNotification, SlaMetric,
    TimeDelayType,
};
use crate::domain::errors::SlaResult;
use crate::domain::ports::sla_repository::SlaRepository;
use crate::domain::ports::time_service::TimeService;
use crate::domain::services::parse_duration;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Send times further in the past than this are dropped instead of scheduled.
pub const STALE_NOTIFICATION_GRACE_MINUTES: i64 = 5;

/// Turns a policy's notification rules into pending schedule rows.
#[derive(Clone)]
pub struct NotificationScheduler {
    sla_repo: Arc<dyn SlaRepository>,
    time_service: Arc<dyn TimeService>,
}

impl NotificationScheduler {
    pub fn new(sla_repo: Arc<dyn SlaRepository>, time_service: Arc<dyn TimeService>) -> Self {
        Self {
            sla_repo,
            time_service,
        }
    }

    /// Persist one row per (rule, matching metric) whose send time is not stale.
    /// Returns how many rows were stored. Failures on a single row are logged
    /// and do not stop the others.
    pub async fn create_notification_schedule(
        &self,
        rules: &[NotificationRule],
        applied_sla_id: &str,
        sla_event_id: Option<&str>,
        deadlines: Deadlines,
        breaches: Breaches,
    ) -> SlaResult<usize> {
        let now = self.time_service.now();
        let planned = plan_notifications(
            rules,
            applied_sla_id,
            sla_event_id,
            &deadlines,
            &breaches,
            now,
        );

        let mut stored = 0;
        for notification in planned {
            info!(
                applied_sla_id = %applied_sla_id,
                metric = %notification.metric,
                notification_type = %notification.notification_type,
                send_at = %notification.send_at,
                "Scheduling SLA notification"
            );
            match self
                .sla_repo
                .create_scheduled_notification(&notification)
                .await
            {
                Ok(()) => {
                    stored += 1;
                    counter!(
                        "sla_notifications_scheduled_total",
                        "type" => notification.notification_type.to_string()
                    )
                    .increment(1);
                }
                Err(e) => {
                    error!(
                        applied_sla_id = %applied_sla_id,
                        error = %e,
                        "Failed to insert scheduled SLA notification"
                    );
                }
            }
        }
        Ok(stored)
    }
}

/// Delay configured on a rule; zero when the rule fires immediately or sets no delay.
pub fn rule_delay(rule: &NotificationRule) -> SlaResult<Duration> {
    if rule.time_delay_type == TimeDelayType::Immediately || rule.time_delay.trim().is_empty() {
        return Ok(Duration::zero());
    }
    parse_duration(&rule.time_delay)
}

/// Compute the rows to schedule. Warnings fire `delay` before each matching
/// deadline, breach alerts fire `delay` after each matching breach instant.
pub fn plan_notifications(
    rules: &[NotificationRule],
    applied_sla_id: &str,
    sla_event_id: Option<&str>,
    deadlines: &Deadlines,
    breaches: &Breaches,
    now: DateTime<Utc>,
) -> Vec<ScheduledSlaNotification> {
    let cutoff = now - Duration::minutes(STALE_NOTIFICATION_GRACE_MINUTES);
    let mut planned = Vec::new();

    for rule in rules {
        let delay = match rule_delay(rule) {
            Ok(delay) => delay,
            Err(e) => {
                error!(
                    applied_sla_id = %applied_sla_id,
                    time_delay = %rule.time_delay,
                    error = %e,
                    "Invalid SLA notification delay, skipping rule"
                );
                continue;
            }
        };

        for metric in SlaMetric::ALL {
            if !rule.metric.matches(metric) {
                continue;
            }
            let send_at = match rule.notification_type {
                NotificationType::Warning => deadlines
                    .get(metric)
                    .map(|d| d.checked_sub_signed(delay)),
                NotificationType::Breach => breaches
                    .get(metric)
                    .map(|b| b.checked_add_signed(delay)),
            };
            let send_at = match send_at {
                None => continue,
                Some(Some(send_at)) => send_at,
                Some(None) => {
                    error!(
                        applied_sla_id = %applied_sla_id,
                        metric = %metric,
                        time_delay = %rule.time_delay,
                        "SLA notification delay is out of range, skipping"
                    );
                    continue;
                }
            };

            if send_at < cutoff {
                warn!(
                    applied_sla_id = %applied_sla_id,
                    metric = %metric,
                    notification_type = %rule.notification_type,
                    send_at = %send_at,
                    "Skipping SLA notification with send time in the past"
                );
                continue;
            }

            debug!(
                applied_sla_id = %applied_sla_id,
                metric = %metric,
                recipients = ?rule.recipients,
                "Planned SLA notification"
            );
            planned.push(ScheduledSlaNotification::new(
                applied_sla_id.to_string(),
                sla_event_id.map(str::to_string),
                metric,
                rule.notification_type,
                rule.recipients.clone(),
                send_at,
            ));
        }
    }

    planned
}
