use crate::domain::entities::{
    AppliedSla, ScheduledSlaNotification, SlaEvent, SlaMetric, SlaPolicy,
};
use crate::domain::errors::SlaResult;
use chrono::{DateTime, Utc};

/// Repository for SLA operations
#[async_trait::async_trait]
pub trait SlaRepository: Send + Sync {
    // SLA Policy operations
    async fn create_sla_policy(&self, policy: &SlaPolicy) -> SlaResult<()>;
    async fn get_sla_policy(&self, policy_id: &str) -> SlaResult<Option<SlaPolicy>>;
    async fn list_sla_policies(&self) -> SlaResult<Vec<SlaPolicy>>;
    /// Returns false when no policy has this id.
    async fn update_sla_policy(&self, policy: &SlaPolicy) -> SlaResult<bool>;
    async fn delete_sla_policy(&self, policy_id: &str) -> SlaResult<bool>;

    // Applied SLA operations
    /// Inserts a pending applied SLA and returns its id.
    async fn create_applied_sla(
        &self,
        conversation_id: &str,
        sla_policy_id: &str,
        first_response_deadline_at: Option<DateTime<Utc>>,
        resolution_deadline_at: Option<DateTime<Utc>>,
    ) -> SlaResult<String>;
    async fn get_applied_sla(&self, applied_sla_id: &str) -> SlaResult<Option<AppliedSla>>;
    async fn get_applied_sla_by_conversation(
        &self,
        conversation_id: &str,
    ) -> SlaResult<Option<AppliedSla>>;
    async fn get_pending_applied_slas(&self) -> SlaResult<Vec<AppliedSla>>;
    /// Sets `<metric>_breached_at` only while the metric is unsettled.
    /// Returns whether this call performed the transition.
    async fn mark_applied_sla_breached(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        breached_at: DateTime<Utc>,
    ) -> SlaResult<bool>;
    /// Sets `<metric>_met_at` only while the metric is unsettled.
    async fn mark_applied_sla_met(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        met_at: DateTime<Utc>,
    ) -> SlaResult<bool>;
    /// Moves the applied SLA to `completed` once every tracked metric is settled.
    async fn refresh_applied_sla_status(&self, applied_sla_id: &str) -> SlaResult<()>;
    async fn update_conversation_next_sla_deadline(
        &self,
        conversation_id: &str,
        deadline: Option<DateTime<Utc>>,
    ) -> SlaResult<()>;

    // SLA Event operations
    /// Atomic check-and-insert; fails with `UnmetSlaEventAlreadyExists` when an
    /// open event already exists for the same applied SLA and metric.
    async fn create_sla_event(&self, event: &SlaEvent) -> SlaResult<()>;
    async fn get_sla_event(&self, event_id: &str) -> SlaResult<Option<SlaEvent>>;
    async fn get_sla_events_by_applied_sla(&self, applied_sla_id: &str)
        -> SlaResult<Vec<SlaEvent>>;
    async fn get_open_sla_event(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
    ) -> SlaResult<Option<SlaEvent>>;
    /// Stamps `met_at` on the most recent open event. Fails with
    /// `LatestSlaEventNotFound` when none is open.
    async fn set_latest_sla_event_met_at(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        met_at: DateTime<Utc>,
    ) -> SlaResult<DateTime<Utc>>;
    async fn get_pending_sla_events(&self) -> SlaResult<Vec<SlaEvent>>;
    async fn mark_sla_event_breached(
        &self,
        event_id: &str,
        breached_at: DateTime<Utc>,
    ) -> SlaResult<bool>;
    async fn mark_sla_event_met(&self, event_id: &str) -> SlaResult<bool>;

    // Scheduled notification operations
    async fn create_scheduled_notification(
        &self,
        notification: &ScheduledSlaNotification,
    ) -> SlaResult<()>;
    async fn get_due_scheduled_notifications(
        &self,
        now: DateTime<Utc>,
    ) -> SlaResult<Vec<ScheduledSlaNotification>>;
    async fn get_scheduled_notifications_by_applied_sla(
        &self,
        applied_sla_id: &str,
    ) -> SlaResult<Vec<ScheduledSlaNotification>>;
    /// Sets `processed_at` once; returns false when the row was already processed.
    async fn mark_notification_processed(
        &self,
        notification_id: &str,
        processed_at: DateTime<Utc>,
    ) -> SlaResult<bool>;
}
