use crate::application::services::notification_scheduler::NotificationScheduler;
use crate::domain::entities::{
    evaluate_deadline, AppliedSla, Breaches, Deadlines, MetricVerdict, SlaEvent, SlaEventStatus,
    SlaMetric, SlaPolicy,
};
use crate::domain::errors::SlaResult;
use crate::domain::ports::sla_repository::SlaRepository;
use crate::domain::ports::time_service::TimeService;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Promotes pending applied SLAs and SLA events to met or breached.
///
/// Every transition is a conditional update, so running a pass twice over an
/// unchanged row set changes nothing and schedules no extra alerts.
#[derive(Clone)]
pub struct SlaEvaluator {
    sla_repo: Arc<dyn SlaRepository>,
    scheduler: NotificationScheduler,
    time_service: Arc<dyn TimeService>,
}

impl SlaEvaluator {
    pub fn new(
        sla_repo: Arc<dyn SlaRepository>,
        scheduler: NotificationScheduler,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            sla_repo,
            scheduler,
            time_service,
        }
    }

    // ========================================
    // Applied SLAs
    // ========================================

    /// One pass over every applied SLA that is not completed. Returns how many
    /// rows were evaluated before the pass ended or shutdown was requested.
    pub async fn evaluate_pending_slas(&self, shutdown: &CancellationToken) -> SlaResult<usize> {
        let started = Instant::now();
        let pending = self.sla_repo.get_pending_applied_slas().await?;
        debug!(count = pending.len(), "Evaluating pending SLAs");

        let mut evaluated = 0;
        for applied in &pending {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, stopping SLA evaluation pass");
                break;
            }
            if let Err(e) = self.evaluate_applied_sla(applied).await {
                error!(
                    applied_sla_id = %applied.id,
                    conversation_id = %applied.conversation_id,
                    error = %e,
                    "Failed to evaluate SLA"
                );
                continue;
            }
            evaluated += 1;
        }

        histogram!("sla_evaluation_pass_seconds", "loop" => "applied_sla")
            .record(started.elapsed().as_secs_f64());
        Ok(evaluated)
    }

    pub async fn evaluate_applied_sla(&self, applied: &AppliedSla) -> SlaResult<()> {
        let now = self.time_service.now();

        for metric in [SlaMetric::FirstResponse, SlaMetric::Resolution] {
            if applied.is_settled(metric) {
                continue;
            }
            let observed = applied.observed_at(metric);
            match evaluate_deadline(applied.deadline(metric), observed, now) {
                MetricVerdict::NotTracked => {
                    debug!(
                        applied_sla_id = %applied.id,
                        metric = %metric,
                        "No deadline for metric, skipping"
                    );
                }
                MetricVerdict::Pending => {}
                MetricVerdict::Met => {
                    if let Some(met_at) = observed {
                        if self
                            .sla_repo
                            .mark_applied_sla_met(&applied.id, metric, met_at)
                            .await?
                        {
                            counter!("sla_met_total", "metric" => metric.to_string()).increment(1);
                            debug!(applied_sla_id = %applied.id, metric = %metric, "SLA metric met");
                        }
                    }
                }
                MetricVerdict::Breached => {
                    self.handle_breach(applied, metric, now).await?;
                }
            }
        }

        self.refresh_next_deadline(applied).await?;
        self.sla_repo.refresh_applied_sla_status(&applied.id).await?;
        Ok(())
    }

    async fn handle_breach(
        &self,
        applied: &AppliedSla,
        metric: SlaMetric,
        now: DateTime<Utc>,
    ) -> SlaResult<()> {
        if !self
            .sla_repo
            .mark_applied_sla_breached(&applied.id, metric, now)
            .await?
        {
            return Ok(());
        }

        counter!("sla_breaches_total", "metric" => metric.to_string()).increment(1);
        warn!(
            applied_sla_id = %applied.id,
            conversation_id = %applied.conversation_id,
            metric = %metric,
            deadline = ?applied.deadline(metric),
            "SLA breached"
        );

        let Some(policy) = self.sla_repo.get_sla_policy(&applied.sla_policy_id).await? else {
            warn!(
                applied_sla_id = %applied.id,
                policy_id = %applied.sla_policy_id,
                "SLA policy missing, no breach notifications scheduled"
            );
            return Ok(());
        };

        self.scheduler
            .create_notification_schedule(
                &policy.notifications,
                &applied.id,
                None,
                Deadlines::default(),
                Breaches::for_metric(metric, now),
            )
            .await?;
        Ok(())
    }

    /// Recompute the conversation's next-deadline pointer from what is still open.
    async fn refresh_next_deadline(&self, applied: &AppliedSla) -> SlaResult<()> {
        let current = self
            .sla_repo
            .get_applied_sla(&applied.id)
            .await?
            .unwrap_or_else(|| applied.clone());

        let open_event_deadline = self
            .sla_repo
            .get_open_sla_event(&applied.id, SlaMetric::NextResponse)
            .await?
            .and_then(|event| event.deadline_at);

        let next = [current.next_outstanding_deadline(), open_event_deadline]
            .into_iter()
            .flatten()
            .min();

        self.sla_repo
            .update_conversation_next_sla_deadline(&applied.conversation_id, next)
            .await
    }

    // ========================================
    // SLA Events
    // ========================================

    /// One pass over every pending SLA event. Policies are looked up at most
    /// once per pass.
    pub async fn evaluate_pending_sla_events(
        &self,
        shutdown: &CancellationToken,
    ) -> SlaResult<usize> {
        let started = Instant::now();
        let events = self.sla_repo.get_pending_sla_events().await?;
        if events.is_empty() {
            return Ok(0);
        }
        debug!(count = events.len(), "Evaluating pending SLA events");

        let mut policy_cache: HashMap<String, SlaPolicy> = HashMap::new();
        let mut evaluated = 0;
        for event in &events {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, stopping SLA event evaluation pass");
                break;
            }
            if let Err(e) = self.evaluate_sla_event(&event.id, &mut policy_cache).await {
                error!(sla_event_id = %event.id, error = %e, "Failed to evaluate SLA event");
                continue;
            }
            evaluated += 1;
        }

        histogram!("sla_evaluation_pass_seconds", "loop" => "sla_event")
            .record(started.elapsed().as_secs_f64());
        Ok(evaluated)
    }

    async fn evaluate_sla_event(
        &self,
        event_id: &str,
        policy_cache: &mut HashMap<String, SlaPolicy>,
    ) -> SlaResult<()> {
        // Re-read so a met_at stamped since the pass started is seen.
        let Some(event) = self.sla_repo.get_sla_event(event_id).await? else {
            return Ok(());
        };
        if event.status != SlaEventStatus::Pending {
            return Ok(());
        }
        let Some(deadline) = event.deadline_at else {
            warn!(sla_event_id = %event.id, "SLA event has no deadline, skipping");
            return Ok(());
        };

        let now = self.time_service.now();
        match evaluate_deadline(Some(deadline), event.met_at, now) {
            MetricVerdict::Breached => {
                if !self.sla_repo.mark_sla_event_breached(&event.id, now).await? {
                    return Ok(());
                }
                counter!("sla_breaches_total", "metric" => event.metric.to_string()).increment(1);
                warn!(
                    sla_event_id = %event.id,
                    applied_sla_id = %event.applied_sla_id,
                    deadline = %deadline,
                    met_at = ?event.met_at,
                    "SLA event breached"
                );
                // A late reply already happened; alerting about it helps no one.
                if event.met_at.is_none() {
                    self.schedule_event_breach(&event, now, policy_cache).await?;
                }
            }
            MetricVerdict::Met => {
                if self.sla_repo.mark_sla_event_met(&event.id).await? {
                    counter!("sla_met_total", "metric" => event.metric.to_string()).increment(1);
                    debug!(sla_event_id = %event.id, "SLA event met");
                }
            }
            MetricVerdict::Pending | MetricVerdict::NotTracked => {}
        }
        Ok(())
    }

    async fn schedule_event_breach(
        &self,
        event: &SlaEvent,
        now: DateTime<Utc>,
        policy_cache: &mut HashMap<String, SlaPolicy>,
    ) -> SlaResult<()> {
        if !policy_cache.contains_key(&event.sla_policy_id) {
            let Some(policy) = self.sla_repo.get_sla_policy(&event.sla_policy_id).await? else {
                warn!(
                    sla_event_id = %event.id,
                    policy_id = %event.sla_policy_id,
                    "SLA policy missing, no breach notifications scheduled"
                );
                return Ok(());
            };
            policy_cache.insert(event.sla_policy_id.clone(), policy);
        }
        let Some(policy) = policy_cache.get(&event.sla_policy_id) else {
            return Ok(());
        };

        self.scheduler
            .create_notification_schedule(
                &policy.notifications,
                &event.applied_sla_id,
                Some(&event.id),
                Deadlines::default(),
                Breaches::for_metric(SlaMetric::NextResponse, now),
            )
            .await?;
        Ok(())
    }
}
