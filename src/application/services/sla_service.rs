use crate::application::services::notification_scheduler::{rule_delay, NotificationScheduler};
use crate::domain::entities::{
    AppliedSla, Breaches, BusinessHours, Deadlines, SlaEvent, SlaMetric, SlaPolicy,
    SlaPolicyRequest, TimeDelayType,
};
use crate::domain::errors::{SlaError, SlaResult};
use crate::domain::ports::business_hours_repository::BusinessHoursRepository;
use crate::domain::ports::settings_repository::{
    AppSettingsRepository, SETTING_BUSINESS_HOURS_ID, SETTING_TIMEZONE,
};
use crate::domain::ports::sla_repository::SlaRepository;
use crate::domain::ports::team_repository::TeamRepository;
use crate::domain::ports::time_service::TimeService;
use crate::domain::services::{add_business_minutes, parse_duration};
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, info};

const MAX_POLICY_NAME_LEN: usize = 255;

/// Policy store, deadline calculator and the applied-SLA / SLA-event lifecycles.
#[derive(Clone)]
pub struct SlaService {
    sla_repo: Arc<dyn SlaRepository>,
    team_repo: Arc<dyn TeamRepository>,
    settings_repo: Arc<dyn AppSettingsRepository>,
    business_hours_repo: Arc<dyn BusinessHoursRepository>,
    scheduler: NotificationScheduler,
    time_service: Arc<dyn TimeService>,
}

impl SlaService {
    pub fn new(
        sla_repo: Arc<dyn SlaRepository>,
        team_repo: Arc<dyn TeamRepository>,
        settings_repo: Arc<dyn AppSettingsRepository>,
        business_hours_repo: Arc<dyn BusinessHoursRepository>,
        scheduler: NotificationScheduler,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            sla_repo,
            team_repo,
            settings_repo,
            business_hours_repo,
            scheduler,
            time_service,
        }
    }

    // ========================================
    // SLA Policy Management
    // ========================================

    pub async fn create_policy(&self, request: SlaPolicyRequest) -> SlaResult<SlaPolicy> {
        validate_policy(&request)?;

        let policy = SlaPolicy::new(
            request.name.trim().to_string(),
            request.description,
            normalize_duration(request.first_response_time),
            normalize_duration(request.next_response_time),
            normalize_duration(request.resolution_time),
            request.notifications,
        );
        self.sla_repo.create_sla_policy(&policy).await?;

        info!(policy_id = %policy.id, name = %policy.name, "Created SLA policy");
        Ok(policy)
    }

    pub async fn get_policy(&self, policy_id: &str) -> SlaResult<SlaPolicy> {
        self.sla_repo
            .get_sla_policy(policy_id)
            .await?
            .ok_or_else(|| SlaError::NotFound(format!("SLA policy {}", policy_id)))
    }

    pub async fn list_policies(&self) -> SlaResult<Vec<SlaPolicy>> {
        self.sla_repo.list_sla_policies().await
    }

    /// Replace a policy's definition. Deadlines already computed for applied
    /// SLAs are left as they are.
    pub async fn update_policy(
        &self,
        policy_id: &str,
        request: SlaPolicyRequest,
    ) -> SlaResult<SlaPolicy> {
        validate_policy(&request)?;

        let mut policy = self.get_policy(policy_id).await?;
        policy.name = request.name.trim().to_string();
        policy.description = request.description;
        policy.first_response_time = normalize_duration(request.first_response_time);
        policy.next_response_time = normalize_duration(request.next_response_time);
        policy.resolution_time = normalize_duration(request.resolution_time);
        policy.notifications = request.notifications;
        policy.updated_at = Utc::now();

        if !self.sla_repo.update_sla_policy(&policy).await? {
            return Err(SlaError::NotFound(format!("SLA policy {}", policy_id)));
        }

        info!(policy_id = %policy_id, "Updated SLA policy");
        Ok(policy)
    }

    pub async fn delete_policy(&self, policy_id: &str) -> SlaResult<()> {
        if !self.sla_repo.delete_sla_policy(policy_id).await? {
            return Err(SlaError::NotFound(format!("SLA policy {}", policy_id)));
        }
        info!(policy_id = %policy_id, "Deleted SLA policy");
        Ok(())
    }

    // ========================================
    // Deadline calculation
    // ========================================

    /// Absolute deadlines of every metric the policy configures, advanced
    /// through the team's business hours (or the system default).
    pub async fn get_deadlines(
        &self,
        start: DateTime<Utc>,
        policy_id: &str,
        team_id: Option<&str>,
    ) -> SlaResult<Deadlines> {
        let policy = self.get_policy(policy_id).await?;
        self.deadlines_for_policy(start, &policy, team_id).await
    }

    async fn deadlines_for_policy(
        &self,
        start: DateTime<Utc>,
        policy: &SlaPolicy,
        team_id: Option<&str>,
    ) -> SlaResult<Deadlines> {
        let (business_hours, timezone) = self.business_hours_and_timezone(team_id).await?;

        debug!(
            policy_id = %policy.id,
            timezone = %timezone,
            always_open = business_hours.is_always_open,
            "Calculating SLA deadlines"
        );

        let deadline = |metric: SlaMetric| -> SlaResult<Option<DateTime<Utc>>> {
            let Some(duration_str) = policy.duration_for(metric) else {
                return Ok(None);
            };
            let duration = parse_duration(duration_str)?;
            add_business_minutes(start, duration.num_minutes(), &business_hours, &timezone)
                .map(Some)
        };

        Ok(Deadlines {
            first_response: deadline(SlaMetric::FirstResponse)?,
            resolution: deadline(SlaMetric::Resolution)?,
            next_response: deadline(SlaMetric::NextResponse)?,
        })
    }

    /// Team calendar when the team names one, otherwise the system default from settings.
    async fn business_hours_and_timezone(
        &self,
        team_id: Option<&str>,
    ) -> SlaResult<(BusinessHours, String)> {
        let mut business_hours_id = None;
        let mut timezone = None;

        if let Some(team_id) = team_id {
            let team = self
                .team_repo
                .get_team_by_id(team_id)
                .await?
                .ok_or_else(|| SlaError::NotFound(format!("Team {}", team_id)))?;
            business_hours_id = team.business_hours_id.filter(|id| !id.is_empty());
            timezone = Some(team.timezone).filter(|tz| !tz.is_empty());
        }

        if business_hours_id.is_none() || timezone.is_none() {
            let settings = self.settings_repo.get_by_prefix("app").await?;
            if business_hours_id.is_none() {
                business_hours_id = setting_as_string(&settings, SETTING_BUSINESS_HOURS_ID);
            }
            if timezone.is_none() {
                timezone = setting_as_string(&settings, SETTING_TIMEZONE);
            }
        }

        let (Some(business_hours_id), Some(timezone)) = (business_hours_id, timezone) else {
            return Err(SlaError::BusinessHoursNotConfigured);
        };

        let business_hours = self
            .business_hours_repo
            .get_business_hours(&business_hours_id)
            .await?;
        Ok((business_hours, timezone))
    }

    // ========================================
    // Applied SLA lifecycle
    // ========================================

    /// Bind a policy to a conversation and schedule warnings for its deadlines.
    /// Returns the applied policy.
    pub async fn apply_sla(
        &self,
        start: DateTime<Utc>,
        conversation_id: &str,
        team_id: Option<&str>,
        policy_id: &str,
    ) -> SlaResult<SlaPolicy> {
        let policy = self.get_policy(policy_id).await?;
        let mut deadlines = self.deadlines_for_policy(start, &policy, team_id).await?;
        // Next-response clocks live on SLA events, never on the applied SLA.
        deadlines.next_response = None;

        let applied_sla_id = self
            .sla_repo
            .create_applied_sla(
                conversation_id,
                policy_id,
                deadlines.first_response,
                deadlines.resolution,
            )
            .await?;

        counter!("sla_applied_total").increment(1);
        info!(
            conversation_id = %conversation_id,
            applied_sla_id = %applied_sla_id,
            policy_id = %policy_id,
            first_response_deadline = ?deadlines.first_response,
            resolution_deadline = ?deadlines.resolution,
            "Applied SLA policy"
        );

        self.scheduler
            .create_notification_schedule(
                &policy.notifications,
                &applied_sla_id,
                None,
                deadlines,
                Breaches::default(),
            )
            .await?;

        Ok(policy)
    }

    pub async fn get_applied_sla(&self, applied_sla_id: &str) -> SlaResult<AppliedSla> {
        self.sla_repo
            .get_applied_sla(applied_sla_id)
            .await?
            .ok_or_else(|| SlaError::NotFound(format!("Applied SLA {}", applied_sla_id)))
    }

    pub async fn get_applied_sla_by_conversation(
        &self,
        conversation_id: &str,
    ) -> SlaResult<AppliedSla> {
        self.sla_repo
            .get_applied_sla_by_conversation(conversation_id)
            .await?
            .ok_or_else(|| {
                SlaError::NotFound(format!("Applied SLA for conversation {}", conversation_id))
            })
    }

    // ========================================
    // SLA Event lifecycle
    // ========================================

    /// Open a next-response clock starting now.
    ///
    /// Fails with `NextResponseNotConfigured` when the policy has no
    /// next-response time and with `UnmetSlaEventAlreadyExists` when a clock
    /// is already open for this applied SLA. Both are soft misses.
    pub async fn create_next_response_sla_event(
        &self,
        conversation_id: &str,
        applied_sla_id: &str,
        policy_id: &str,
        team_id: Option<&str>,
    ) -> SlaResult<SlaEvent> {
        let policy = self.get_policy(policy_id).await?;
        if policy.duration_for(SlaMetric::NextResponse).is_none() {
            info!(
                conversation_id = %conversation_id,
                applied_sla_id = %applied_sla_id,
                policy_id = %policy_id,
                "No next response time set for SLA policy, skipping event creation"
            );
            return Err(SlaError::NextResponseNotConfigured(policy_id.to_string()));
        }

        let now = self.time_service.now();
        let deadlines = self.deadlines_for_policy(now, &policy, team_id).await?;
        let Some(deadline) = deadlines.next_response else {
            return Err(SlaError::NextResponseNotConfigured(policy_id.to_string()));
        };

        let event =
            SlaEvent::new_next_response(applied_sla_id.to_string(), policy_id.to_string(), deadline);
        match self.sla_repo.create_sla_event(&event).await {
            Ok(()) => {}
            Err(e @ SlaError::UnmetSlaEventAlreadyExists(_)) => {
                info!(
                    conversation_id = %conversation_id,
                    applied_sla_id = %applied_sla_id,
                    "Skipping next response SLA event creation, unmet event already exists"
                );
                return Err(e);
            }
            Err(e) => {
                error!(
                    conversation_id = %conversation_id,
                    applied_sla_id = %applied_sla_id,
                    error = %e,
                    "Failed to insert SLA event"
                );
                return Err(e);
            }
        }

        self.sla_repo
            .update_conversation_next_sla_deadline(conversation_id, Some(deadline))
            .await?;

        info!(
            conversation_id = %conversation_id,
            applied_sla_id = %applied_sla_id,
            sla_event_id = %event.id,
            deadline = %deadline,
            "Created next response SLA event"
        );

        self.scheduler
            .create_notification_schedule(
                &policy.notifications,
                applied_sla_id,
                Some(&event.id),
                Deadlines {
                    next_response: Some(deadline),
                    ..Default::default()
                },
                Breaches::default(),
            )
            .await?;

        Ok(event)
    }

    /// Stamp the open clock for `metric` as met now and return the instant.
    /// `LatestSlaEventNotFound` means no clock was open.
    pub async fn set_latest_sla_event_met_at(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
    ) -> SlaResult<DateTime<Utc>> {
        let now = self.time_service.now();
        match self
            .sla_repo
            .set_latest_sla_event_met_at(applied_sla_id, metric, now)
            .await
        {
            Ok(met_at) => {
                debug!(applied_sla_id = %applied_sla_id, metric = %metric, "Marked SLA event met");
                Ok(met_at)
            }
            Err(e @ SlaError::LatestSlaEventNotFound { .. }) => {
                info!(
                    applied_sla_id = %applied_sla_id,
                    metric = %metric,
                    "No open SLA event to mark as met"
                );
                Err(e)
            }
            Err(e) => {
                error!(applied_sla_id = %applied_sla_id, error = %e, "Failed to mark SLA event met");
                Err(e)
            }
        }
    }

    pub async fn get_sla_events(&self, applied_sla_id: &str) -> SlaResult<Vec<SlaEvent>> {
        self.sla_repo
            .get_sla_events_by_applied_sla(applied_sla_id)
            .await
    }
}

fn normalize_duration(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn setting_as_string(settings: &serde_json::Value, key: &str) -> Option<String> {
    match settings.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reject definitions the evaluator could not act on.
pub fn validate_policy(request: &SlaPolicyRequest) -> SlaResult<()> {
    let name = request.name.trim();
    if name.is_empty() || name.chars().count() > MAX_POLICY_NAME_LEN {
        return Err(SlaError::Validation(format!(
            "Policy name must be between 1 and {} characters",
            MAX_POLICY_NAME_LEN
        )));
    }

    let durations = [
        ("first_response_time", &request.first_response_time),
        ("next_response_time", &request.next_response_time),
        ("resolution_time", &request.resolution_time),
    ];
    let mut any_set = false;
    for (field, value) in durations {
        let Some(value) = value.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        any_set = true;
        parse_duration(value)
            .map_err(|e| SlaError::Validation(format!("Invalid {}: {}", field, e)))?;
    }
    if !any_set {
        return Err(SlaError::Validation(
            "At least one SLA time must be set".to_string(),
        ));
    }

    for (index, rule) in request.notifications.iter().enumerate() {
        if rule.recipients.iter().all(|r| r.trim().is_empty()) {
            return Err(SlaError::Validation(format!(
                "Notification rule {} needs at least one recipient",
                index + 1
            )));
        }
        if rule.time_delay_type != TimeDelayType::Immediately {
            if rule.time_delay.trim().is_empty() {
                return Err(SlaError::Validation(format!(
                    "Notification rule {} needs a time delay",
                    index + 1
                )));
            }
            rule_delay(rule).map_err(|e| {
                SlaError::Validation(format!("Notification rule {}: {}", index + 1, e))
            })?;
        }
    }

    Ok(())
}
