use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::ConversationSnapshot;

/// Recipient token that resolves to the conversation's current assignee.
pub const RECIPIENT_ASSIGNED_USER: &str = "assigned_user";

// ===== Metrics =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaMetric {
    FirstResponse,
    Resolution,
    NextResponse,
}

impl SlaMetric {
    pub const ALL: [SlaMetric; 3] = [
        SlaMetric::FirstResponse,
        SlaMetric::Resolution,
        SlaMetric::NextResponse,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SlaMetric::FirstResponse => "First Response",
            SlaMetric::Resolution => "Resolution",
            SlaMetric::NextResponse => "Next Response",
        }
    }
}

impl std::fmt::Display for SlaMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlaMetric::FirstResponse => write!(f, "first_response"),
            SlaMetric::Resolution => write!(f, "resolution"),
            SlaMetric::NextResponse => write!(f, "next_response"),
        }
    }
}

impl std::str::FromStr for SlaMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first_response" => Ok(SlaMetric::FirstResponse),
            "resolution" => Ok(SlaMetric::Resolution),
            "next_response" => Ok(SlaMetric::NextResponse),
            _ => Err(format!("Invalid SLA metric: {}", s)),
        }
    }
}

/// Metric selector on a notification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleMetric {
    FirstResponse,
    Resolution,
    NextResponse,
    #[default]
    All,
}

impl RuleMetric {
    pub fn matches(&self, metric: SlaMetric) -> bool {
        match self {
            RuleMetric::All => true,
            RuleMetric::FirstResponse => metric == SlaMetric::FirstResponse,
            RuleMetric::Resolution => metric == SlaMetric::Resolution,
            RuleMetric::NextResponse => metric == SlaMetric::NextResponse,
        }
    }
}

// ===== Notification Rules =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Warning,
    Breach,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::Warning => write!(f, "warning"),
            NotificationType::Breach => write!(f, "breach"),
        }
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warning" => Ok(NotificationType::Warning),
            "breach" => Ok(NotificationType::Breach),
            _ => Err(format!("Invalid notification type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeDelayType {
    #[default]
    Immediately,
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRule {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub metric: RuleMetric,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub time_delay: String,
    #[serde(default)]
    pub time_delay_type: TimeDelayType,
}

// ===== SLA Policy =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub first_response_time: Option<String>, // Format: "30m", "2h", "1h30m"
    pub next_response_time: Option<String>,
    pub resolution_time: Option<String>,
    pub notifications: Vec<NotificationRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlaPolicy {
    pub fn new(
        name: String,
        description: String,
        first_response_time: Option<String>,
        next_response_time: Option<String>,
        resolution_time: Option<String>,
        notifications: Vec<NotificationRule>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description,
            first_response_time,
            next_response_time,
            resolution_time,
            notifications,
            created_at: now,
            updated_at: now,
        }
    }

    /// Configured duration string for a metric; blank strings count as unset.
    pub fn duration_for(&self, metric: SlaMetric) -> Option<&str> {
        let value = match metric {
            SlaMetric::FirstResponse => self.first_response_time.as_deref(),
            SlaMetric::Resolution => self.resolution_time.as_deref(),
            SlaMetric::NextResponse => self.next_response_time.as_deref(),
        };
        value.map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Full policy definition as submitted for create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlaPolicyRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub first_response_time: Option<String>,
    #[serde(default)]
    pub next_response_time: Option<String>,
    #[serde(default)]
    pub resolution_time: Option<String>,
    #[serde(default)]
    pub notifications: Vec<NotificationRule>,
}

// ===== Deadlines / Breaches =====

/// Absolute deadlines computed for a policy; `None` when the policy omits the metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadlines {
    pub first_response: Option<DateTime<Utc>>,
    pub resolution: Option<DateTime<Utc>>,
    pub next_response: Option<DateTime<Utc>>,
}

impl Deadlines {
    pub fn get(&self, metric: SlaMetric) -> Option<DateTime<Utc>> {
        match metric {
            SlaMetric::FirstResponse => self.first_response,
            SlaMetric::Resolution => self.resolution,
            SlaMetric::NextResponse => self.next_response,
        }
    }
}

/// Breach instants that breach notification rules are scheduled from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Breaches {
    pub first_response: Option<DateTime<Utc>>,
    pub resolution: Option<DateTime<Utc>>,
    pub next_response: Option<DateTime<Utc>>,
}

impl Breaches {
    pub fn for_metric(metric: SlaMetric, at: DateTime<Utc>) -> Self {
        let mut breaches = Self::default();
        match metric {
            SlaMetric::FirstResponse => breaches.first_response = Some(at),
            SlaMetric::Resolution => breaches.resolution = Some(at),
            SlaMetric::NextResponse => breaches.next_response = Some(at),
        }
        breaches
    }

    pub fn get(&self, metric: SlaMetric) -> Option<DateTime<Utc>> {
        match metric {
            SlaMetric::FirstResponse => self.first_response,
            SlaMetric::Resolution => self.resolution,
            SlaMetric::NextResponse => self.next_response,
        }
    }
}

// ===== Metric verdict =====

/// Outcome of checking one deadline against the instant the tracked action happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricVerdict {
    /// No deadline configured for this metric.
    NotTracked,
    /// Deadline not reached and action not taken yet.
    Pending,
    Met,
    Breached,
}

/// Met when the action happened at or before the deadline; breached when it
/// happened after, or when it has not happened and the deadline has passed.
pub fn evaluate_deadline(
    deadline: Option<DateTime<Utc>>,
    met_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> MetricVerdict {
    let Some(deadline) = deadline else {
        return MetricVerdict::NotTracked;
    };
    match met_at {
        Some(met_at) if met_at > deadline => MetricVerdict::Breached,
        Some(_) => MetricVerdict::Met,
        None if now > deadline => MetricVerdict::Breached,
        None => MetricVerdict::Pending,
    }
}

// ===== Applied SLA =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppliedSlaStatus {
    Pending,
    Completed,
}

impl std::fmt::Display for AppliedSlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppliedSlaStatus::Pending => write!(f, "pending"),
            AppliedSlaStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for AppliedSlaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AppliedSlaStatus::Pending),
            "completed" => Ok(AppliedSlaStatus::Completed),
            _ => Err(format!("Invalid applied SLA status: {}", s)),
        }
    }
}

/// A policy bound to one conversation, read together with the conversation
/// fields the evaluator and dispatcher need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedSla {
    pub id: String,
    pub conversation_id: String,
    pub sla_policy_id: String,
    pub status: AppliedSlaStatus,
    pub first_response_deadline_at: Option<DateTime<Utc>>,
    pub resolution_deadline_at: Option<DateTime<Utc>>,
    pub first_response_breached_at: Option<DateTime<Utc>>,
    pub resolution_breached_at: Option<DateTime<Utc>>,
    pub first_response_met_at: Option<DateTime<Utc>>,
    pub resolution_met_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub conversation: ConversationSnapshot,
}

impl AppliedSla {
    pub fn deadline(&self, metric: SlaMetric) -> Option<DateTime<Utc>> {
        match metric {
            SlaMetric::FirstResponse => self.first_response_deadline_at,
            SlaMetric::Resolution => self.resolution_deadline_at,
            SlaMetric::NextResponse => None,
        }
    }

    pub fn met_at(&self, metric: SlaMetric) -> Option<DateTime<Utc>> {
        match metric {
            SlaMetric::FirstResponse => self.first_response_met_at,
            SlaMetric::Resolution => self.resolution_met_at,
            SlaMetric::NextResponse => None,
        }
    }

    pub fn breached_at(&self, metric: SlaMetric) -> Option<DateTime<Utc>> {
        match metric {
            SlaMetric::FirstResponse => self.first_response_breached_at,
            SlaMetric::Resolution => self.resolution_breached_at,
            SlaMetric::NextResponse => None,
        }
    }

    /// When the conversation performed the tracked action, if it has.
    pub fn observed_at(&self, metric: SlaMetric) -> Option<DateTime<Utc>> {
        match metric {
            SlaMetric::FirstResponse => self.conversation.first_response_at,
            SlaMetric::Resolution => self.conversation.resolved_at,
            SlaMetric::NextResponse => None,
        }
    }

    /// Met or breached; once true the metric is never evaluated again.
    pub fn is_settled(&self, metric: SlaMetric) -> bool {
        self.met_at(metric).is_some() || self.breached_at(metric).is_some()
    }

    /// Settled, or not tracked because the policy has no deadline for it.
    pub fn is_resolved(&self, metric: SlaMetric) -> bool {
        self.deadline(metric).is_none() || self.is_settled(metric)
    }

    /// Earliest deadline among metrics that are still open.
    pub fn next_outstanding_deadline(&self) -> Option<DateTime<Utc>> {
        [SlaMetric::FirstResponse, SlaMetric::Resolution]
            .into_iter()
            .filter(|m| !self.is_resolved(*m))
            .filter_map(|m| self.deadline(m))
            .min()
    }
}

// ===== SLA Event =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaEventStatus {
    Pending,
    Met,
    Breached,
}

impl std::fmt::Display for SlaEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlaEventStatus::Pending => write!(f, "pending"),
            SlaEventStatus::Met => write!(f, "met"),
            SlaEventStatus::Breached => write!(f, "breached"),
        }
    }
}

impl std::str::FromStr for SlaEventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SlaEventStatus::Pending),
            "met" => Ok(SlaEventStatus::Met),
            "breached" => Ok(SlaEventStatus::Breached),
            _ => Err(format!("Invalid SLA event status: {}", s)),
        }
    }
}

/// One next-response deadline instance of an applied SLA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaEvent {
    pub id: String,
    pub applied_sla_id: String,
    pub sla_policy_id: String,
    pub metric: SlaMetric,
    pub status: SlaEventStatus,
    pub deadline_at: Option<DateTime<Utc>>,
    pub met_at: Option<DateTime<Utc>>,
    pub breached_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlaEvent {
    pub fn new_next_response(
        applied_sla_id: String,
        sla_policy_id: String,
        deadline_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            applied_sla_id,
            sla_policy_id,
            metric: SlaMetric::NextResponse,
            status: SlaEventStatus::Pending,
            deadline_at: Some(deadline_at),
            met_at: None,
            breached_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Neither met nor breached; at most one such event exists per applied SLA.
    pub fn is_open(&self) -> bool {
        self.met_at.is_none() && self.breached_at.is_none()
    }
}

// ===== Scheduled notifications =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledSlaNotification {
    pub id: String,
    pub applied_sla_id: String,
    pub sla_event_id: Option<String>,
    pub metric: SlaMetric,
    pub notification_type: NotificationType,
    pub recipients: Vec<String>,
    pub send_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledSlaNotification {
    pub fn new(
        applied_sla_id: String,
        sla_event_id: Option<String>,
        metric: SlaMetric,
        notification_type: NotificationType,
        recipients: Vec<String>,
        send_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            applied_sla_id,
            sla_event_id,
            metric,
            notification_type,
            recipients,
            send_at,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A recipient token as stored on a schedule row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    AssignedUser,
    Agent(String),
}

impl Recipient {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "" => None,
            RECIPIENT_ASSIGNED_USER => Some(Recipient::AssignedUser),
            id => Some(Recipient::Agent(id.to_string())),
        }
    }
}
