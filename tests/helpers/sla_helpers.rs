#![allow(dead_code)]
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use oxidesk_sla::{
    bootstrap::{wire_components, SlaComponents},
    domain::entities::{
        NotificationRule, NotificationType, RuleMetric, SlaPolicy, SlaPolicyRequest,
        TimeDelayType,
    },
    domain::errors::SlaResult,
    domain::ports::notifier::{NotificationMessage, Notifier},
    domain::ports::time_service::TimeService,
    infrastructure::persistence::Database,
};
use sqlx::Row;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::test_db::{setup_test_db, TestDatabase};

pub const DEFAULT_BUSINESS_HOURS_ID: &str = "bh-default";

/// Monday 2026-03-02 10:00 UTC
pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-02T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .unwrap()
        .with_timezone(&Utc)
}

fn fmt(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ========================================
// Test doubles
// ========================================

/// Clock that only moves when told to.
pub struct ManualTimeService {
    now: Mutex<DateTime<Utc>>,
}

impl ManualTimeService {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

#[async_trait]
impl TimeService for ManualTimeService {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, _duration: std::time::Duration) {}
}

/// Notifier that keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationMessage>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: NotificationMessage) -> SlaResult<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

// ========================================
// Harness
// ========================================

pub struct SlaHarness {
    pub test_db: TestDatabase,
    pub clock: Arc<ManualTimeService>,
    pub notifier: Arc<RecordingNotifier>,
    pub components: SlaComponents,
}

impl SlaHarness {
    /// Fresh database with an always-open UTC default calendar, clock at `t0()`.
    pub async fn new() -> Self {
        let test_db = setup_test_db().await;
        let db = test_db.db();
        seed_default_calendar(&db, "UTC").await;
        Self::with_db(test_db)
    }

    /// Fresh database without any calendar configured.
    pub async fn unconfigured() -> Self {
        Self::with_db(setup_test_db().await)
    }

    fn with_db(test_db: TestDatabase) -> Self {
        let clock = Arc::new(ManualTimeService::new(t0()));
        let notifier = Arc::new(RecordingNotifier::default());
        let components = wire_components(
            test_db.db(),
            notifier.clone() as Arc<dyn Notifier>,
            clock.clone() as Arc<dyn TimeService>,
        );
        Self {
            test_db,
            clock,
            notifier,
            components,
        }
    }

    pub fn db(&self) -> Database {
        self.test_db.db()
    }

    pub fn sla(&self) -> &oxidesk_sla::application::services::SlaService {
        &self.components.state.sla_service
    }
}

// ========================================
// Policies
// ========================================

pub fn warning_rule(metric: RuleMetric, before: &str, recipients: &[&str]) -> NotificationRule {
    NotificationRule {
        notification_type: NotificationType::Warning,
        metric,
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        time_delay: before.to_string(),
        time_delay_type: TimeDelayType::Before,
    }
}

pub fn breach_rule(metric: RuleMetric, recipients: &[&str]) -> NotificationRule {
    NotificationRule {
        notification_type: NotificationType::Breach,
        metric,
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        time_delay: String::new(),
        time_delay_type: TimeDelayType::Immediately,
    }
}

pub fn policy_request(
    first_response: Option<&str>,
    next_response: Option<&str>,
    resolution: Option<&str>,
    notifications: Vec<NotificationRule>,
) -> SlaPolicyRequest {
    SlaPolicyRequest {
        name: "Standard".to_string(),
        description: "Test policy".to_string(),
        first_response_time: first_response.map(str::to_string),
        next_response_time: next_response.map(str::to_string),
        resolution_time: resolution.map(str::to_string),
        notifications,
    }
}

pub async fn create_test_sla_policy(harness: &SlaHarness, request: SlaPolicyRequest) -> SlaPolicy {
    harness
        .sla()
        .create_policy(request)
        .await
        .expect("Failed to create SLA policy")
}

// ========================================
// Collaborator rows
// ========================================

pub async fn seed_business_hours(db: &Database, id: &str, always_open: bool, hours: &str) {
    let now = fmt(Utc::now());
    sqlx::query(
        "INSERT INTO business_hours (id, name, is_always_open, hours, holidays, created_at, updated_at)
         VALUES (?, ?, ?, ?, '[]', ?, ?)",
    )
    .bind(id)
    .bind(format!("Calendar {}", id))
    .bind(if always_open { 1_i64 } else { 0_i64 })
    .bind(hours)
    .bind(&now)
    .bind(&now)
    .execute(db.pool())
    .await
    .expect("Failed to insert business hours");
}

pub async fn seed_setting(db: &Database, key: &str, value: &str) {
    sqlx::query("INSERT INTO app_settings (key, value, updated_at) VALUES (?, ?, ?)")
        .bind(key)
        .bind(value)
        .bind(fmt(Utc::now()))
        .execute(db.pool())
        .await
        .expect("Failed to insert setting");
}

/// Always-open calendar registered as the system default.
pub async fn seed_default_calendar(db: &Database, timezone: &str) {
    seed_business_hours(db, DEFAULT_BUSINESS_HOURS_ID, true, "[]").await;
    seed_setting(
        db,
        "app.business_hours_id",
        &format!("\"{}\"", DEFAULT_BUSINESS_HOURS_ID),
    )
    .await;
    seed_setting(db, "app.timezone", &format!("\"{}\"", timezone)).await;
}

pub async fn seed_team(db: &Database, id: &str, business_hours_id: Option<&str>, timezone: &str) {
    let now = fmt(Utc::now());
    sqlx::query(
        "INSERT INTO teams (id, name, business_hours_id, timezone, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(format!("Team {}", id))
    .bind(business_hours_id)
    .bind(timezone)
    .bind(&now)
    .bind(&now)
    .execute(db.pool())
    .await
    .expect("Failed to insert team");
}

pub async fn seed_agent(db: &Database, id: &str, email: &str, first_name: &str) {
    sqlx::query(
        "INSERT INTO agents (id, email, first_name, last_name, created_at)
         VALUES (?, ?, ?, 'Tester', ?)",
    )
    .bind(id)
    .bind(email)
    .bind(first_name)
    .bind(fmt(Utc::now()))
    .execute(db.pool())
    .await
    .expect("Failed to insert agent");
}

/// Open conversation; returns its id.
pub async fn seed_conversation(db: &Database, assigned_user_id: Option<&str>) -> String {
    let id = Uuid::new_v4().to_string();
    let now = fmt(Utc::now());
    sqlx::query(
        "INSERT INTO conversations
            (id, uuid, reference_number, subject, status, assigned_user_id, created_at, updated_at)
         VALUES (?, ?, '1042', 'Printer on fire', 'open', ?, ?, ?)",
    )
    .bind(&id)
    .bind(Uuid::new_v4().to_string())
    .bind(assigned_user_id)
    .bind(&now)
    .bind(&now)
    .execute(db.pool())
    .await
    .expect("Failed to insert conversation");
    id
}

pub async fn record_first_response(db: &Database, conversation_id: &str, at: DateTime<Utc>) {
    sqlx::query("UPDATE conversations SET first_response_at = ?, status = 'replied' WHERE id = ?")
        .bind(fmt(at))
        .bind(conversation_id)
        .execute(db.pool())
        .await
        .expect("Failed to record first response");
}

pub async fn resolve_conversation(db: &Database, conversation_id: &str, at: DateTime<Utc>) {
    sqlx::query("UPDATE conversations SET resolved_at = ?, status = 'resolved' WHERE id = ?")
        .bind(fmt(at))
        .bind(conversation_id)
        .execute(db.pool())
        .await
        .expect("Failed to resolve conversation");
}

pub async fn conversation_next_deadline(db: &Database, conversation_id: &str) -> Option<String> {
    let row = sqlx::query("SELECT next_sla_deadline_at FROM conversations WHERE id = ?")
        .bind(conversation_id)
        .fetch_one(db.pool())
        .await
        .expect("Failed to read conversation");
    // NULL does not decode as Option<String> through the Any driver
    row.try_get::<Option<String>, _>("next_sla_deadline_at")
        .ok()
        .flatten()
}
