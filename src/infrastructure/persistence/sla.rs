use crate::domain::entities::{
    AppliedSla, ConversationSnapshot, ConversationStatus, NotificationRule,
    ScheduledSlaNotification, SlaEvent, SlaMetric, SlaPolicy,
};
use crate::domain::errors::{SlaError, SlaResult};
use crate::domain::ports::sla_repository::SlaRepository;
use crate::infrastructure::persistence::{
    format_opt_ts, format_ts, opt_text, parse_opt_ts, parse_ts, Database,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

const POLICY_COLUMNS: &str = "id, name, description, first_response_time, next_response_time, \
     resolution_time, notifications, created_at, updated_at";

const APPLIED_SLA_SELECT: &str = "SELECT a.id, a.conversation_id, a.sla_policy_id, a.status, \
     a.first_response_deadline_at, a.resolution_deadline_at, \
     a.first_response_breached_at, a.resolution_breached_at, \
     a.first_response_met_at, a.resolution_met_at, a.created_at, a.updated_at, \
     c.uuid AS conversation_uuid, c.reference_number AS conversation_reference_number, \
     c.subject AS conversation_subject, c.status AS conversation_status, \
     c.assigned_user_id AS conversation_assigned_user_id, \
     c.first_response_at AS conversation_first_response_at, \
     c.resolved_at AS conversation_resolved_at \
     FROM applied_slas a JOIN conversations c ON c.id = a.conversation_id";

const EVENT_COLUMNS: &str = "id, applied_sla_id, sla_policy_id, type, status, deadline_at, \
     met_at, breached_at, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, applied_sla_id, sla_event_id, metric, notification_type, \
     recipients, send_at, processed_at, created_at, updated_at";

/// (met_at, breached_at) column names of an applied-SLA metric.
fn applied_metric_columns(metric: SlaMetric) -> SlaResult<(&'static str, &'static str)> {
    match metric {
        SlaMetric::FirstResponse => Ok(("first_response_met_at", "first_response_breached_at")),
        SlaMetric::Resolution => Ok(("resolution_met_at", "resolution_breached_at")),
        SlaMetric::NextResponse => Err(SlaError::Validation(
            "next_response is tracked on SLA events, not on the applied SLA".to_string(),
        )),
    }
}

fn parse_enum<T: std::str::FromStr<Err = String>>(value: &str) -> SlaResult<T> {
    value.parse::<T>().map_err(SlaError::Internal)
}

/// Decode rows independently so one malformed row cannot hide the rest.
fn decode_each<T>(
    rows: &[AnyRow],
    what: &str,
    decode: fn(&AnyRow) -> SlaResult<T>,
) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match decode(row) {
            Ok(item) => Some(item),
            Err(e) => {
                let id = opt_text(row, "id").unwrap_or_default();
                tracing::error!(id = %id, error = %e, "Skipping undecodable {} row", what);
                None
            }
        })
        .collect()
}

fn row_to_policy(row: &AnyRow) -> SlaResult<SlaPolicy> {
    let notifications: String = row.try_get("notifications")?;
    let notifications: Vec<NotificationRule> = if notifications.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&notifications)?
    };

    Ok(SlaPolicy {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: opt_text(row, "description")
            .unwrap_or_default(),
        first_response_time: opt_text(row, "first_response_time"),
        next_response_time: opt_text(row, "next_response_time"),
        resolution_time: opt_text(row, "resolution_time"),
        notifications,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn row_to_applied_sla(row: &AnyRow) -> SlaResult<AppliedSla> {
    let conversation_id: String = row.try_get("conversation_id")?;
    let conversation = ConversationSnapshot {
        id: conversation_id.clone(),
        uuid: row.try_get("conversation_uuid")?,
        reference_number: row.try_get("conversation_reference_number")?,
        subject: opt_text(row, "conversation_subject")
            .unwrap_or_default(),
        status: ConversationStatus::from(row.try_get::<String, _>("conversation_status")?),
        assigned_user_id: opt_text(row, "conversation_assigned_user_id")
            .filter(|id| !id.is_empty()),
        first_response_at: parse_opt_ts(opt_text(row, "conversation_first_response_at"))?,
        resolved_at: parse_opt_ts(opt_text(row, "conversation_resolved_at"))?,
    };

    Ok(AppliedSla {
        id: row.try_get("id")?,
        conversation_id,
        sla_policy_id: row.try_get("sla_policy_id")?,
        status: parse_enum(&row.try_get::<String, _>("status")?)?,
        first_response_deadline_at: parse_opt_ts(opt_text(row, "first_response_deadline_at"))?,
        resolution_deadline_at: parse_opt_ts(opt_text(row, "resolution_deadline_at"))?,
        first_response_breached_at: parse_opt_ts(opt_text(row, "first_response_breached_at"))?,
        resolution_breached_at: parse_opt_ts(opt_text(row, "resolution_breached_at"))?,
        first_response_met_at: parse_opt_ts(opt_text(row, "first_response_met_at"))?,
        resolution_met_at: parse_opt_ts(opt_text(row, "resolution_met_at"))?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
        conversation,
    })
}

fn row_to_event(row: &AnyRow) -> SlaResult<SlaEvent> {
    Ok(SlaEvent {
        id: row.try_get("id")?,
        applied_sla_id: row.try_get("applied_sla_id")?,
        sla_policy_id: row.try_get("sla_policy_id")?,
        metric: parse_enum(&row.try_get::<String, _>("type")?)?,
        status: parse_enum(&row.try_get::<String, _>("status")?)?,
        deadline_at: parse_opt_ts(opt_text(row, "deadline_at"))?,
        met_at: parse_opt_ts(opt_text(row, "met_at"))?,
        breached_at: parse_opt_ts(opt_text(row, "breached_at"))?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn row_to_notification(row: &AnyRow) -> SlaResult<ScheduledSlaNotification> {
    let recipients: String = row.try_get("recipients")?;
    Ok(ScheduledSlaNotification {
        id: row.try_get("id")?,
        applied_sla_id: row.try_get("applied_sla_id")?,
        sla_event_id: opt_text(row, "sla_event_id"),
        metric: parse_enum(&row.try_get::<String, _>("metric")?)?,
        notification_type: parse_enum(&row.try_get::<String, _>("notification_type")?)?,
        recipients: serde_json::from_str(&recipients)?,
        send_at: parse_ts(&row.try_get::<String, _>("send_at")?)?,
        processed_at: parse_opt_ts(opt_text(row, "processed_at"))?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

#[async_trait]
impl SlaRepository for Database {
    // ========================================
    // SLA Policy Operations
    // ========================================

    async fn create_sla_policy(&self, policy: &SlaPolicy) -> SlaResult<()> {
        sqlx::query(&format!(
            "INSERT INTO sla_policies ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            POLICY_COLUMNS
        ))
        .bind(&policy.id)
        .bind(&policy.name)
        .bind(&policy.description)
        .bind(&policy.first_response_time)
        .bind(&policy.next_response_time)
        .bind(&policy.resolution_time)
        .bind(serde_json::to_string(&policy.notifications)?)
        .bind(format_ts(&policy.created_at))
        .bind(format_ts(&policy.updated_at))
        .execute(&self.pool)
        .await?;

        tracing::debug!(policy_id = %policy.id, "SLA policy inserted");
        Ok(())
    }

    async fn get_sla_policy(&self, policy_id: &str) -> SlaResult<Option<SlaPolicy>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sla_policies WHERE id = ?",
            POLICY_COLUMNS
        ))
        .bind(policy_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_policy).transpose()
    }

    async fn list_sla_policies(&self) -> SlaResult<Vec<SlaPolicy>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sla_policies ORDER BY created_at ASC, name ASC",
            POLICY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_policy).collect()
    }

    async fn update_sla_policy(&self, policy: &SlaPolicy) -> SlaResult<bool> {
        let result = sqlx::query(
            "UPDATE sla_policies
             SET name = ?, description = ?, first_response_time = ?, next_response_time = ?,
                 resolution_time = ?, notifications = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&policy.name)
        .bind(&policy.description)
        .bind(&policy.first_response_time)
        .bind(&policy.next_response_time)
        .bind(&policy.resolution_time)
        .bind(serde_json::to_string(&policy.notifications)?)
        .bind(format_ts(&policy.updated_at))
        .bind(&policy.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_sla_policy(&self, policy_id: &str) -> SlaResult<bool> {
        let result = sqlx::query("DELETE FROM sla_policies WHERE id = ?")
            .bind(policy_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================
    // Applied SLA Operations
    // ========================================

    async fn create_applied_sla(
        &self,
        conversation_id: &str,
        sla_policy_id: &str,
        first_response_deadline_at: Option<DateTime<Utc>>,
        resolution_deadline_at: Option<DateTime<Utc>>,
    ) -> SlaResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = format_ts(&Utc::now());

        sqlx::query(
            "INSERT INTO applied_slas
                (id, conversation_id, sla_policy_id, status, first_response_deadline_at,
                 resolution_deadline_at, created_at, updated_at)
             VALUES (?, ?, ?, 'pending', ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(sla_policy_id)
        .bind(format_opt_ts(first_response_deadline_at))
        .bind(format_opt_ts(resolution_deadline_at))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_applied_sla(&self, applied_sla_id: &str) -> SlaResult<Option<AppliedSla>> {
        let row = sqlx::query(&format!("{} WHERE a.id = ?", APPLIED_SLA_SELECT))
            .bind(applied_sla_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_applied_sla).transpose()
    }

    async fn get_applied_sla_by_conversation(
        &self,
        conversation_id: &str,
    ) -> SlaResult<Option<AppliedSla>> {
        // Latest application wins when a conversation had its policy changed.
        let row = sqlx::query(&format!(
            "{} WHERE a.conversation_id = ? ORDER BY a.created_at DESC LIMIT 1",
            APPLIED_SLA_SELECT
        ))
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_applied_sla).transpose()
    }

    async fn get_pending_applied_slas(&self) -> SlaResult<Vec<AppliedSla>> {
        let rows = sqlx::query(&format!(
            "{} WHERE a.status = 'pending' ORDER BY a.created_at ASC",
            APPLIED_SLA_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_each(&rows, "applied SLA", row_to_applied_sla))
    }

    async fn mark_applied_sla_breached(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        breached_at: DateTime<Utc>,
    ) -> SlaResult<bool> {
        let (met_col, breached_col) = applied_metric_columns(metric)?;
        let result = sqlx::query(&format!(
            "UPDATE applied_slas SET {breached} = ?, updated_at = ?
             WHERE id = ? AND {breached} IS NULL AND {met} IS NULL",
            breached = breached_col,
            met = met_col
        ))
        .bind(format_ts(&breached_at))
        .bind(format_ts(&Utc::now()))
        .bind(applied_sla_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_applied_sla_met(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        met_at: DateTime<Utc>,
    ) -> SlaResult<bool> {
        let (met_col, breached_col) = applied_metric_columns(metric)?;
        let result = sqlx::query(&format!(
            "UPDATE applied_slas SET {met} = ?, updated_at = ?
             WHERE id = ? AND {breached} IS NULL AND {met} IS NULL",
            breached = breached_col,
            met = met_col
        ))
        .bind(format_ts(&met_at))
        .bind(format_ts(&Utc::now()))
        .bind(applied_sla_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn refresh_applied_sla_status(&self, applied_sla_id: &str) -> SlaResult<()> {
        sqlx::query(
            "UPDATE applied_slas SET status = 'completed', updated_at = ?
             WHERE id = ? AND status = 'pending'
               AND (first_response_deadline_at IS NULL
                    OR first_response_met_at IS NOT NULL
                    OR first_response_breached_at IS NOT NULL)
               AND (resolution_deadline_at IS NULL
                    OR resolution_met_at IS NOT NULL
                    OR resolution_breached_at IS NOT NULL)",
        )
        .bind(format_ts(&Utc::now()))
        .bind(applied_sla_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_conversation_next_sla_deadline(
        &self,
        conversation_id: &str,
        deadline: Option<DateTime<Utc>>,
    ) -> SlaResult<()> {
        sqlx::query("UPDATE conversations SET next_sla_deadline_at = ? WHERE id = ?")
            .bind(format_opt_ts(deadline))
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ========================================
    // SLA Event Operations
    // ========================================

    async fn create_sla_event(&self, event: &SlaEvent) -> SlaResult<()> {
        let metric = event.metric.to_string();
        let result = sqlx::query(&format!(
            "INSERT INTO sla_events ({})
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
             WHERE NOT EXISTS (
                 SELECT 1 FROM sla_events
                 WHERE applied_sla_id = ? AND type = ?
                   AND met_at IS NULL AND breached_at IS NULL
             )",
            EVENT_COLUMNS
        ))
        .bind(&event.id)
        .bind(&event.applied_sla_id)
        .bind(&event.sla_policy_id)
        .bind(&metric)
        .bind(event.status.to_string())
        .bind(format_opt_ts(event.deadline_at))
        .bind(format_opt_ts(event.met_at))
        .bind(format_opt_ts(event.breached_at))
        .bind(format_ts(&event.created_at))
        .bind(format_ts(&event.updated_at))
        .bind(&event.applied_sla_id)
        .bind(&metric)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(SlaError::UnmetSlaEventAlreadyExists(
                event.applied_sla_id.clone(),
            )),
            Ok(_) => Ok(()),
            // The partial unique index catches a concurrent insert that raced past NOT EXISTS.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                SlaError::UnmetSlaEventAlreadyExists(event.applied_sla_id.clone()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_sla_event(&self, event_id: &str) -> SlaResult<Option<SlaEvent>> {
        let row = sqlx::query(&format!("SELECT {} FROM sla_events WHERE id = ?", EVENT_COLUMNS))
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_event).transpose()
    }

    async fn get_sla_events_by_applied_sla(
        &self,
        applied_sla_id: &str,
    ) -> SlaResult<Vec<SlaEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sla_events WHERE applied_sla_id = ? ORDER BY created_at ASC",
            EVENT_COLUMNS
        ))
        .bind(applied_sla_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }

    async fn get_open_sla_event(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
    ) -> SlaResult<Option<SlaEvent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sla_events
             WHERE applied_sla_id = ? AND type = ? AND met_at IS NULL AND breached_at IS NULL
             ORDER BY created_at DESC LIMIT 1",
            EVENT_COLUMNS
        ))
        .bind(applied_sla_id)
        .bind(metric.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_event).transpose()
    }

    async fn set_latest_sla_event_met_at(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        met_at: DateTime<Utc>,
    ) -> SlaResult<DateTime<Utc>> {
        let result = sqlx::query(
            "UPDATE sla_events SET met_at = ?, updated_at = ?
             WHERE id = (
                 SELECT id FROM sla_events
                 WHERE applied_sla_id = ? AND type = ?
                   AND met_at IS NULL AND breached_at IS NULL
                 ORDER BY created_at DESC LIMIT 1
             )",
        )
        .bind(format_ts(&met_at))
        .bind(format_ts(&Utc::now()))
        .bind(applied_sla_id)
        .bind(metric.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SlaError::LatestSlaEventNotFound {
                applied_sla_id: applied_sla_id.to_string(),
                metric: metric.to_string(),
            });
        }
        Ok(met_at)
    }

    async fn get_pending_sla_events(&self) -> SlaResult<Vec<SlaEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sla_events
             WHERE status = 'pending' AND deadline_at IS NOT NULL
             ORDER BY deadline_at ASC",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_each(&rows, "SLA event", row_to_event))
    }

    async fn mark_sla_event_breached(
        &self,
        event_id: &str,
        breached_at: DateTime<Utc>,
    ) -> SlaResult<bool> {
        let result = sqlx::query(
            "UPDATE sla_events SET status = 'breached', breached_at = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(format_ts(&breached_at))
        .bind(format_ts(&Utc::now()))
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_sla_event_met(&self, event_id: &str) -> SlaResult<bool> {
        let result = sqlx::query(
            "UPDATE sla_events SET status = 'met', updated_at = ?
             WHERE id = ? AND status = 'pending' AND met_at IS NOT NULL",
        )
        .bind(format_ts(&Utc::now()))
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // ========================================
    // Scheduled Notification Operations
    // ========================================

    async fn create_scheduled_notification(
        &self,
        notification: &ScheduledSlaNotification,
    ) -> SlaResult<()> {
        sqlx::query(&format!(
            "INSERT INTO scheduled_sla_notifications ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            NOTIFICATION_COLUMNS
        ))
        .bind(&notification.id)
        .bind(&notification.applied_sla_id)
        .bind(&notification.sla_event_id)
        .bind(notification.metric.to_string())
        .bind(notification.notification_type.to_string())
        .bind(serde_json::to_string(&notification.recipients)?)
        .bind(format_ts(&notification.send_at))
        .bind(format_opt_ts(notification.processed_at))
        .bind(format_ts(&notification.created_at))
        .bind(format_ts(&notification.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_due_scheduled_notifications(
        &self,
        now: DateTime<Utc>,
    ) -> SlaResult<Vec<ScheduledSlaNotification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scheduled_sla_notifications
             WHERE processed_at IS NULL AND send_at <= ?
             ORDER BY send_at ASC",
            NOTIFICATION_COLUMNS
        ))
        .bind(format_ts(&now))
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_each(&rows, "scheduled notification", row_to_notification))
    }

    async fn get_scheduled_notifications_by_applied_sla(
        &self,
        applied_sla_id: &str,
    ) -> SlaResult<Vec<ScheduledSlaNotification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scheduled_sla_notifications
             WHERE applied_sla_id = ?
             ORDER BY send_at ASC",
            NOTIFICATION_COLUMNS
        ))
        .bind(applied_sla_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect()
    }

    async fn mark_notification_processed(
        &self,
        notification_id: &str,
        processed_at: DateTime<Utc>,
    ) -> SlaResult<bool> {
        let ts = format_ts(&processed_at);
        let result = sqlx::query(
            "UPDATE scheduled_sla_notifications SET processed_at = ?, updated_at = ?
             WHERE id = ? AND processed_at IS NULL",
        )
        .bind(&ts)
        .bind(&ts)
        .bind(notification_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
