mod helpers;

use chrono::Duration;
use helpers::*;
use oxidesk_sla::domain::entities::*;
use oxidesk_sla::domain::ports::sla_repository::SlaRepository;
use oxidesk_sla::domain::ports::team_repository::TeamRepository;
use oxidesk_sla::infrastructure::persistence::Database;
use tokio_util::sync::CancellationToken;

async fn exec(db: &Database, sql: &str, id: &str) {
    sqlx::query(sql)
        .bind(id)
        .execute(db.pool())
        .await
        .expect("Failed to update row");
}

// ========================================
// Nullable columns
// ========================================

#[tokio::test]
async fn test_null_columns_read_back_as_none() {
    let harness = SlaHarness::new().await;
    let db = harness.db();

    let policy =
        create_test_sla_policy(&harness, policy_request(None, Some("1h"), None, vec![])).await;
    let stored = db.get_sla_policy(&policy.id).await.unwrap().unwrap();
    assert_eq!(stored.first_response_time, None);
    assert_eq!(stored.next_response_time.as_deref(), Some("1h"));
    assert_eq!(stored.resolution_time, None);

    let conversation_id = seed_conversation(&db, None).await;
    harness
        .sla()
        .apply_sla(t0(), &conversation_id, None, &policy.id)
        .await
        .unwrap();
    let applied = db
        .get_applied_sla_by_conversation(&conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applied.first_response_deadline_at, None);
    assert_eq!(applied.resolution_deadline_at, None);
    assert_eq!(applied.first_response_met_at, None);
    assert_eq!(applied.conversation.assigned_user_id, None);
    assert_eq!(applied.conversation.first_response_at, None);
    assert_eq!(applied.conversation.resolved_at, None);

    let event = harness
        .sla()
        .create_next_response_sla_event(&conversation_id, &applied.id, &policy.id, None)
        .await
        .unwrap();
    let stored = db.get_sla_event(&event.id).await.unwrap().unwrap();
    assert_eq!(stored.deadline_at, Some(t0() + Duration::hours(1)));
    assert_eq!(stored.met_at, None);
    assert_eq!(stored.breached_at, None);

    let pending = db.get_pending_sla_events().await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_team_without_calendar_reads_back() {
    let harness = SlaHarness::new().await;
    let db = harness.db();
    seed_team(&db, "team-1", None, "").await;

    let team = db.get_team_by_id("team-1").await.unwrap().unwrap();
    assert_eq!(team.business_hours_id, None);
    assert_eq!(team.timezone, "");
}

#[tokio::test]
async fn test_notification_without_event_reads_back() {
    let harness = SlaHarness::new().await;
    let db = harness.db();
    let policy =
        create_test_sla_policy(&harness, policy_request(Some("30m"), None, None, vec![])).await;
    let conversation_id = seed_conversation(&db, None).await;
    harness
        .sla()
        .apply_sla(t0(), &conversation_id, None, &policy.id)
        .await
        .unwrap();
    let applied = harness
        .sla()
        .get_applied_sla_by_conversation(&conversation_id)
        .await
        .unwrap();

    let notification = ScheduledSlaNotification::new(
        applied.id.clone(),
        None,
        SlaMetric::FirstResponse,
        NotificationType::Warning,
        vec!["assigned_user".to_string()],
        t0(),
    );
    db.create_scheduled_notification(&notification).await.unwrap();

    let due = db.get_due_scheduled_notifications(t0()).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].sla_event_id, None);
    assert_eq!(due[0].processed_at, None);
}

// ========================================
// Malformed rows
// ========================================

#[tokio::test]
async fn test_malformed_conversation_does_not_halt_evaluation() {
    let harness = SlaHarness::new().await;
    let db = harness.db();
    let policy =
        create_test_sla_policy(&harness, policy_request(Some("30m"), None, None, vec![])).await;

    let broken = seed_conversation(&db, None).await;
    let late = seed_conversation(&db, None).await;
    let replied = seed_conversation(&db, None).await;
    for conversation_id in [&broken, &late, &replied] {
        harness
            .sla()
            .apply_sla(t0(), conversation_id, None, &policy.id)
            .await
            .unwrap();
    }

    exec(
        &db,
        "UPDATE conversations SET first_response_at = 'not a timestamp' WHERE id = ?",
        &broken,
    )
    .await;
    // SQLite's own timestamp form, as written by CURRENT_TIMESTAMP
    exec(
        &db,
        "UPDATE conversations SET first_response_at = '2026-03-02 10:10:00' WHERE id = ?",
        &replied,
    )
    .await;

    assert_eq!(db.get_pending_applied_slas().await.unwrap().len(), 2);

    harness.clock.set(t0() + Duration::minutes(31));
    let evaluated = harness
        .components
        .evaluator
        .evaluate_pending_slas(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(evaluated, 2);

    let late = harness.sla().get_applied_sla_by_conversation(&late).await.unwrap();
    assert_eq!(
        late.first_response_breached_at,
        Some(t0() + Duration::minutes(31))
    );

    let replied = harness
        .sla()
        .get_applied_sla_by_conversation(&replied)
        .await
        .unwrap();
    assert_eq!(
        replied.first_response_met_at,
        Some(t0() + Duration::minutes(10))
    );
    assert_eq!(replied.status, AppliedSlaStatus::Completed);
}

#[tokio::test]
async fn test_malformed_notification_does_not_halt_dispatch() {
    let harness = SlaHarness::new().await;
    let db = harness.db();
    seed_agent(&db, "agent-1", "ana@example.com", "Ana").await;
    let policy = create_test_sla_policy(
        &harness,
        policy_request(
            Some("30m"),
            None,
            None,
            vec![warning_rule(RuleMetric::FirstResponse, "10m", &["agent-1"])],
        ),
    )
    .await;

    let mut applied_ids = Vec::new();
    for _ in 0..2 {
        let conversation_id = seed_conversation(&db, None).await;
        harness
            .sla()
            .apply_sla(t0(), &conversation_id, None, &policy.id)
            .await
            .unwrap();
        let applied = harness
            .sla()
            .get_applied_sla_by_conversation(&conversation_id)
            .await
            .unwrap();
        applied_ids.push(applied.id);
    }

    exec(
        &db,
        "UPDATE scheduled_sla_notifications SET recipients = 'not json' WHERE applied_sla_id = ?",
        &applied_ids[0],
    )
    .await;

    harness.clock.set(t0() + Duration::minutes(21));
    let processed = harness
        .components
        .dispatcher
        .send_due_notifications(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(processed, 1);
    assert_eq!(harness.notifier.messages().len(), 1);

    let sent = db
        .get_scheduled_notifications_by_applied_sla(&applied_ids[1])
        .await
        .unwrap();
    assert!(sent[0].processed_at.is_some());
}
