mod helpers;

use chrono::Duration;
use helpers::*;
use oxidesk_sla::domain::entities::*;
use oxidesk_sla::domain::errors::SlaError;

const WEEKDAYS_9_TO_5: &str = r#"[
    {"day": "Monday", "start": "09:00", "end": "17:00"},
    {"day": "Tuesday", "start": "09:00", "end": "17:00"},
    {"day": "Wednesday", "start": "09:00", "end": "17:00"},
    {"day": "Thursday", "start": "09:00", "end": "17:00"},
    {"day": "Friday", "start": "09:00", "end": "17:00"}
]"#;

// ========================================
// Policy store
// ========================================

#[tokio::test]
async fn test_policy_crud() {
    let harness = SlaHarness::new().await;
    let sla = harness.sla();

    let created = sla
        .create_policy(policy_request(
            Some("30m"),
            None,
            Some("1d"),
            vec![warning_rule(RuleMetric::All, "10m", &["assigned_user"])],
        ))
        .await
        .unwrap();
    assert_eq!(created.first_response_time.as_deref(), Some("30m"));
    assert_eq!(created.next_response_time, None);

    let fetched = sla.get_policy(&created.id).await.unwrap();
    assert_eq!(fetched.name, "Standard");
    assert_eq!(fetched.notifications, created.notifications);

    let mut update = policy_request(Some("1h"), Some("2h"), None, vec![]);
    update.name = "Premium".to_string();
    let updated = sla.update_policy(&created.id, update).await.unwrap();
    assert_eq!(updated.name, "Premium");
    assert_eq!(updated.resolution_time, None);
    assert!(updated.notifications.is_empty());

    assert_eq!(sla.list_policies().await.unwrap().len(), 1);

    sla.delete_policy(&created.id).await.unwrap();
    assert!(matches!(
        sla.get_policy(&created.id).await,
        Err(SlaError::NotFound(_))
    ));
    assert!(matches!(
        sla.delete_policy(&created.id).await,
        Err(SlaError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_policy_validation_rejects_bad_input() {
    let harness = SlaHarness::new().await;
    let sla = harness.sla();

    let no_durations = policy_request(None, None, None, vec![]);
    assert!(sla.create_policy(no_durations).await.is_err());

    let bad_duration = policy_request(Some("soon"), None, None, vec![]);
    assert!(sla.create_policy(bad_duration).await.is_err());

    let mut no_name = policy_request(Some("30m"), None, None, vec![]);
    no_name.name = "  ".to_string();
    assert!(sla.create_policy(no_name).await.is_err());

    let no_recipients = policy_request(
        Some("30m"),
        None,
        None,
        vec![warning_rule(RuleMetric::All, "10m", &[])],
    );
    assert!(sla.create_policy(no_recipients).await.is_err());

    assert!(sla.list_policies().await.unwrap().is_empty());
}

// ========================================
// Deadline calculation
// ========================================

#[tokio::test]
async fn test_team_calendar_takes_precedence() {
    let harness = SlaHarness::new().await;
    let db = harness.db();
    seed_business_hours(&db, "bh-office", false, WEEKDAYS_9_TO_5).await;
    seed_team(&db, "team-1", Some("bh-office"), "UTC").await;

    let policy =
        create_test_sla_policy(&harness, policy_request(Some("1h"), None, None, vec![])).await;

    // Friday 16:30 plus one business hour lands Monday 09:30
    let friday = ts("2026-03-06T16:30:00Z");
    let deadlines = harness
        .sla()
        .get_deadlines(friday, &policy.id, Some("team-1"))
        .await
        .unwrap();
    assert_eq!(deadlines.first_response, Some(ts("2026-03-09T09:30:00Z")));

    // Default calendar is always open
    let deadlines = harness
        .sla()
        .get_deadlines(friday, &policy.id, None)
        .await
        .unwrap();
    assert_eq!(deadlines.first_response, Some(friday + Duration::hours(1)));
}

#[tokio::test]
async fn test_team_without_calendar_falls_back_to_settings() {
    let harness = SlaHarness::new().await;
    let db = harness.db();
    seed_team(&db, "team-2", None, "").await;

    let policy = create_test_sla_policy(
        &harness,
        policy_request(Some("2h"), Some("3h"), Some("1d"), vec![]),
    )
    .await;
    let deadlines = harness
        .sla()
        .get_deadlines(t0(), &policy.id, Some("team-2"))
        .await
        .unwrap();
    assert_eq!(deadlines.first_response, Some(t0() + Duration::hours(2)));
    assert_eq!(deadlines.next_response, Some(t0() + Duration::hours(3)));
    assert_eq!(deadlines.resolution, Some(t0() + Duration::days(1)));
}

#[tokio::test]
async fn test_missing_calendar_configuration() {
    let harness = SlaHarness::unconfigured().await;
    let policy =
        create_test_sla_policy(&harness, policy_request(Some("1h"), None, None, vec![])).await;

    let result = harness.sla().get_deadlines(t0(), &policy.id, None).await;
    assert!(matches!(result, Err(SlaError::BusinessHoursNotConfigured)));
}

#[tokio::test]
async fn test_unknown_team_is_not_found() {
    let harness = SlaHarness::new().await;
    let policy =
        create_test_sla_policy(&harness, policy_request(Some("1h"), None, None, vec![])).await;

    let result = harness
        .sla()
        .get_deadlines(t0(), &policy.id, Some("no-such-team"))
        .await;
    assert!(matches!(result, Err(SlaError::NotFound(_))));
}

#[tokio::test]
async fn test_apply_with_unconfigured_calendar_creates_nothing() {
    let harness = SlaHarness::unconfigured().await;
    let db = harness.db();
    let policy =
        create_test_sla_policy(&harness, policy_request(Some("1h"), None, None, vec![])).await;
    let conversation_id = seed_conversation(&db, None).await;

    let result = harness
        .sla()
        .apply_sla(t0(), &conversation_id, None, &policy.id)
        .await;
    assert!(result.is_err());
    assert!(matches!(
        harness
            .sla()
            .get_applied_sla_by_conversation(&conversation_id)
            .await,
        Err(SlaError::NotFound(_))
    ));
}
