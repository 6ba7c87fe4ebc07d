use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::{AlertQuery, NotificationFlag, ProductionStore};
use chrono::{Duration, Utc};
use rollmon_common::notification::{
    CreateTemplateRequest, NotificationDraft, NotificationPriority, NotificationTarget,
    TriggerCondition, UpdateTemplateRequest,
};
use rollmon_common::types::{
    AlertDraft, AlertSeverity, AlertStatus, AlertType, CreateTargetRequest, ProductionStage,
    Shift, SubmitMetricRequest, UpdateTargetRequest,
};
use tempfile::TempDir;

fn sqlite_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("nested/rollmon.db")).unwrap();
    (dir, store)
}

/// Runs one contract check against both backends.
macro_rules! backend_tests {
    ($($name:ident => $check:ident),+ $(,)?) => {
        mod memory_backend {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    $check(&MemoryStore::new()).await;
                }
            )+
        }

        mod sqlite_backend {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let (_dir, store) = sqlite_store();
                    $check(&store).await;
                }
            )+
        }
    };
}

backend_tests! {
    metrics_are_listed_newest_first => check_metrics,
    target_update_and_lookup => check_targets,
    alert_lifecycle_round_trip => check_alerts,
    notifications_by_audience => check_notification_audience,
    notification_flags_keep_first_timestamp => check_notification_flags,
    archived_notifications_can_be_deleted => check_notification_delete,
    template_crud_and_event_lookup => check_templates,
}

fn metric(section: &str, machine: Option<&str>) -> SubmitMetricRequest {
    SubmitMetricRequest {
        section_id: section.into(),
        machine_id: machine.map(str::to_string),
        stage: ProductionStage::Extruding,
        target_rate: 100.0,
        actual_rate: 40.0,
        efficiency: 45.0,
        downtime_minutes: Some(70.0),
        shift: Shift::Day,
        operator_id: Some("op-7".into()),
        job_order_id: Some("JO-1".into()),
        notes: None,
    }
}

fn draft(section: &str) -> AlertDraft {
    AlertDraft {
        alert_type: AlertType::DowntimeExceeded,
        severity: AlertSeverity::Critical,
        section_id: section.into(),
        machine_id: Some("M-1".into()),
        title: "Downtime exceeded".into(),
        description: "70 minutes".into(),
        affected_job_orders: vec!["JO-1".into(), "JO-2".into()],
        estimated_delay_hours: 2,
        suggested_actions: vec!["Call maintenance".into()],
    }
}

fn notification(target: NotificationTarget) -> NotificationDraft {
    NotificationDraft {
        title: "Line 3".into(),
        message: "Check the extruder".into(),
        priority: Some(NotificationPriority::High),
        target,
        action_data: Some(serde_json::json!({"alert_id": 4})),
        ..Default::default()
    }
}

fn template(name: &str, event: &str) -> CreateTemplateRequest {
    CreateTemplateRequest {
        name: name.into(),
        category: "production".into(),
        notification_type: "info".into(),
        priority: Some(NotificationPriority::Medium),
        title_template: "Order {{orderId}} completed".into(),
        message_template: "Done".into(),
        action_required: false,
        action_url_template: None,
        active: true,
        trigger_event: event.into(),
        conditions: vec![TriggerCondition::equals("plant", "north")],
        created_by: Some("admin".into()),
    }
}

async fn check_metrics<S: ProductionStore>(store: &S) {
    let now = Utc::now();
    let first = store.insert_metric(metric("EXT01", Some("M-1")), now - Duration::minutes(5)).await.unwrap();
    let second = store.insert_metric(metric("EXT01", None), now).await.unwrap();
    store.insert_metric(metric("PRN02", None), now).await.unwrap();

    assert_eq!(first.id, 1);
    assert!(second.id > first.id);

    let listed = store.list_metrics(Some("EXT01"), 10, 0).await.unwrap();
    let ids: Vec<i64> = listed.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(listed[1].machine_id.as_deref(), Some("M-1"));
    assert_eq!(listed[1].downtime_minutes, Some(70.0));
    assert_eq!(listed[1].recorded_at, first.recorded_at);

    assert_eq!(store.list_metrics(None, 10, 0).await.unwrap().len(), 3);
    assert_eq!(store.list_metrics(None, 1, 1).await.unwrap().len(), 1);
}

async fn check_targets<S: ProductionStore>(store: &S) {
    let now = Utc::now();
    let created = store
        .insert_target(
            CreateTargetRequest {
                section_id: "EXT01".into(),
                machine_id: None,
                stage: ProductionStage::Extruding,
                shift: Shift::Day,
                target_rate: 100.0,
                min_efficiency: None,
                max_downtime_minutes: Some(45.0),
                effective_to: None,
                created_by: Some("planner".into()),
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(created.min_efficiency, 75.0);
    assert!(created.active);

    let update = UpdateTargetRequest {
        target_rate: Some(120.0),
        effective_to: Some(Some(now + Duration::days(1))),
        ..Default::default()
    };
    let updated = store
        .update_target(created.id, &update, now + Duration::seconds(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.target_rate, 120.0);
    assert_eq!(updated.max_downtime_minutes, 45.0);

    let fetched = store.get_target(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.target_rate, 120.0);
    assert_eq!(fetched.effective_to, Some(now + Duration::days(1)));

    assert!(store.update_target(999, &update, now).await.unwrap().is_none());

    let found = store
        .targets_for("EXT01", ProductionStage::Extruding, Shift::Day)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(store
        .targets_for("EXT01", ProductionStage::Extruding, Shift::Night)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(store.list_targets(Some("EXT01")).await.unwrap().len(), 1);
    assert!(store.list_targets(Some("OTHER")).await.unwrap().is_empty());
}

async fn check_alerts<S: ProductionStore>(store: &S) {
    let now = Utc::now();
    let older = store.insert_alert(draft("EXT01"), now - Duration::minutes(1)).await.unwrap();
    let newer = store.insert_alert(draft("PRN02"), now).await.unwrap();
    assert_eq!(older.status, AlertStatus::Active);
    assert!(newer.id > older.id);

    let all = store.list_alerts(&AlertQuery::all()).await.unwrap();
    assert_eq!(all.iter().map(|a| a.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
    assert_eq!(all[1].affected_job_orders, vec!["JO-1", "JO-2"]);

    let acked = store.acknowledge_alert(older.id, "sup-1", now).await.unwrap().unwrap();
    assert_eq!(acked.status, AlertStatus::Acknowledged);
    assert_eq!(acked.acknowledged_by.as_deref(), Some("sup-1"));

    let resolved = store
        .resolve_alert(older.id, "sup-1", Some("belt replaced".into()), now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.status, AlertStatus::Resolved);

    // Resolving again overwrites; acknowledging a resolved alert changes nothing.
    store.resolve_alert(older.id, "sup-2", None, now).await.unwrap();
    let after_ack = store.acknowledge_alert(older.id, "sup-3", now).await.unwrap().unwrap();
    assert_eq!(after_ack.status, AlertStatus::Resolved);
    assert_eq!(after_ack.resolved_by.as_deref(), Some("sup-2"));
    assert_eq!(after_ack.resolution_notes, None);
    assert_eq!(after_ack.acknowledged_by.as_deref(), Some("sup-1"));

    let persisted = store.get_alert(older.id).await.unwrap().unwrap();
    assert_eq!(persisted.resolved_by.as_deref(), Some("sup-2"));

    let active = store.list_alerts(&AlertQuery::active()).await.unwrap();
    assert_eq!(active.iter().map(|a| a.id).collect::<Vec<_>>(), vec![newer.id]);
    let by_section = store.list_alerts(&AlertQuery::section("EXT01")).await.unwrap();
    assert_eq!(by_section.len(), 1);

    assert!(store.acknowledge_alert(999, "x", now).await.unwrap().is_none());
    assert!(store.resolve_alert(999, "x", None, now).await.unwrap().is_none());
}

async fn check_notification_audience<S: ProductionStore>(store: &S) {
    let now = Utc::now();
    let insert = move |target| {
        let n = notification(target).into_notification(NotificationPriority::High, None, now);
        store.insert_notification(n)
    };
    let to_user = insert(NotificationTarget::User { user_id: "u1".into() }).await.unwrap();
    let to_role = insert(NotificationTarget::Role { role: "Supervisor".into() }).await.unwrap();
    let everyone = insert(NotificationTarget::Broadcast).await.unwrap();
    insert(NotificationTarget::User { user_id: "u2".into() }).await.unwrap();

    let ids = |list: Vec<rollmon_common::notification::Notification>| {
        list.iter().map(|n| n.id).collect::<Vec<_>>()
    };
    assert_eq!(
        ids(store.notifications_for("u1", Some("Supervisor")).await.unwrap()),
        vec![to_user.id, to_role.id, everyone.id]
    );
    assert_eq!(
        ids(store.notifications_for("u1", None).await.unwrap()),
        vec![to_user.id, everyone.id]
    );

    let fetched = store.get_notification(to_role.id).await.unwrap().unwrap();
    assert_eq!(fetched.target, NotificationTarget::Role { role: "Supervisor".into() });
    assert_eq!(fetched.action_data, Some(serde_json::json!({"alert_id": 4})));
    assert_eq!(fetched.priority, NotificationPriority::High);
}

async fn check_notification_flags<S: ProductionStore>(store: &S) {
    let now = Utc::now();
    let n = notification(NotificationTarget::Broadcast).into_notification(
        NotificationPriority::Low,
        Some(now + Duration::hours(1)),
        now,
    );
    let stored = store.insert_notification(n).await.unwrap();

    let flagged = store
        .flag_notifications(&[stored.id, 404], NotificationFlag::Read, now)
        .await
        .unwrap();
    assert_eq!(flagged, 1);
    store
        .flag_notifications(&[stored.id], NotificationFlag::Read, now + Duration::minutes(5))
        .await
        .unwrap();
    store
        .flag_notifications(&[stored.id], NotificationFlag::Dismissed, now)
        .await
        .unwrap();

    let fetched = store.get_notification(stored.id).await.unwrap().unwrap();
    assert_eq!(fetched.read_at, Some(now));
    assert_eq!(fetched.dismissed_at, Some(now));
    assert!(fetched.archived_at.is_none());
}

async fn check_notification_delete<S: ProductionStore>(store: &S) {
    let now = Utc::now();
    let make = || {
        notification(NotificationTarget::Broadcast).into_notification(
            NotificationPriority::Urgent,
            Some(now - Duration::hours(1)),
            now - Duration::hours(2),
        )
    };
    let archived = store.insert_notification(make()).await.unwrap();
    let kept = store.insert_notification(make()).await.unwrap();
    store
        .flag_notifications(&[archived.id], NotificationFlag::Archived, now)
        .await
        .unwrap();

    let candidates = store.archived_notifications().await.unwrap();
    assert_eq!(candidates.iter().map(|n| n.id).collect::<Vec<_>>(), vec![archived.id]);

    assert_eq!(store.delete_notifications(&[archived.id, 999]).await.unwrap(), 1);
    assert!(store.get_notification(archived.id).await.unwrap().is_none());
    assert!(store.get_notification(kept.id).await.unwrap().is_some());
}

async fn check_templates<S: ProductionStore>(store: &S) {
    let now = Utc::now();
    let first = store.insert_template(template("done", "order_completed"), now).await.unwrap();
    let mut other = template("hr", "shift_changed");
    other.category = "hr".into();
    store.insert_template(other, now).await.unwrap();
    let mut inactive = template("off", "order_completed");
    inactive.active = false;
    store.insert_template(inactive, now).await.unwrap();

    let for_event = store.templates_for_event("order_completed").await.unwrap();
    assert_eq!(for_event.len(), 1);
    assert_eq!(for_event[0].conditions, vec![TriggerCondition::equals("plant", "north")]);

    assert_eq!(store.list_templates(Some("hr")).await.unwrap().len(), 1);
    assert_eq!(store.list_templates(None).await.unwrap().len(), 3);

    let update = UpdateTemplateRequest {
        priority: Some(None),
        action_url_template: Some(Some("/orders/{{orderId}}".into())),
        ..Default::default()
    };
    let updated = store.update_template(first.id, &update, now).await.unwrap().unwrap();
    assert_eq!(updated.priority, None);
    let fetched = store.get_template(first.id).await.unwrap().unwrap();
    assert_eq!(fetched.priority, None);
    assert_eq!(fetched.action_url_template.as_deref(), Some("/orders/{{orderId}}"));

    assert!(store.delete_template(first.id).await.unwrap());
    assert!(!store.delete_template(first.id).await.unwrap());
    assert!(store.get_template(first.id).await.unwrap().is_none());
    assert!(store.update_template(first.id, &update, now).await.unwrap().is_none());
}
