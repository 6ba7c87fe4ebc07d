mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    build_sqlite_test_context, build_test_context, create_target, ext01_bad_metric, ext01_target,
    submit_metric, TestContext,
};
use rollmon_common::notification::{
    CreateTemplateRequest, Notification, NotificationTemplate, UpdateTemplateRequest,
};
use rollmon_common::types::{
    Alert, AlertDraft, AlertType, CreateTargetRequest, MetricRecord, ProductionStage, Shift,
    SubmitMetricRequest, Target, UpdateTargetRequest,
};
use rollmon_server::config::ServerConfig;
use rollmon_server::state::AppState;
use rollmon_storage::memory::MemoryStore;
use rollmon_storage::{
    AlertQuery, AlertStore, MetricStore, NotificationFlag, NotificationStore, Result,
    StorageError, TargetStore, TemplateStore,
};
use std::collections::HashSet;
use std::sync::Arc;

const SUBMITTERS: usize = 24;

async fn assert_concurrent_submissions_get_unique_ids(ctx: TestContext) {
    create_target(&ctx.app, ext01_target()).await;

    let mut handles = Vec::with_capacity(SUBMITTERS);
    for _ in 0..SUBMITTERS {
        let app = ctx.app.clone();
        handles.push(tokio::spawn(async move {
            submit_metric(&app, ext01_bad_metric()).await
        }));
    }

    let mut metric_ids = HashSet::new();
    let mut alert_ids = HashSet::new();
    for handle in handles {
        let ingestion = handle.await.unwrap();
        assert!(metric_ids.insert(ingestion["metric"]["id"].as_i64().unwrap()));
        let ids: Vec<i64> = ingestion["alerts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].as_i64().unwrap())
            .collect();
        // one submission's alerts are written in order
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids out of order: {ids:?}");
        for id in ids {
            assert!(alert_ids.insert(id));
        }
    }
    assert_eq!(metric_ids.len(), SUBMITTERS);
    assert_eq!(alert_ids.len(), SUBMITTERS * 3);

    let stored = ctx.state.store.list_alerts(&AlertQuery::all()).await.unwrap();
    assert_eq!(stored.len(), SUBMITTERS * 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_get_unique_ids_in_memory() {
    assert_concurrent_submissions_get_unique_ids(build_test_context()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_get_unique_ids_in_sqlite() {
    assert_concurrent_submissions_get_unique_ids(build_sqlite_test_context().unwrap()).await;
}

/// Memory store that refuses to persist one kind of alert.
struct RejectingAlertStore {
    inner: MemoryStore,
    rejected: AlertType,
}

#[async_trait]
impl MetricStore for RejectingAlertStore {
    async fn insert_metric(
        &self,
        request: SubmitMetricRequest,
        recorded_at: DateTime<Utc>,
    ) -> Result<MetricRecord> {
        self.inner.insert_metric(request, recorded_at).await
    }

    async fn list_metrics(
        &self,
        section_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MetricRecord>> {
        self.inner.list_metrics(section_id, limit, offset).await
    }
}

#[async_trait]
impl TargetStore for RejectingAlertStore {
    async fn insert_target(
        &self,
        request: CreateTargetRequest,
        now: DateTime<Utc>,
    ) -> Result<Target> {
        self.inner.insert_target(request, now).await
    }

    async fn update_target(
        &self,
        id: i64,
        update: &UpdateTargetRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<Target>> {
        self.inner.update_target(id, update, now).await
    }

    async fn get_target(&self, id: i64) -> Result<Option<Target>> {
        self.inner.get_target(id).await
    }

    async fn list_targets(&self, section_id: Option<&str>) -> Result<Vec<Target>> {
        self.inner.list_targets(section_id).await
    }

    async fn targets_for(
        &self,
        section_id: &str,
        stage: ProductionStage,
        shift: Shift,
    ) -> Result<Vec<Target>> {
        self.inner.targets_for(section_id, stage, shift).await
    }
}

#[async_trait]
impl AlertStore for RejectingAlertStore {
    async fn insert_alert(&self, draft: AlertDraft, detected_at: DateTime<Utc>) -> Result<Alert> {
        if draft.alert_type == self.rejected {
            return Err(StorageError::from(std::io::Error::other("alerts table locked")));
        }
        self.inner.insert_alert(draft, detected_at).await
    }

    async fn get_alert(&self, id: i64) -> Result<Option<Alert>> {
        self.inner.get_alert(id).await
    }

    async fn list_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        self.inner.list_alerts(query).await
    }

    async fn acknowledge_alert(
        &self,
        id: i64,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        self.inner.acknowledge_alert(id, user_id, at).await
    }

    async fn resolve_alert(
        &self,
        id: i64,
        user_id: &str,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        self.inner.resolve_alert(id, user_id, notes, at).await
    }
}

#[async_trait]
impl NotificationStore for RejectingAlertStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        self.inner.insert_notification(notification).await
    }

    async fn get_notification(&self, id: i64) -> Result<Option<Notification>> {
        self.inner.get_notification(id).await
    }

    async fn notifications_for(
        &self,
        user_id: &str,
        role: Option<&str>,
    ) -> Result<Vec<Notification>> {
        self.inner.notifications_for(user_id, role).await
    }

    async fn flag_notifications(
        &self,
        ids: &[i64],
        flag: NotificationFlag,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        self.inner.flag_notifications(ids, flag, at).await
    }

    async fn archived_notifications(&self) -> Result<Vec<Notification>> {
        self.inner.archived_notifications().await
    }

    async fn delete_notifications(&self, ids: &[i64]) -> Result<u64> {
        self.inner.delete_notifications(ids).await
    }
}

#[async_trait]
impl TemplateStore for RejectingAlertStore {
    async fn insert_template(
        &self,
        request: CreateTemplateRequest,
        now: DateTime<Utc>,
    ) -> Result<NotificationTemplate> {
        self.inner.insert_template(request, now).await
    }

    async fn update_template(
        &self,
        id: i64,
        update: &UpdateTemplateRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<NotificationTemplate>> {
        self.inner.update_template(id, update, now).await
    }

    async fn delete_template(&self, id: i64) -> Result<bool> {
        self.inner.delete_template(id).await
    }

    async fn get_template(&self, id: i64) -> Result<Option<NotificationTemplate>> {
        self.inner.get_template(id).await
    }

    async fn list_templates(&self, category: Option<&str>) -> Result<Vec<NotificationTemplate>> {
        self.inner.list_templates(category).await
    }

    async fn templates_for_event(&self, event: &str) -> Result<Vec<NotificationTemplate>> {
        self.inner.templates_for_event(event).await
    }
}

#[tokio::test]
async fn failed_alert_insert_keeps_metric_and_other_alerts() {
    let store = RejectingAlertStore {
        inner: MemoryStore::new(),
        rejected: AlertType::RateBelowTarget,
    };
    let state = AppState::new(Arc::new(store), ServerConfig::default());
    state
        .targets
        .create(serde_json::from_value(ext01_target()).unwrap())
        .await
        .unwrap();

    let request: SubmitMetricRequest = serde_json::from_value(ext01_bad_metric()).unwrap();
    let ingestion = state.monitor.submit_metric(request).await.unwrap();

    assert_eq!(ingestion.metric.section_id, "EXT01");
    let raised: Vec<AlertType> = ingestion.alerts.iter().map(|a| a.alert_type).collect();
    assert_eq!(raised.len(), 2);
    assert!(!raised.contains(&AlertType::RateBelowTarget));

    let stored = state.store.list_alerts(&AlertQuery::all()).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|a| a.section_id == "EXT01"));
    let metrics = state.store.list_metrics(Some("EXT01"), 10, 0).await.unwrap();
    assert_eq!(metrics.len(), 1);
}
