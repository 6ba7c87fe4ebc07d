use crate::{
    AlertQuery, AlertStore, MetricStore, NotificationFlag, NotificationStore, Result,
    TargetStore, TemplateStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollmon_common::notification::{
    CreateTemplateRequest, Notification, NotificationTemplate, UpdateTemplateRequest,
};
use rollmon_common::types::{
    Alert, AlertDraft, CreateTargetRequest, MetricRecord, ProductionStage, Shift,
    SubmitMetricRequest, Target, UpdateTargetRequest,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One entity kind: rows keyed by id plus the id sequence.
struct Table<T> {
    rows: RwLock<BTreeMap<i64, T>>,
    next_id: AtomicI64,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<i64, T>> {
        self.rows.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<i64, T>> {
        self.rows.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Assigns the next id under the write lock so ids and insertion order
    /// agree.
    fn insert_with(&self, build: impl FnOnce(i64) -> T) -> T {
        let mut rows = self.write();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = build(id);
        rows.insert(id, row.clone());
        row
    }

    fn get(&self, id: i64) -> Option<T> {
        self.read().get(&id).cloned()
    }

    fn update(&self, id: i64, apply: impl FnOnce(&mut T)) -> Option<T> {
        let mut rows = self.write();
        let row = rows.get_mut(&id)?;
        apply(row);
        Some(row.clone())
    }

    fn select(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.read().values().filter(|row| keep(row)).cloned().collect()
    }
}

/// In-process store. Nothing survives a restart.
pub struct MemoryStore {
    metrics: Table<MetricRecord>,
    targets: Table<Target>,
    alerts: Table<Alert>,
    notifications: Table<Notification>,
    templates: Table<NotificationTemplate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            metrics: Table::new(),
            targets: Table::new(),
            alerts: Table::new(),
            notifications: Table::new(),
            templates: Table::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn insert_metric(
        &self,
        request: SubmitMetricRequest,
        recorded_at: DateTime<Utc>,
    ) -> Result<MetricRecord> {
        Ok(self
            .metrics
            .insert_with(|id| request.into_record(id, recorded_at)))
    }

    async fn list_metrics(
        &self,
        section_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MetricRecord>> {
        let mut metrics = self
            .metrics
            .select(|m| section_id.map_or(true, |s| m.section_id == s));
        metrics.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        Ok(metrics.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn insert_target(
        &self,
        request: CreateTargetRequest,
        now: DateTime<Utc>,
    ) -> Result<Target> {
        Ok(self.targets.insert_with(|id| request.into_target(id, now)))
    }

    async fn update_target(
        &self,
        id: i64,
        update: &UpdateTargetRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<Target>> {
        Ok(self.targets.update(id, |t| t.apply_update(update, now)))
    }

    async fn get_target(&self, id: i64) -> Result<Option<Target>> {
        Ok(self.targets.get(id))
    }

    async fn list_targets(&self, section_id: Option<&str>) -> Result<Vec<Target>> {
        Ok(self
            .targets
            .select(|t| section_id.map_or(true, |s| t.section_id == s)))
    }

    async fn targets_for(
        &self,
        section_id: &str,
        stage: ProductionStage,
        shift: Shift,
    ) -> Result<Vec<Target>> {
        Ok(self.targets.select(|t| {
            t.section_id == section_id && t.stage == stage && t.shift == shift
        }))
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, draft: AlertDraft, detected_at: DateTime<Utc>) -> Result<Alert> {
        Ok(self
            .alerts
            .insert_with(|id| Alert::from_draft(id, draft, detected_at)))
    }

    async fn get_alert(&self, id: i64) -> Result<Option<Alert>> {
        Ok(self.alerts.get(id))
    }

    async fn list_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        let mut alerts = self.alerts.select(|a| query.matches(a));
        alerts.sort_by(|a, b| b.detected_at.cmp(&a.detected_at).then(b.id.cmp(&a.id)));
        Ok(alerts)
    }

    async fn acknowledge_alert(
        &self,
        id: i64,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        Ok(self.alerts.update(id, |alert| {
            alert.acknowledge(user_id, at);
        }))
    }

    async fn resolve_alert(
        &self,
        id: i64,
        user_id: &str,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        Ok(self
            .alerts
            .update(id, |alert| alert.resolve(user_id, notes, at)))
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        Ok(self.notifications.insert_with(|id| Notification {
            id,
            ..notification
        }))
    }

    async fn get_notification(&self, id: i64) -> Result<Option<Notification>> {
        Ok(self.notifications.get(id))
    }

    async fn notifications_for(
        &self,
        user_id: &str,
        role: Option<&str>,
    ) -> Result<Vec<Notification>> {
        Ok(self
            .notifications
            .select(|n| n.target.addresses(user_id, role)))
    }

    async fn flag_notifications(
        &self,
        ids: &[i64],
        flag: NotificationFlag,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut rows = self.notifications.write();
        let mut flagged = 0;
        for id in ids {
            if let Some(n) = rows.get_mut(id) {
                flag.apply(n, at);
                flagged += 1;
            }
        }
        Ok(flagged)
    }

    async fn archived_notifications(&self) -> Result<Vec<Notification>> {
        Ok(self.notifications.select(Notification::is_archived))
    }

    async fn delete_notifications(&self, ids: &[i64]) -> Result<u64> {
        let mut rows = self.notifications.write();
        let mut deleted = 0;
        for id in ids {
            if rows.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn insert_template(
        &self,
        request: CreateTemplateRequest,
        now: DateTime<Utc>,
    ) -> Result<NotificationTemplate> {
        Ok(self
            .templates
            .insert_with(|id| request.into_template(id, now)))
    }

    async fn update_template(
        &self,
        id: i64,
        update: &UpdateTemplateRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<NotificationTemplate>> {
        Ok(self.templates.update(id, |t| t.apply_update(update, now)))
    }

    async fn delete_template(&self, id: i64) -> Result<bool> {
        Ok(self.templates.write().remove(&id).is_some())
    }

    async fn get_template(&self, id: i64) -> Result<Option<NotificationTemplate>> {
        Ok(self.templates.get(id))
    }

    async fn list_templates(&self, category: Option<&str>) -> Result<Vec<NotificationTemplate>> {
        Ok(self
            .templates
            .select(|t| category.map_or(true, |c| t.category == c)))
    }

    async fn templates_for_event(&self, event: &str) -> Result<Vec<NotificationTemplate>> {
        Ok(self
            .templates
            .select(|t| t.active && t.trigger_event == event))
    }
}
