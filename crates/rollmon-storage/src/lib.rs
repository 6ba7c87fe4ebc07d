//! Repository layer for metrics, targets, alerts, notifications and
//! notification templates.
//!
//! Services depend on the traits below, never on a concrete backend. Two
//! backends ship with the crate: [`memory::MemoryStore`] for tests and
//! single-process deployments, and [`sqlite::SqliteStore`] for a durable
//! single-file database.

pub mod error;
pub mod memory;
pub mod sqlite;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollmon_common::notification::{
    CreateTemplateRequest, Notification, NotificationTemplate, UpdateTemplateRequest,
};
use rollmon_common::types::{
    Alert, AlertDraft, CreateTargetRequest, MetricRecord, ProductionStage, Shift,
    SubmitMetricRequest, Target, UpdateTargetRequest,
};

pub use error::{Result, StorageError};

/// Filter for alert listings. Results are ordered by `detected_at`, newest
/// first.
///
/// # Examples
///
/// ```
/// use rollmon_storage::AlertQuery;
///
/// let query = AlertQuery::active();
/// assert!(query.active_only);
/// assert!(query.section_id.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    pub section_id: Option<String>,
    pub active_only: bool,
}

impl AlertQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn active() -> Self {
        Self {
            section_id: None,
            active_only: true,
        }
    }

    pub fn section(section_id: impl Into<String>) -> Self {
        Self {
            section_id: Some(section_id.into()),
            active_only: false,
        }
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        if self.active_only && alert.status != rollmon_common::types::AlertStatus::Active {
            return false;
        }
        self.section_id
            .as_deref()
            .map_or(true, |section| alert.section_id == section)
    }
}

/// Timestamp flags a recipient can set on a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationFlag {
    Read,
    Dismissed,
    Archived,
}

impl NotificationFlag {
    /// Sets the flag unless it is already set; the first timestamp is kept.
    pub fn apply(self, n: &mut Notification, at: DateTime<Utc>) {
        let slot = match self {
            NotificationFlag::Read => &mut n.read_at,
            NotificationFlag::Dismissed => &mut n.dismissed_at,
            NotificationFlag::Archived => &mut n.archived_at,
        };
        if slot.is_none() {
            *slot = Some(at);
        }
    }
}

/// Append-only log of production measurements.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Persists a submission and returns the stored record with its id.
    async fn insert_metric(
        &self,
        request: SubmitMetricRequest,
        recorded_at: DateTime<Utc>,
    ) -> Result<MetricRecord>;

    /// Newest first.
    async fn list_metrics(
        &self,
        section_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MetricRecord>>;
}

#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn insert_target(&self, request: CreateTargetRequest, now: DateTime<Utc>)
        -> Result<Target>;

    /// Applies a partial update. `None` when the id is unknown.
    async fn update_target(
        &self,
        id: i64,
        update: &UpdateTargetRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<Target>>;

    async fn get_target(&self, id: i64) -> Result<Option<Target>>;

    /// Ordered by id.
    async fn list_targets(&self, section_id: Option<&str>) -> Result<Vec<Target>>;

    /// Every target (any machine, any activity state) for the combination.
    /// Callers pick the effective one.
    async fn targets_for(
        &self,
        section_id: &str,
        stage: ProductionStage,
        shift: Shift,
    ) -> Result<Vec<Target>>;
}

/// Alert persistence. Acknowledge and resolve are atomic per alert id.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Stores a new `active` alert under the next id.
    async fn insert_alert(&self, draft: AlertDraft, detected_at: DateTime<Utc>) -> Result<Alert>;

    async fn get_alert(&self, id: i64) -> Result<Option<Alert>>;

    async fn list_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>>;

    /// `None` when the id is unknown. Terminal alerts are returned unchanged.
    async fn acknowledge_alert(
        &self,
        id: i64,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>>;

    /// `None` when the id is unknown. Resolving twice overwrites the resolver
    /// and notes.
    async fn resolve_alert(
        &self,
        id: i64,
        user_id: &str,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Stores `notification` under the next id (its own `id` is ignored).
    async fn insert_notification(&self, notification: Notification) -> Result<Notification>;

    async fn get_notification(&self, id: i64) -> Result<Option<Notification>>;

    /// Notifications addressed to the user, to `role`, or to everyone.
    /// Expiry is not applied here.
    async fn notifications_for(&self, user_id: &str, role: Option<&str>)
        -> Result<Vec<Notification>>;

    /// Sets a flag on each listed notification; returns how many existed.
    async fn flag_notifications(
        &self,
        ids: &[i64],
        flag: NotificationFlag,
        at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Archived notifications, the only ones eligible for deletion.
    async fn archived_notifications(&self) -> Result<Vec<Notification>>;

    async fn delete_notifications(&self, ids: &[i64]) -> Result<u64>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn insert_template(
        &self,
        request: CreateTemplateRequest,
        now: DateTime<Utc>,
    ) -> Result<NotificationTemplate>;

    async fn update_template(
        &self,
        id: i64,
        update: &UpdateTemplateRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<NotificationTemplate>>;

    /// `false` when the id is unknown.
    async fn delete_template(&self, id: i64) -> Result<bool>;

    async fn get_template(&self, id: i64) -> Result<Option<NotificationTemplate>>;

    /// Ordered by id.
    async fn list_templates(&self, category: Option<&str>) -> Result<Vec<NotificationTemplate>>;

    /// Active templates listening on `event`, ordered by id.
    async fn templates_for_event(&self, event: &str) -> Result<Vec<NotificationTemplate>>;
}

/// Everything the server needs from one backend.
pub trait ProductionStore:
    MetricStore + TargetStore + AlertStore + NotificationStore + TemplateStore
{
}

impl<T> ProductionStore for T where
    T: MetricStore + TargetStore + AlertStore + NotificationStore + TemplateStore
{
}
