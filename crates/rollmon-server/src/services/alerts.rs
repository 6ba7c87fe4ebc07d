use crate::config::AlertingConfig;
use crate::error::{EngineError, Result};
use crate::services::notifications::NotificationCenter;
use crate::services::templates::TemplateService;
use chrono::Utc;
use rollmon_common::notification::{NotificationDraft, NotificationTarget};
use rollmon_common::types::{Alert, AlertDraft, AlertStatus, AlertSummary};
use rollmon_notify::priority::priority_for_severity;
use rollmon_notify::template::{FanOut, Variables};
use rollmon_storage::{AlertQuery, ProductionStore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const ALERT_ACKNOWLEDGED_EVENT: &str = "alert_acknowledged";
pub const ALERT_RESOLVED_EVENT: &str = "alert_resolved";

/// Alert persistence and state transitions, plus the events that tell the
/// notification inbox about them.
#[derive(Clone)]
pub struct AlertLifecycle {
    store: Arc<dyn ProductionStore>,
    templates: TemplateService,
    notifications: NotificationCenter,
    alerting: AlertingConfig,
}

impl AlertLifecycle {
    pub fn new(
        store: Arc<dyn ProductionStore>,
        templates: TemplateService,
        notifications: NotificationCenter,
        alerting: AlertingConfig,
    ) -> Self {
        Self {
            store,
            templates,
            notifications,
            alerting,
        }
    }

    pub async fn create(&self, draft: AlertDraft) -> Result<Alert> {
        let alert = self.store.insert_alert(draft, Utc::now()).await?;
        tracing::info!(
            alert_id = alert.id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            section = %alert.section_id,
            "Alert raised"
        );
        Ok(alert)
    }

    /// Acknowledging a resolved or ignored alert leaves it unchanged and
    /// returns it as stored.
    pub async fn acknowledge(&self, id: i64, user_id: &str) -> Result<Alert> {
        let alert = self
            .store
            .acknowledge_alert(id, user_id, Utc::now())
            .await?
            .ok_or_else(|| EngineError::not_found("alert", id))?;

        if alert.status == AlertStatus::Acknowledged {
            tracing::info!(alert_id = id, user = user_id, "Alert acknowledged");
            self.announce(&alert, ALERT_ACKNOWLEDGED_EVENT, Some(user_id))
                .await;
        }
        Ok(alert)
    }

    /// Resolving twice overwrites the earlier resolver, time and notes.
    pub async fn resolve(&self, id: i64, user_id: &str, notes: Option<String>) -> Result<Alert> {
        let alert = self
            .store
            .resolve_alert(id, user_id, notes, Utc::now())
            .await?
            .ok_or_else(|| EngineError::not_found("alert", id))?;

        tracing::info!(alert_id = id, user = user_id, "Alert resolved");
        self.announce(&alert, ALERT_RESOLVED_EVENT, Some(user_id))
            .await;
        Ok(alert)
    }

    /// Newest first.
    pub async fn list(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        Ok(self.store.list_alerts(query).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Alert>> {
        self.list(&AlertQuery::all()).await
    }

    pub async fn list_active(&self) -> Result<Vec<Alert>> {
        self.list(&AlertQuery::active()).await
    }

    pub async fn list_by_section(&self, section_id: &str) -> Result<Vec<Alert>> {
        self.list(&AlertQuery::section(section_id)).await
    }

    pub async fn summary(&self) -> Result<AlertSummary> {
        let alerts = self.list_all().await?;
        Ok(AlertSummary::from_alerts(&alerts))
    }

    /// Emits the configured detection event for a new alert. When no template
    /// listens and a fallback role is configured, that role gets a direct
    /// notification instead.
    pub async fn announce_detected(&self, alert: &Alert) {
        let event = self.alerting.alert_event.clone();
        let delivered = self.announce(alert, &event, None).await;
        if delivered != Some(0) {
            return;
        }

        let Some(role) = self.alerting.fallback_role() else {
            return;
        };
        match self.notifications.create(fallback_draft(alert, role)).await {
            Ok(n) => tracing::info!(
                alert_id = alert.id,
                notification_id = n.id,
                role,
                "No template for alert event, notified fallback role"
            ),
            Err(e) => tracing::error!(
                alert_id = alert.id,
                error = %e,
                "Failed to notify fallback role"
            ),
        }
    }

    /// Broadcasts `event` through the templates. Returns how many
    /// notifications were stored, or `None` when notifying is disabled or
    /// failed. Failures are logged; the alert itself is already committed.
    async fn announce(&self, alert: &Alert, event: &str, actor: Option<&str>) -> Option<usize> {
        if !self.alerting.notify_on_alert {
            return None;
        }
        let mut vars = alert_variables(alert);
        if let Some(actor) = actor {
            vars.insert("user_id".to_string(), Value::from(actor));
        }

        match self
            .templates
            .generate_from_event(event, &vars, &FanOut::Broadcast)
            .await
        {
            Ok(created) => Some(created.len()),
            Err(e) => {
                tracing::error!(alert_id = alert.id, event, error = %e, "Failed to emit alert event");
                None
            }
        }
    }
}

/// Template variables describing an alert.
pub fn alert_variables(alert: &Alert) -> Variables {
    let mut vars = Variables::new();
    vars.insert("alert_id".to_string(), Value::from(alert.id));
    vars.insert(
        "alert_type".to_string(),
        Value::from(alert.alert_type.as_str()),
    );
    vars.insert("severity".to_string(), Value::from(alert.severity.as_str()));
    vars.insert("section_id".to_string(), Value::from(alert.section_id.clone()));
    vars.insert(
        "machine_id".to_string(),
        alert.machine_id.clone().map_or(Value::Null, Value::from),
    );
    vars.insert("title".to_string(), Value::from(alert.title.clone()));
    vars.insert(
        "description".to_string(),
        Value::from(alert.description.clone()),
    );
    vars.insert(
        "estimated_delay".to_string(),
        Value::from(alert.estimated_delay_hours),
    );
    vars.insert("status".to_string(), Value::from(alert.status.as_str()));
    vars
}

fn fallback_draft(alert: &Alert, role: &str) -> NotificationDraft {
    let mut metadata = HashMap::new();
    metadata.insert("alert_id".to_string(), Value::from(alert.id));

    NotificationDraft {
        title: alert.title.clone(),
        message: alert.description.clone(),
        notification_type: "alert".to_string(),
        priority: Some(priority_for_severity(alert.severity)),
        category: "production".to_string(),
        source: Some(format!("alert:{}", alert.id)),
        target: NotificationTarget::Role {
            role: role.to_string(),
        },
        action_required: true,
        action_url: None,
        action_data: Some(serde_json::json!({ "alert_id": alert.id })),
        expires_at: None,
        metadata,
    }
}
