use crate::error::{EngineError, Result};
use chrono::Utc;
use rollmon_common::notification::{
    CreateTemplateRequest, Notification, NotificationTarget, NotificationTemplate,
    UpdateTemplateRequest,
};
use rollmon_notify::priority::prioritize_rendered;
use rollmon_notify::template::{self, FanOut, Variables};
use rollmon_storage::ProductionStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of loading a seed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedOutcome {
    pub created: u32,
    pub skipped: u32,
}

/// Template administration and event-driven notification generation.
#[derive(Clone)]
pub struct TemplateService {
    store: Arc<dyn ProductionStore>,
}

impl TemplateService {
    pub fn new(store: Arc<dyn ProductionStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: CreateTemplateRequest) -> Result<NotificationTemplate> {
        request.validate().map_err(EngineError::Validation)?;
        let template = self.store.insert_template(request, Utc::now()).await?;
        tracing::info!(
            template_id = template.id,
            event = %template.trigger_event,
            "Notification template created"
        );
        Ok(template)
    }

    pub async fn update(
        &self,
        id: i64,
        update: UpdateTemplateRequest,
    ) -> Result<NotificationTemplate> {
        update.validate().map_err(EngineError::Validation)?;
        self.store
            .update_template(id, &update, Utc::now())
            .await?
            .ok_or_else(|| EngineError::not_found("template", id))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if self.store.delete_template(id).await? {
            Ok(())
        } else {
            Err(EngineError::not_found("template", id))
        }
    }

    pub async fn list(&self, category: Option<&str>) -> Result<Vec<NotificationTemplate>> {
        Ok(self.store.list_templates(category).await?)
    }

    /// Renders one template for `target` and stores the notification.
    /// `None` when the template is missing or inactive.
    pub async fn expand(
        &self,
        id: i64,
        vars: &Variables,
        target: NotificationTarget,
    ) -> Result<Option<Notification>> {
        let Some(found) = self.store.get_template(id).await? else {
            return Ok(None);
        };
        let Some(draft) = template::expand(&found, vars, target) else {
            return Ok(None);
        };
        let stored = self
            .store
            .insert_notification(prioritize_rendered(draft, Utc::now()))
            .await?;
        Ok(Some(stored))
    }

    /// Stores one notification per matching template and audience member.
    ///
    /// Storage failures abort the call; notifications stored before the
    /// failure are kept.
    pub async fn generate_from_event(
        &self,
        event: &str,
        data: &Variables,
        fan_out: &FanOut,
    ) -> Result<Vec<Notification>> {
        let templates = self.store.templates_for_event(event).await?;
        let drafts = template::generate_from_event(&templates, event, data, fan_out);

        let now = Utc::now();
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            created.push(self.store.insert_notification(prioritize_rendered(draft, now)).await?);
        }

        if !created.is_empty() {
            tracing::info!(event, count = created.len(), "Notifications generated from event");
        }
        Ok(created)
    }

    /// Inserts templates whose name is not taken yet.
    pub async fn seed(&self, requests: Vec<CreateTemplateRequest>) -> Result<SeedOutcome> {
        let mut existing: HashSet<String> = self
            .store
            .list_templates(None)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();

        let mut outcome = SeedOutcome::default();
        for request in requests {
            if existing.contains(&request.name) {
                tracing::info!(name = %request.name, "Template already exists, skipping");
                outcome.skipped += 1;
                continue;
            }
            let created = self.create(request).await?;
            existing.insert(created.name);
            outcome.created += 1;
        }
        Ok(outcome)
    }
}
