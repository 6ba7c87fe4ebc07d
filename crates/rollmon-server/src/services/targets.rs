use crate::error::{EngineError, Result};
use chrono::Utc;
use rollmon_common::types::{CreateTargetRequest, Target, UpdateTargetRequest};
use rollmon_storage::ProductionStore;
use std::sync::Arc;

/// Target administration. Updates apply in place and only affect metrics
/// ingested afterwards.
#[derive(Clone)]
pub struct TargetAdmin {
    store: Arc<dyn ProductionStore>,
}

impl TargetAdmin {
    pub fn new(store: Arc<dyn ProductionStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: CreateTargetRequest) -> Result<Target> {
        request.validate().map_err(EngineError::Validation)?;
        let target = self.store.insert_target(request, Utc::now()).await?;
        tracing::info!(
            target_id = target.id,
            section = %target.section_id,
            stage = %target.stage,
            shift = %target.shift,
            "Target created"
        );
        Ok(target)
    }

    pub async fn update(&self, id: i64, update: UpdateTargetRequest) -> Result<Target> {
        update.validate().map_err(EngineError::Validation)?;
        self.store
            .update_target(id, &update, Utc::now())
            .await?
            .ok_or_else(|| EngineError::not_found("target", id))
    }

    pub async fn get(&self, id: i64) -> Result<Target> {
        self.store
            .get_target(id)
            .await?
            .ok_or_else(|| EngineError::not_found("target", id))
    }

    pub async fn list(&self, section_id: Option<&str>) -> Result<Vec<Target>> {
        Ok(self.store.list_targets(section_id).await?)
    }
}
