use crate::error::{EngineError, Result};
use crate::services::alerts::AlertLifecycle;
use chrono::Utc;
use rollmon_alert::engine::BottleneckEvaluator;
use rollmon_alert::targets::match_target;
use rollmon_common::types::{Alert, MetricRecord, SubmitMetricRequest};
use rollmon_storage::ProductionStore;
use serde::Serialize;
use std::sync::Arc;

/// A stored metric and the alerts it raised.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Ingestion {
    pub metric: MetricRecord,
    pub alerts: Vec<Alert>,
}

/// Metric ingestion: persist, evaluate against the live target, raise
/// alerts.
#[derive(Clone)]
pub struct ProductionMonitor {
    store: Arc<dyn ProductionStore>,
    evaluator: Arc<BottleneckEvaluator>,
    alerts: AlertLifecycle,
}

impl ProductionMonitor {
    pub fn new(
        store: Arc<dyn ProductionStore>,
        evaluator: BottleneckEvaluator,
        alerts: AlertLifecycle,
    ) -> Self {
        Self {
            store,
            evaluator: Arc::new(evaluator),
            alerts,
        }
    }

    /// Stores the metric, then evaluates it against the target effective at
    /// ingestion time.
    ///
    /// If the metric cannot be stored the call fails and no alert is raised.
    /// Each alert draft is persisted on its own; a failed write is logged
    /// and does not stop the others.
    pub async fn submit_metric(&self, request: SubmitMetricRequest) -> Result<Ingestion> {
        request.validate().map_err(EngineError::Validation)?;

        let candidates = self
            .store
            .targets_for(&request.section_id, request.stage, request.shift)
            .await?;
        let now = Utc::now();
        let metric = self.store.insert_metric(request, now).await?;

        let target = match_target(&candidates, &metric, now);
        let drafts = self.evaluator.evaluate(&metric, target);
        if target.is_none() {
            tracing::debug!(
                metric_id = metric.id,
                section = %metric.section_id,
                "No effective target, metric not evaluated"
            );
        }

        let mut raised = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let alert_type = draft.alert_type;
            match self.alerts.create(draft).await {
                Ok(alert) => raised.push(alert),
                Err(e) => tracing::error!(
                    metric_id = metric.id,
                    alert_type = %alert_type,
                    error = %e,
                    "Failed to persist alert"
                ),
            }
        }

        for alert in &raised {
            self.alerts.announce_detected(alert).await;
        }

        Ok(Ingestion {
            metric,
            alerts: raised,
        })
    }

    /// Newest first.
    pub async fn list_metrics(
        &self,
        section_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MetricRecord>> {
        Ok(self.store.list_metrics(section_id, limit, offset).await?)
    }
}
