use crate::config::ServerConfig;
use crate::services::{
    AlertLifecycle, NotificationCenter, ProductionMonitor, TargetAdmin, TemplateService,
};
use chrono::{DateTime, Utc};
use rollmon_alert::engine::BottleneckEvaluator;
use rollmon_storage::ProductionStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductionStore>,
    pub monitor: ProductionMonitor,
    pub alerts: AlertLifecycle,
    pub notifications: NotificationCenter,
    pub templates: TemplateService,
    pub targets: TargetAdmin,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wires every service onto one store, with the built-in bottleneck
    /// rules.
    pub fn new(store: Arc<dyn ProductionStore>, config: ServerConfig) -> Self {
        let templates = TemplateService::new(store.clone());
        let notifications = NotificationCenter::new(store.clone());
        let alerts = AlertLifecycle::new(
            store.clone(),
            templates.clone(),
            notifications.clone(),
            config.alerting.clone(),
        );
        let monitor = ProductionMonitor::new(
            store.clone(),
            BottleneckEvaluator::default(),
            alerts.clone(),
        );
        let targets = TargetAdmin::new(store.clone());

        Self {
            store,
            monitor,
            alerts,
            notifications,
            templates,
            targets,
            start_time: Utc::now(),
            config: Arc::new(config),
        }
    }
}
