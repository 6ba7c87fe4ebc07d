use crate::rules::{affected_job_orders, machine_suffix, whole_hours};
use crate::suggestions::suggested_actions;
use crate::BottleneckRule;
use rollmon_common::types::{AlertDraft, AlertSeverity, AlertType, MetricRecord, Target};

/// Fires when reported downtime exceeds the target's allowance. Metrics
/// without a downtime figure never trigger it.
///
/// More than twice the allowance is `critical`, anything else `high`. The
/// delay is the downtime itself, rounded up to whole hours.
#[derive(Default)]
pub struct DowntimeExceededRule;

impl BottleneckRule for DowntimeExceededRule {
    fn kind(&self) -> AlertType {
        AlertType::DowntimeExceeded
    }

    fn evaluate(&self, metric: &MetricRecord, target: &Target) -> Option<AlertDraft> {
        let downtime = metric.downtime_minutes?;
        if downtime <= target.max_downtime_minutes {
            return None;
        }

        let severity = if downtime > target.max_downtime_minutes * 2.0 {
            AlertSeverity::Critical
        } else {
            AlertSeverity::High
        };

        Some(AlertDraft {
            alert_type: self.kind(),
            severity,
            section_id: metric.section_id.clone(),
            machine_id: metric.machine_id.clone(),
            title: format!(
                "Downtime exceeded in section {}{}",
                metric.section_id,
                machine_suffix(metric)
            ),
            description: format!(
                "Downtime of {downtime:.0} minutes exceeds the allowed {:.0} minutes ({} shift)",
                target.max_downtime_minutes, metric.shift,
            ),
            affected_job_orders: affected_job_orders(metric),
            estimated_delay_hours: whole_hours(downtime / 60.0),
            suggested_actions: suggested_actions(self.kind().as_str()),
        })
    }
}
