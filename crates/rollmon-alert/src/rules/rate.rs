use crate::rules::{affected_job_orders, machine_suffix, shortfall_delay_hours};
use crate::suggestions::suggested_actions;
use crate::BottleneckRule;
use rollmon_common::types::{AlertDraft, AlertSeverity, AlertType, MetricRecord, Target};

/// Fires when the actual output rate drops below `trigger_ratio` of the
/// target rate; `critical` under `critical_ratio`, `high` otherwise.
pub struct RateBelowTargetRule {
    pub trigger_ratio: f64,
    pub critical_ratio: f64,
    pub delay_factor: f64,
}

impl Default for RateBelowTargetRule {
    fn default() -> Self {
        Self {
            trigger_ratio: 0.8,
            critical_ratio: 0.5,
            delay_factor: 4.0,
        }
    }
}

impl BottleneckRule for RateBelowTargetRule {
    fn kind(&self) -> AlertType {
        AlertType::RateBelowTarget
    }

    fn evaluate(&self, metric: &MetricRecord, target: &Target) -> Option<AlertDraft> {
        if metric.actual_rate >= target.target_rate * self.trigger_ratio {
            return None;
        }

        let severity = if metric.actual_rate < target.target_rate * self.critical_ratio {
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
                "Production rate below target in section {}{}",
                metric.section_id,
                machine_suffix(metric)
            ),
            description: format!(
                "Actual rate {:.1} units/h is below {:.0}% of the {:.1} units/h target at the {} stage",
                metric.actual_rate,
                self.trigger_ratio * 100.0,
                target.target_rate,
                metric.stage,
            ),
            affected_job_orders: affected_job_orders(metric),
            estimated_delay_hours: shortfall_delay_hours(
                target.target_rate,
                metric.actual_rate,
                self.delay_factor,
            ),
            suggested_actions: suggested_actions(self.kind().as_str()),
        })
    }
}
