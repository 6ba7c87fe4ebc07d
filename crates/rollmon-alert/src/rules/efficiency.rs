use crate::rules::{affected_job_orders, machine_suffix, shortfall_delay_hours};
use crate::suggestions::suggested_actions;
use crate::BottleneckRule;
use rollmon_common::types::{AlertDraft, AlertSeverity, AlertType, MetricRecord, Target};

/// Fires when efficiency falls under the target's minimum.
///
/// Severity: `critical` below 50%, `high` below 65%, `medium` otherwise.
/// Delay assumes a full 8-hour shift is stretched by the efficiency gap.
pub struct EfficiencyDropRule {
    pub critical_below: f64,
    pub high_below: f64,
    pub shift_hours: f64,
}

impl Default for EfficiencyDropRule {
    fn default() -> Self {
        Self {
            critical_below: 50.0,
            high_below: 65.0,
            shift_hours: 8.0,
        }
    }
}

impl EfficiencyDropRule {
    fn severity(&self, efficiency: f64) -> AlertSeverity {
        if efficiency < self.critical_below {
            AlertSeverity::Critical
        } else if efficiency < self.high_below {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        }
    }
}

impl BottleneckRule for EfficiencyDropRule {
    fn kind(&self) -> AlertType {
        AlertType::EfficiencyDrop
    }

    fn evaluate(&self, metric: &MetricRecord, target: &Target) -> Option<AlertDraft> {
        if metric.efficiency >= target.min_efficiency {
            return None;
        }

        Some(AlertDraft {
            alert_type: self.kind(),
            severity: self.severity(metric.efficiency),
            section_id: metric.section_id.clone(),
            machine_id: metric.machine_id.clone(),
            title: format!(
                "Efficiency drop in section {}{}",
                metric.section_id,
                machine_suffix(metric)
            ),
            description: format!(
                "Efficiency {:.1}% is below the minimum of {:.1}% at the {} stage ({} shift)",
                metric.efficiency, target.min_efficiency, metric.stage, metric.shift,
            ),
            affected_job_orders: affected_job_orders(metric),
            estimated_delay_hours: shortfall_delay_hours(
                target.min_efficiency,
                metric.efficiency,
                self.shift_hours,
            ),
            suggested_actions: suggested_actions(self.kind().as_str()),
        })
    }
}
