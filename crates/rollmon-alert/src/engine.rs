use crate::rules::downtime::DowntimeExceededRule;
use crate::rules::efficiency::EfficiencyDropRule;
use crate::rules::rate::RateBelowTargetRule;
use crate::BottleneckRule;
use rollmon_common::types::{AlertDraft, MetricRecord, Target};

/// Runs every registered rule against a metric and collects the drafts.
///
/// Rules are independent: one metric may produce zero to `rules().len()`
/// drafts. Evaluation is pure; persisting the drafts is up to the caller.
pub struct BottleneckEvaluator {
    rules: Vec<Box<dyn BottleneckRule>>,
}

impl BottleneckEvaluator {
    pub fn new(rules: Vec<Box<dyn BottleneckRule>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Box<dyn BottleneckRule>] {
        &self.rules
    }

    /// Evaluates `metric` against its matched target. No target, no drafts.
    pub fn evaluate(&self, metric: &MetricRecord, target: Option<&Target>) -> Vec<AlertDraft> {
        let Some(target) = target else {
            tracing::debug!(
                section_id = %metric.section_id,
                stage = %metric.stage,
                shift = %metric.shift,
                "No target configured, skipping evaluation"
            );
            return Vec::new();
        };

        let drafts: Vec<AlertDraft> = self
            .rules
            .iter()
            .filter_map(|rule| rule.evaluate(metric, target))
            .collect();

        if !drafts.is_empty() {
            tracing::debug!(
                section_id = %metric.section_id,
                target_id = target.id,
                count = drafts.len(),
                "Bottleneck rules fired"
            );
        }
        drafts
    }
}

impl Default for BottleneckEvaluator {
    fn default() -> Self {
        Self::new(vec![
            Box::new(EfficiencyDropRule::default()),
            Box::new(RateBelowTargetRule::default()),
            Box::new(DowntimeExceededRule),
        ])
    }
}
