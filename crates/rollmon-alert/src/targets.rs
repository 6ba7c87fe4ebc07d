use chrono::{DateTime, Utc};
use rollmon_common::types::{MetricRecord, Target};

/// Picks the target a metric is evaluated against.
///
/// Only targets for the metric's section, stage and shift that are effective
/// at `at` are considered. A target naming the metric's machine beats the
/// section-wide wildcard; among equals the latest `effective_from` wins, then
/// the highest id.
pub fn match_target<'a>(
    targets: impl IntoIterator<Item = &'a Target>,
    metric: &MetricRecord,
    at: DateTime<Utc>,
) -> Option<&'a Target> {
    let mut exact: Option<&Target> = None;
    let mut wildcard: Option<&Target> = None;

    for target in targets {
        if target.section_id != metric.section_id
            || target.stage != metric.stage
            || target.shift != metric.shift
            || !target.is_effective_at(at)
        {
            continue;
        }

        let slot = match (&target.machine_id, &metric.machine_id) {
            (None, _) => &mut wildcard,
            (Some(t), Some(m)) if t == m => &mut exact,
            _ => continue,
        };
        if slot.map_or(true, |current| newer(target, current)) {
            *slot = Some(target);
        }
    }

    exact.or(wildcard)
}

fn newer(candidate: &Target, current: &Target) -> bool {
    (candidate.effective_from, candidate.id) > (current.effective_from, current.id)
}
