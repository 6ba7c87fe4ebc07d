pub mod downtime;
pub mod efficiency;
pub mod rate;

use rollmon_common::types::MetricRecord;

/// Estimated delay in whole hours: `ceil((expected / observed - 1) * factor)`.
///
/// A non-positive `expected` or `observed` yields 0 instead of a division by
/// zero or a negative estimate.
///
/// # Examples
///
/// ```
/// use rollmon_alert::rules::shortfall_delay_hours;
///
/// assert_eq!(shortfall_delay_hours(100.0, 40.0, 4.0), 6);
/// assert_eq!(shortfall_delay_hours(80.0, 0.0, 8.0), 0);
/// ```
pub fn shortfall_delay_hours(expected: f64, observed: f64, factor: f64) -> u32 {
    if expected <= 0.0 || observed <= 0.0 {
        return 0;
    }
    whole_hours((expected / observed - 1.0) * factor)
}

/// Rounds up to whole hours, clamping negatives and NaN to 0.
pub(crate) fn whole_hours(hours: f64) -> u32 {
    let rounded = hours.ceil();
    if rounded.is_nan() || rounded <= 0.0 {
        0
    } else {
        // `as` saturates at u32::MAX
        rounded as u32
    }
}

/// " on machine M-3" when the metric names a machine, empty otherwise.
pub(crate) fn machine_suffix(metric: &MetricRecord) -> String {
    metric
        .machine_id
        .as_deref()
        .map(|m| format!(" on machine {m}"))
        .unwrap_or_default()
}

pub(crate) fn affected_job_orders(metric: &MetricRecord) -> Vec<String> {
    metric.job_order_id.iter().cloned().collect()
}
