//! Static catalogue of suggested actions, keyed by alert type.

const EFFICIENCY_DROP: [&str; 5] = [
    "Inspect machine settings and calibration",
    "Check raw material quality and consistency",
    "Review operator staffing and workload for the shift",
    "Schedule preventive maintenance for the affected machine",
    "Compare current parameters with the last high-efficiency run",
];

const RATE_BELOW_TARGET: [&str; 5] = [
    "Verify line speed settings against the job specification",
    "Check for material feed interruptions",
    "Look for a bottleneck at the upstream stage",
    "Move an operator to support the slow station",
    "Review the job order schedule against realistic output",
];

const DOWNTIME_EXCEEDED: [&str; 5] = [
    "Record the root cause of the stoppage",
    "Dispatch maintenance to the affected machine",
    "Check spare parts availability",
    "Reschedule job orders that depend on this machine",
    "Review maintenance history for recurring faults",
];

const FALLBACK: &str = "Investigate the production issue and notify the shift supervisor";

/// Returns the suggested actions for an alert type name.
///
/// Unknown names get a single generic suggestion.
///
/// # Examples
///
/// ```
/// use rollmon_alert::suggestions::suggested_actions;
///
/// assert_eq!(suggested_actions("downtime_exceeded").len(), 5);
/// assert_eq!(suggested_actions("something_else").len(), 1);
/// ```
pub fn suggested_actions(kind: &str) -> Vec<String> {
    let actions: &[&str] = match kind {
        "efficiency_drop" => &EFFICIENCY_DROP,
        "rate_below_target" => &RATE_BELOW_TARGET,
        "downtime_exceeded" => &DOWNTIME_EXCEEDED,
        _ => &[FALLBACK],
    };
    actions.iter().map(|s| (*s).to_string()).collect()
}
