use crate::engine::BottleneckEvaluator;
use crate::rules::downtime::DowntimeExceededRule;
use crate::rules::efficiency::EfficiencyDropRule;
use crate::rules::rate::RateBelowTargetRule;
use crate::suggestions::suggested_actions;
use crate::targets::match_target;
use crate::BottleneckRule;
use chrono::{DateTime, Duration, Utc};
use rollmon_common::types::{
    AlertSeverity, AlertType, MetricRecord, ProductionStage, Shift, Target,
};

fn make_metric(actual_rate: f64, efficiency: f64, downtime: Option<f64>) -> MetricRecord {
    MetricRecord {
        id: 1,
        section_id: "EXT01".into(),
        machine_id: Some("M-1".into()),
        job_order_id: Some("JO-42".into()),
        stage: ProductionStage::Extruding,
        target_rate: 100.0,
        actual_rate,
        efficiency,
        downtime_minutes: downtime,
        shift: Shift::Day,
        operator_id: None,
        notes: None,
        recorded_at: Utc::now(),
    }
}

fn make_target(id: i64, machine: Option<&str>, from: DateTime<Utc>) -> Target {
    Target {
        id,
        section_id: "EXT01".into(),
        machine_id: machine.map(str::to_string),
        stage: ProductionStage::Extruding,
        shift: Shift::Day,
        target_rate: 100.0,
        min_efficiency: 80.0,
        max_downtime_minutes: 30.0,
        active: true,
        effective_from: from,
        effective_to: None,
        created_by: None,
        created_at: from,
        updated_at: from,
    }
}

fn default_target() -> Target {
    make_target(1, None, Utc::now() - Duration::days(1))
}

#[test]
fn severe_metric_fires_all_three_rules() {
    let evaluator = BottleneckEvaluator::default();
    let metric = make_metric(40.0, 45.0, Some(70.0));
    let target = default_target();

    let drafts = evaluator.evaluate(&metric, Some(&target));
    assert_eq!(drafts.len(), 3);
    assert!(drafts.iter().all(|d| d.severity == AlertSeverity::Critical));

    let delay = |kind: AlertType| {
        drafts
            .iter()
            .find(|d| d.alert_type == kind)
            .map(|d| d.estimated_delay_hours)
    };
    assert_eq!(delay(AlertType::EfficiencyDrop), Some(7));
    assert_eq!(delay(AlertType::RateBelowTarget), Some(6));
    assert_eq!(delay(AlertType::DowntimeExceeded), Some(2));

    for draft in &drafts {
        assert_eq!(draft.section_id, "EXT01");
        assert_eq!(draft.machine_id.as_deref(), Some("M-1"));
        assert_eq!(draft.affected_job_orders, vec!["JO-42".to_string()]);
        assert_eq!(draft.suggested_actions.len(), 5);
    }
}

#[test]
fn no_target_means_no_drafts() {
    let evaluator = BottleneckEvaluator::default();
    let metric = make_metric(0.0, 0.0, Some(600.0));
    assert!(evaluator.evaluate(&metric, None).is_empty());
}

#[test]
fn healthy_metric_fires_nothing() {
    let evaluator = BottleneckEvaluator::default();
    let metric = make_metric(95.0, 90.0, Some(10.0));
    assert!(evaluator.evaluate(&metric, Some(&default_target())).is_empty());
}

#[test]
fn rules_fire_independently() {
    let evaluator = BottleneckEvaluator::default();
    let target = default_target();

    // Only downtime is out of bounds.
    let drafts = evaluator.evaluate(&make_metric(95.0, 90.0, Some(45.0)), Some(&target));
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].alert_type, AlertType::DowntimeExceeded);
    assert_eq!(drafts[0].severity, AlertSeverity::High);

    // Efficiency and rate, no downtime reported.
    let drafts = evaluator.evaluate(&make_metric(70.0, 70.0, None), Some(&target));
    let kinds: Vec<AlertType> = drafts.iter().map(|d| d.alert_type).collect();
    assert_eq!(kinds, vec![AlertType::EfficiencyDrop, AlertType::RateBelowTarget]);
}

#[test]
fn efficiency_severity_boundaries() {
    let rule = EfficiencyDropRule::default();
    let target = default_target();
    let severity_at = |eff: f64| {
        rule.evaluate(&make_metric(100.0, eff, None), &target)
            .map(|d| d.severity)
    };

    assert_eq!(severity_at(49.9), Some(AlertSeverity::Critical));
    assert_eq!(severity_at(50.0), Some(AlertSeverity::High));
    assert_eq!(severity_at(64.9), Some(AlertSeverity::High));
    assert_eq!(severity_at(65.0), Some(AlertSeverity::Medium));
    assert_eq!(severity_at(79.9), Some(AlertSeverity::Medium));
    assert_eq!(severity_at(80.0), None);
}

#[test]
fn efficiency_severity_never_rises_with_efficiency() {
    let rule = EfficiencyDropRule::default();
    let target = default_target();
    let mut previous = AlertSeverity::Critical;

    for step in 1..160 {
        let eff = f64::from(step) * 0.5;
        let Some(draft) = rule.evaluate(&make_metric(100.0, eff, None), &target) else {
            assert!(eff >= target.min_efficiency);
            continue;
        };
        assert!(draft.severity <= previous, "severity rose at {eff}");
        previous = draft.severity;
    }
}

#[test]
fn zero_efficiency_yields_zero_delay() {
    let rule = EfficiencyDropRule::default();
    let draft = rule
        .evaluate(&make_metric(100.0, 0.0, None), &default_target())
        .unwrap();
    assert_eq!(draft.severity, AlertSeverity::Critical);
    assert_eq!(draft.estimated_delay_hours, 0);
}

#[test]
fn rate_rule_uses_target_rate_and_guards_zero() {
    let rule = RateBelowTargetRule::default();
    let mut target = default_target();
    target.target_rate = 200.0;

    // 150 is above the metric's own target_rate but below 80% of the target's.
    let draft = rule.evaluate(&make_metric(150.0, 90.0, None), &target).unwrap();
    assert_eq!(draft.severity, AlertSeverity::High);
    assert_eq!(draft.estimated_delay_hours, 2);

    let draft = rule.evaluate(&make_metric(0.0, 90.0, None), &target).unwrap();
    assert_eq!(draft.severity, AlertSeverity::Critical);
    assert_eq!(draft.estimated_delay_hours, 0);

    assert!(rule.evaluate(&make_metric(160.0, 90.0, None), &target).is_none());
}

#[test]
fn downtime_rule_severity_and_delay() {
    let rule = DowntimeExceededRule;
    let target = default_target();

    assert!(rule.evaluate(&make_metric(100.0, 90.0, Some(30.0)), &target).is_none());
    assert!(rule.evaluate(&make_metric(100.0, 90.0, None), &target).is_none());

    let high = rule.evaluate(&make_metric(100.0, 90.0, Some(60.0)), &target).unwrap();
    assert_eq!(high.severity, AlertSeverity::High);
    assert_eq!(high.estimated_delay_hours, 1);

    let critical = rule.evaluate(&make_metric(100.0, 90.0, Some(121.0)), &target).unwrap();
    assert_eq!(critical.severity, AlertSeverity::Critical);
    assert_eq!(critical.estimated_delay_hours, 3);
}

#[test]
fn suggestions_are_selected_by_kind() {
    for kind in AlertType::ALL {
        let actions = suggested_actions(kind.as_str());
        assert_eq!(actions.len(), 5, "{kind}");
    }
    assert_ne!(
        suggested_actions("efficiency_drop"),
        suggested_actions("downtime_exceeded")
    );
    assert_eq!(suggested_actions("unknown_kind").len(), 1);
}

#[test]
fn exact_machine_target_beats_wildcard() {
    let now = Utc::now();
    let wildcard = make_target(1, None, now - Duration::days(2));
    let exact = make_target(2, Some("M-1"), now - Duration::days(5));
    let other = make_target(3, Some("M-2"), now - Duration::days(1));
    let targets = vec![wildcard, exact, other];

    let metric = make_metric(100.0, 90.0, None);
    assert_eq!(match_target(&targets, &metric, now).map(|t| t.id), Some(2));

    let mut unknown_machine = metric.clone();
    unknown_machine.machine_id = Some("M-9".into());
    assert_eq!(
        match_target(&targets, &unknown_machine, now).map(|t| t.id),
        Some(1)
    );

    let mut no_machine = metric;
    no_machine.machine_id = None;
    assert_eq!(match_target(&targets, &no_machine, now).map(|t| t.id), Some(1));
}

#[test]
fn inactive_and_expired_targets_are_skipped() {
    let now = Utc::now();
    let mut inactive = make_target(1, Some("M-1"), now - Duration::days(3));
    inactive.active = false;
    let mut expired = make_target(2, Some("M-1"), now - Duration::days(3));
    expired.effective_to = Some(now - Duration::hours(1));
    let future = make_target(3, Some("M-1"), now + Duration::hours(1));
    let wildcard = make_target(4, None, now - Duration::days(3));
    let targets = vec![inactive, expired, future, wildcard];

    let metric = make_metric(100.0, 90.0, None);
    assert_eq!(match_target(&targets, &metric, now).map(|t| t.id), Some(4));
}

#[test]
fn latest_effective_target_wins() {
    let now = Utc::now();
    let older = make_target(1, None, now - Duration::days(10));
    let newer = make_target(2, None, now - Duration::days(1));
    let targets = vec![newer, older];

    let metric = make_metric(100.0, 90.0, None);
    assert_eq!(match_target(&targets, &metric, now).map(|t| t.id), Some(2));
}

#[test]
fn other_stage_or_shift_does_not_match() {
    let now = Utc::now();
    let mut night = make_target(1, None, now - Duration::days(1));
    night.shift = Shift::Night;
    let mut printing = make_target(2, None, now - Duration::days(1));
    printing.stage = ProductionStage::Printing;
    let targets = vec![night, printing];

    assert!(match_target(&targets, &make_metric(100.0, 90.0, None), now).is_none());
}
