use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum acceptable efficiency applied when a target is created without one.
pub const DEFAULT_MIN_EFFICIENCY: f64 = 75.0;

/// Maximum acceptable downtime (minutes) applied when a target is created
/// without one.
pub const DEFAULT_MAX_DOWNTIME_MINUTES: f64 = 30.0;

string_enum! {
    /// Production line stage a measurement was taken at.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollmon_common::types::ProductionStage;
    ///
    /// let stage: ProductionStage = "Extruding".parse().unwrap();
    /// assert_eq!(stage, ProductionStage::Extruding);
    /// assert_eq!(stage.to_string(), "extruding");
    /// ```
    ProductionStage ("production stage") {
        Mixing => "mixing",
        Extruding => "extruding",
        Printing => "printing",
        Cutting => "cutting",
    }
}

string_enum! {
    /// Work shift a measurement or target belongs to.
    Shift ("shift") {
        Day => "day",
        Night => "night",
        Morning => "morning",
    }
}

string_enum! {
    /// The rule that produced an alert.
    AlertType ("alert type") {
        EfficiencyDrop => "efficiency_drop",
        RateBelowTarget => "rate_below_target",
        DowntimeExceeded => "downtime_exceeded",
    }
}

string_enum! {
    /// Alert severity, ordered from lowest to highest.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollmon_common::types::AlertSeverity;
    ///
    /// assert!(AlertSeverity::Critical > AlertSeverity::High);
    /// assert!(AlertSeverity::Medium > AlertSeverity::Low);
    /// ```
    #[derive(PartialOrd, Ord)]
    AlertSeverity ("alert severity") {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

string_enum! {
    /// Lifecycle state of an alert.
    ///
    /// `Active` is initial; `Resolved` and `Ignored` are terminal.
    AlertStatus ("alert status") {
        Active => "active",
        Acknowledged => "acknowledged",
        Resolved => "resolved",
        Ignored => "ignored",
    }
}

impl AlertStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Ignored)
    }
}

/// One production measurement. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricRecord {
    pub id: i64,
    pub section_id: String,
    pub machine_id: Option<String>,
    pub job_order_id: Option<String>,
    pub stage: ProductionStage,
    /// Units per hour the line was expected to produce.
    pub target_rate: f64,
    /// Units per hour the line actually produced.
    pub actual_rate: f64,
    /// Percentage in `0..=100`.
    pub efficiency: f64,
    pub downtime_minutes: Option<f64>,
    pub shift: Shift,
    pub operator_id: Option<String>,
    pub notes: Option<String>,
    /// Server clock at ingestion.
    pub recorded_at: DateTime<Utc>,
}

/// A metric submission, before the store assigns an id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubmitMetricRequest {
    pub section_id: String,
    #[serde(default)]
    pub machine_id: Option<String>,
    pub stage: ProductionStage,
    pub target_rate: f64,
    pub actual_rate: f64,
    pub efficiency: f64,
    #[serde(default)]
    pub downtime_minutes: Option<f64>,
    pub shift: Shift,
    #[serde(default)]
    pub operator_id: Option<String>,
    #[serde(default)]
    pub job_order_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SubmitMetricRequest {
    /// Checks the submission for malformed fields.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.section_id.trim().is_empty() {
            return Err("section_id must not be empty".to_string());
        }
        if !self.target_rate.is_finite() || self.target_rate < 0.0 {
            return Err("target_rate must be a non-negative number".to_string());
        }
        if !self.actual_rate.is_finite() || self.actual_rate < 0.0 {
            return Err("actual_rate must be a non-negative number".to_string());
        }
        if !self.efficiency.is_finite() || !(0.0..=100.0).contains(&self.efficiency) {
            return Err("efficiency must be between 0 and 100".to_string());
        }
        if let Some(downtime) = self.downtime_minutes {
            if !downtime.is_finite() || downtime < 0.0 {
                return Err("downtime_minutes must be a non-negative number".to_string());
            }
        }
        Ok(())
    }

    pub fn into_record(self, id: i64, recorded_at: DateTime<Utc>) -> MetricRecord {
        MetricRecord {
            id,
            section_id: self.section_id,
            machine_id: self.machine_id,
            job_order_id: self.job_order_id,
            stage: self.stage,
            target_rate: self.target_rate,
            actual_rate: self.actual_rate,
            efficiency: self.efficiency,
            downtime_minutes: self.downtime_minutes,
            shift: self.shift,
            operator_id: self.operator_id,
            notes: self.notes,
            recorded_at,
        }
    }
}

/// Acceptable-performance baseline for a (section, machine-or-wildcard,
/// stage, shift) combination.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Target {
    pub id: i64,
    pub section_id: String,
    /// `None` applies to every machine in the section.
    pub machine_id: Option<String>,
    pub stage: ProductionStage,
    pub shift: Shift,
    pub target_rate: f64,
    pub min_efficiency: f64,
    pub max_downtime_minutes: f64,
    pub active: bool,
    pub effective_from: DateTime<Utc>,
    /// `None` means open-ended.
    pub effective_to: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Target {
    /// Whether this target is the live baseline at `at`.
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        self.active
            && self.effective_from <= at
            && self.effective_to.map_or(true, |end| end > at)
    }

    pub fn is_wildcard(&self) -> bool {
        self.machine_id.is_none()
    }

    /// Applies a partial update in place.
    pub fn apply_update(&mut self, update: &UpdateTargetRequest, now: DateTime<Utc>) {
        if let Some(rate) = update.target_rate {
            self.target_rate = rate;
        }
        if let Some(min) = update.min_efficiency {
            self.min_efficiency = min;
        }
        if let Some(max) = update.max_downtime_minutes {
            self.max_downtime_minutes = max;
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        if let Some(effective_to) = update.effective_to {
            self.effective_to = effective_to;
        }
        self.updated_at = now;
    }
}

/// Target creation request.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateTargetRequest {
    pub section_id: String,
    #[serde(default)]
    pub machine_id: Option<String>,
    pub stage: ProductionStage,
    pub shift: Shift,
    pub target_rate: f64,
    /// Defaults to [`DEFAULT_MIN_EFFICIENCY`].
    #[serde(default)]
    pub min_efficiency: Option<f64>,
    /// Defaults to [`DEFAULT_MAX_DOWNTIME_MINUTES`].
    #[serde(default)]
    pub max_downtime_minutes: Option<f64>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl CreateTargetRequest {
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.section_id.trim().is_empty() {
            return Err("section_id must not be empty".to_string());
        }
        validate_target_numbers(
            Some(self.target_rate),
            self.min_efficiency,
            self.max_downtime_minutes,
        )
    }

    pub fn into_target(self, id: i64, now: DateTime<Utc>) -> Target {
        Target {
            id,
            section_id: self.section_id,
            machine_id: self.machine_id,
            stage: self.stage,
            shift: self.shift,
            target_rate: self.target_rate,
            min_efficiency: self.min_efficiency.unwrap_or(DEFAULT_MIN_EFFICIENCY),
            max_downtime_minutes: self
                .max_downtime_minutes
                .unwrap_or(DEFAULT_MAX_DOWNTIME_MINUTES),
            active: true,
            effective_from: now,
            effective_to: self.effective_to,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial target update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateTargetRequest {
    #[serde(default)]
    pub target_rate: Option<f64>,
    #[serde(default)]
    pub min_efficiency: Option<f64>,
    #[serde(default)]
    pub max_downtime_minutes: Option<f64>,
    #[serde(default)]
    pub active: Option<bool>,
    /// Pass `null` to make the target open-ended again.
    #[serde(default, with = "crate::serde_util::double_option")]
    #[schema(value_type = Option<String>)]
    pub effective_to: Option<Option<DateTime<Utc>>>,
}

impl UpdateTargetRequest {
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_target_numbers(
            self.target_rate,
            self.min_efficiency,
            self.max_downtime_minutes,
        )
    }
}

fn validate_target_numbers(
    target_rate: Option<f64>,
    min_efficiency: Option<f64>,
    max_downtime: Option<f64>,
) -> Result<(), String> {
    if let Some(rate) = target_rate {
        if !rate.is_finite() || rate <= 0.0 {
            return Err("target_rate must be greater than 0".to_string());
        }
    }
    if let Some(min) = min_efficiency {
        if !min.is_finite() || !(0.0..=100.0).contains(&min) {
            return Err("min_efficiency must be between 0 and 100".to_string());
        }
    }
    if let Some(max) = max_downtime {
        if !max.is_finite() || max < 0.0 {
            return Err("max_downtime_minutes must be a non-negative number".to_string());
        }
    }
    Ok(())
}

/// A rule violation produced by evaluation, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub section_id: String,
    pub machine_id: Option<String>,
    pub title: String,
    pub description: String,
    pub affected_job_orders: Vec<String>,
    /// Whole hours, never negative.
    pub estimated_delay_hours: u32,
    pub suggested_actions: Vec<String>,
}

/// A persisted alert and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Alert {
    pub id: i64,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub section_id: String,
    pub machine_id: Option<String>,
    pub title: String,
    pub description: String,
    pub affected_job_orders: Vec<String>,
    pub estimated_delay_hours: u32,
    pub suggested_actions: Vec<String>,
    pub status: AlertStatus,
    pub detected_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}

impl Alert {
    pub fn from_draft(id: i64, draft: AlertDraft, detected_at: DateTime<Utc>) -> Self {
        Self {
            id,
            alert_type: draft.alert_type,
            severity: draft.severity,
            section_id: draft.section_id,
            machine_id: draft.machine_id,
            title: draft.title,
            description: draft.description,
            affected_job_orders: draft.affected_job_orders,
            estimated_delay_hours: draft.estimated_delay_hours,
            suggested_actions: draft.suggested_actions,
            status: AlertStatus::Active,
            detected_at,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
        }
    }

    /// Moves an open alert to `Acknowledged`.
    ///
    /// Returns `false` and leaves the alert untouched when it is already in a
    /// terminal state.
    pub fn acknowledge(&mut self, user_id: &str, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = AlertStatus::Acknowledged;
        self.acknowledged_by = Some(user_id.to_string());
        self.acknowledged_at = Some(at);
        true
    }

    /// Moves the alert to `Resolved`. Acknowledging first is optional.
    ///
    /// Resolving an already-resolved alert overwrites the resolver, time and
    /// notes of the earlier resolution.
    pub fn resolve(&mut self, user_id: &str, notes: Option<String>, at: DateTime<Utc>) {
        self.status = AlertStatus::Resolved;
        self.resolved_by = Some(user_id.to_string());
        self.resolved_at = Some(at);
        self.resolution_notes = notes;
    }
}

/// Alert counts by status and severity.
#[derive(Debug, Clone, Default, Serialize, utoipa::ToSchema)]
pub struct AlertSummary {
    pub total: u64,
    pub by_status: HashMap<String, u64>,
    pub by_severity: HashMap<String, u64>,
    pub active_count: u64,
}

impl AlertSummary {
    pub fn from_alerts<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Self {
        let mut summary = Self::default();
        for alert in alerts {
            summary.total += 1;
            *summary
                .by_status
                .entry(alert.status.to_string())
                .or_insert(0) += 1;
            *summary
                .by_severity
                .entry(alert.severity.to_string())
                .or_insert(0) += 1;
            if alert.status == AlertStatus::Active {
                summary.active_count += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft() -> AlertDraft {
        AlertDraft {
            alert_type: AlertType::EfficiencyDrop,
            severity: AlertSeverity::High,
            section_id: "EXT01".into(),
            machine_id: None,
            title: "Efficiency drop".into(),
            description: "below target".into(),
            affected_job_orders: vec![],
            estimated_delay_hours: 2,
            suggested_actions: vec![],
        }
    }

    #[test]
    fn vocabularies_round_trip_through_strings() {
        for stage in ProductionStage::ALL {
            assert_eq!(stage.as_str().parse::<ProductionStage>(), Ok(*stage));
        }
        assert_eq!(
            "RATE_BELOW_TARGET".parse::<AlertType>(),
            Ok(AlertType::RateBelowTarget)
        );
        assert!("sideways".parse::<Shift>().is_err());
    }

    #[test]
    fn acknowledge_then_resolve() {
        let now = Utc::now();
        let mut alert = Alert::from_draft(1, draft(), now);
        assert_eq!(alert.status, AlertStatus::Active);

        assert!(alert.acknowledge("op-1", now));
        assert_eq!(alert.status, AlertStatus::Acknowledged);
        assert_eq!(alert.acknowledged_by.as_deref(), Some("op-1"));

        alert.resolve("sup-1", Some("cleaned die".into()), now);
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert_eq!(alert.resolution_notes.as_deref(), Some("cleaned die"));
    }

    #[test]
    fn acknowledge_is_a_no_op_once_resolved() {
        let now = Utc::now();
        let mut alert = Alert::from_draft(1, draft(), now);
        alert.resolve("sup-1", None, now);

        assert!(!alert.acknowledge("op-1", now));
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert!(alert.acknowledged_by.is_none());
    }

    #[test]
    fn second_resolve_overwrites_the_first() {
        let now = Utc::now();
        let mut alert = Alert::from_draft(1, draft(), now);
        alert.resolve("sup-1", Some("first".into()), now);
        alert.resolve("sup-2", Some("second".into()), now + Duration::minutes(5));

        assert_eq!(alert.resolved_by.as_deref(), Some("sup-2"));
        assert_eq!(alert.resolution_notes.as_deref(), Some("second"));
        assert_eq!(alert.resolved_at, Some(now + Duration::minutes(5)));
    }

    #[test]
    fn target_effective_window() {
        let now = Utc::now();
        let mut target = CreateTargetRequest {
            section_id: "EXT01".into(),
            machine_id: None,
            stage: ProductionStage::Extruding,
            shift: Shift::Day,
            target_rate: 100.0,
            min_efficiency: None,
            max_downtime_minutes: None,
            effective_to: Some(now + Duration::hours(1)),
            created_by: None,
        }
        .into_target(1, now);

        assert_eq!(target.min_efficiency, DEFAULT_MIN_EFFICIENCY);
        assert_eq!(target.max_downtime_minutes, DEFAULT_MAX_DOWNTIME_MINUTES);
        assert!(target.is_effective_at(now));
        assert!(!target.is_effective_at(now + Duration::hours(2)));
        assert!(!target.is_effective_at(now - Duration::seconds(1)));

        target.apply_update(
            &UpdateTargetRequest {
                effective_to: Some(None),
                ..Default::default()
            },
            now,
        );
        assert!(target.is_effective_at(now + Duration::hours(2)));

        target.apply_update(
            &UpdateTargetRequest {
                active: Some(false),
                ..Default::default()
            },
            now,
        );
        assert!(!target.is_effective_at(now));
    }

    #[test]
    fn metric_validation_rejects_out_of_range_efficiency() {
        let req = SubmitMetricRequest {
            section_id: "EXT01".into(),
            machine_id: None,
            stage: ProductionStage::Extruding,
            target_rate: 100.0,
            actual_rate: 90.0,
            efficiency: 120.0,
            downtime_minutes: None,
            shift: Shift::Day,
            operator_id: None,
            job_order_id: None,
            notes: None,
        };
        assert!(req.validate().is_err());

        let blank = SubmitMetricRequest {
            section_id: " ".into(),
            efficiency: 90.0,
            ..req
        };
        assert!(blank.validate().unwrap_err().contains("section_id"));
    }

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let absent: UpdateTargetRequest = serde_json::from_str("{}").unwrap();
        assert!(absent.effective_to.is_none());

        let null: UpdateTargetRequest =
            serde_json::from_str(r#"{"effective_to": null}"#).unwrap();
        assert_eq!(null.effective_to, Some(None));
    }

    #[test]
    fn summary_counts_by_status_and_severity() {
        let now = Utc::now();
        let a = Alert::from_draft(1, draft(), now);
        let mut b = Alert::from_draft(2, draft(), now);
        b.resolve("sup", None, now);

        let summary = AlertSummary::from_alerts([&a, &b]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.active_count, 1);
        assert_eq!(summary.by_status.get("resolved"), Some(&1));
        assert_eq!(summary.by_severity.get("high"), Some(&2));
    }
}
