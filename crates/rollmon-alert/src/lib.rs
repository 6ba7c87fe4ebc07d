//! Bottleneck detection for production metrics.
//!
//! A [`engine::BottleneckEvaluator`] runs every registered
//! [`BottleneckRule`] against a freshly ingested metric and the target that
//! was live when it arrived. Built-in rules cover efficiency drops, output
//! rate shortfalls and excessive downtime. [`targets`] picks the target a
//! metric is measured against.
//!
//! Nothing in this crate performs I/O; persistence of the resulting drafts
//! is the caller's job.

pub mod engine;
pub mod rules;
pub mod suggestions;
pub mod targets;

#[cfg(test)]
mod tests;

use rollmon_common::types::{AlertDraft, AlertType, MetricRecord, Target};

/// A production rule that compares one metric against its target and
/// optionally produces an [`AlertDraft`].
///
/// Rules are independent: the evaluator runs all of them and never lets one
/// suppress another.
pub trait BottleneckRule: Send + Sync {
    /// The alert type this rule raises.
    fn kind(&self) -> AlertType;

    /// Evaluates the metric and returns a draft if the target is violated.
    fn evaluate(&self, metric: &MetricRecord, target: &Target) -> Option<AlertDraft>;
}
