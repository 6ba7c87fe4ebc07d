use rollmon_common::notification::{Notification, NotificationPriority};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unread notifications for one caller. Only the top three priorities are
/// broken out; medium and low contribute to `total` alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnreadCount {
    pub total: u64,
    pub urgent: u64,
    pub critical: u64,
    pub high: u64,
}

impl UnreadCount {
    /// Counts unread, non-archived, non-dismissed entries. Callers pass only
    /// notifications that are already visible.
    pub fn from_visible<'a>(notifications: impl IntoIterator<Item = &'a Notification>) -> Self {
        let mut count = UnreadCount::default();
        for n in notifications {
            if n.is_read() || n.is_archived() || n.is_dismissed() {
                continue;
            }
            count.total += 1;
            match n.priority {
                NotificationPriority::Urgent => count.urgent += 1,
                NotificationPriority::Critical => count.critical += 1,
                NotificationPriority::High => count.high += 1,
                NotificationPriority::Medium | NotificationPriority::Low => {}
            }
        }
        count
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationStats {
    pub total: u64,
    pub unread: u64,
    pub archived: u64,
    pub dismissed: u64,
    pub action_required: u64,
    pub by_category: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
}

impl NotificationStats {
    pub fn from_visible<'a>(notifications: impl IntoIterator<Item = &'a Notification>) -> Self {
        let mut stats = NotificationStats::default();
        for n in notifications {
            stats.total += 1;
            if !n.is_read() {
                stats.unread += 1;
            }
            if n.is_archived() {
                stats.archived += 1;
            }
            if n.is_dismissed() {
                stats.dismissed += 1;
            }
            if n.action_required {
                stats.action_required += 1;
            }
            *stats.by_category.entry(n.category.clone()).or_default() += 1;
            *stats
                .by_priority
                .entry(n.priority.as_str().to_string())
                .or_default() += 1;
        }
        stats
    }
}
