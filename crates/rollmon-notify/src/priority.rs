use chrono::{DateTime, Duration, Utc};
use rollmon_common::notification::{Notification, NotificationDraft, NotificationPriority};
use rollmon_common::types::AlertSeverity;
use std::cmp::Ordering;

/// Derives a priority for a notification created without one.
///
/// The checks run in a fixed order and the first hit wins, so
/// `type=system, category=quality` is `high`.
pub fn default_priority(notification_type: &str, category: &str) -> NotificationPriority {
    let is_type = |t: &str| notification_type.eq_ignore_ascii_case(t);
    let is_category = |c: &str| category.eq_ignore_ascii_case(c);

    if is_type("alert") || is_category("quality") {
        return NotificationPriority::High;
    }
    if is_type("warning") || is_category("maintenance") {
        return NotificationPriority::Medium;
    }
    if is_type("system") || is_category("hr") {
        return NotificationPriority::Medium;
    }
    if is_category("production") {
        return NotificationPriority::High;
    }
    NotificationPriority::Medium
}

/// Lifetime of a notification whose producer gave no `expires_at`.
pub fn expiry_hours(priority: NotificationPriority) -> i64 {
    match priority {
        NotificationPriority::Urgent => 1,
        NotificationPriority::Critical => 4,
        NotificationPriority::High => 24,
        NotificationPriority::Medium => 72,
        NotificationPriority::Low => 168,
    }
}

pub fn default_expiry(priority: NotificationPriority, now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(expiry_hours(priority))
}

/// Priority of the notification raised for an alert of the given severity.
pub fn priority_for_severity(severity: AlertSeverity) -> NotificationPriority {
    match severity {
        AlertSeverity::Low => NotificationPriority::Low,
        AlertSeverity::Medium => NotificationPriority::Medium,
        AlertSeverity::High => NotificationPriority::High,
        AlertSeverity::Critical => NotificationPriority::Critical,
    }
}

/// Fills in priority and expiry where the draft left them open and stamps
/// the creation time.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use rollmon_common::notification::{NotificationDraft, NotificationPriority};
/// use rollmon_notify::priority::prioritize;
///
/// let now = Utc::now();
/// let draft = NotificationDraft {
///     title: "Line stopped".into(),
///     message: "Extruder 2 is down".into(),
///     priority: Some(NotificationPriority::Critical),
///     ..Default::default()
/// };
/// let n = prioritize(draft, now);
/// assert_eq!(n.expires_at, Some(now + Duration::hours(4)));
/// ```
pub fn prioritize(draft: NotificationDraft, now: DateTime<Utc>) -> Notification {
    let priority = draft
        .priority
        .unwrap_or_else(|| default_priority(&draft.notification_type, &draft.category));
    let expires_at = draft
        .expires_at
        .unwrap_or_else(|| default_expiry(priority, now));
    draft.into_notification(priority, Some(expires_at), now)
}

/// Finalises a draft rendered from a template.
///
/// A template that names its own priority keeps it, and the notification
/// gets no default expiry. Only a template without a priority falls back to
/// [`prioritize`] for both.
pub fn prioritize_rendered(draft: NotificationDraft, now: DateTime<Utc>) -> Notification {
    match draft.priority {
        Some(priority) => {
            let expires_at = draft.expires_at;
            draft.into_notification(priority, expires_at, now)
        }
        None => prioritize(draft, now),
    }
}

/// Delivery order: higher priority first, then newer first. Equal
/// timestamps fall back to the higher id.
pub fn delivery_order(a: &Notification, b: &Notification) -> Ordering {
    b.priority
        .rank()
        .cmp(&a.priority.rank())
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

pub fn sort_for_delivery(notifications: &mut [Notification]) {
    notifications.sort_by(delivery_order);
}
