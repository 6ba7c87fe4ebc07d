use chrono::{DateTime, Utc};
use rollmon_common::notification::{Notification, NotificationPriority};

/// Whether `n` may be shown to `user_id` acting with `role`.
///
/// A user-targeted notification is visible only to that user, a role-targeted
/// one only to callers with that role, a broadcast to everyone. Anything past
/// its `expires_at` is hidden regardless of flags.
pub fn is_visible(n: &Notification, user_id: &str, role: Option<&str>, now: DateTime<Utc>) -> bool {
    !n.is_expired_at(now) && n.target.addresses(user_id, role)
}

/// Whether the sweeper may delete `n`: archived and strictly past expiry.
///
/// Expired notifications that were never archived stay in storage; they are
/// only hidden by [`is_visible`].
pub fn is_reclaimable(n: &Notification, now: DateTime<Utc>) -> bool {
    n.is_archived() && n.expires_at.is_some_and(|at| at < now)
}

/// Caller-side filters for listing notifications.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub category: Option<String>,
    pub priority: Option<NotificationPriority>,
    pub unread_only: bool,
    /// Also return archived and dismissed notifications.
    pub include_archived: bool,
    pub limit: usize,
    pub offset: usize,
}

impl NotificationFilter {
    pub fn matches(&self, n: &Notification) -> bool {
        if let Some(category) = &self.category {
            if !n.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if self.priority.is_some_and(|p| p != n.priority) {
            return false;
        }
        if self.unread_only && n.is_read() {
            return false;
        }
        if !self.include_archived && (n.is_archived() || n.is_dismissed()) {
            return false;
        }
        true
    }
}

/// Visible, filtered, delivery-ordered page of `candidates`.
pub fn select_for_user(
    candidates: Vec<Notification>,
    user_id: &str,
    role: Option<&str>,
    filter: &NotificationFilter,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let mut visible: Vec<Notification> = candidates
        .into_iter()
        .filter(|n| is_visible(n, user_id, role, now) && filter.matches(n))
        .collect();
    crate::priority::sort_for_delivery(&mut visible);

    let limit = if filter.limit == 0 { usize::MAX } else { filter.limit };
    visible.into_iter().skip(filter.offset).take(limit).collect()
}
