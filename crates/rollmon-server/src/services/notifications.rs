use crate::error::{EngineError, Result};
use crate::identity::Caller;
use chrono::{DateTime, Utc};
use rollmon_common::notification::{Notification, NotificationDraft, NotificationTarget};
use rollmon_notify::priority::prioritize;
use rollmon_notify::stats::{NotificationStats, UnreadCount};
use rollmon_notify::visibility::{is_visible, select_for_user, NotificationFilter};
use rollmon_storage::{NotificationFlag, ProductionStore};
use std::sync::Arc;

/// One page of a caller's notifications plus the unpaged match count.
#[derive(Debug, Clone)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub total: u64,
}

/// Per-recipient view over stored notifications.
///
/// Every read and flag operation is scoped to what the caller can see: a
/// notification addressed to someone else, or already expired, behaves as if
/// it did not exist.
#[derive(Clone)]
pub struct NotificationCenter {
    store: Arc<dyn ProductionStore>,
}

impl NotificationCenter {
    pub fn new(store: Arc<dyn ProductionStore>) -> Self {
        Self { store }
    }

    /// Fills in priority and expiry, then stores the notification.
    pub async fn create(&self, draft: NotificationDraft) -> Result<Notification> {
        draft.validate().map_err(EngineError::Validation)?;
        let notification = self.store.insert_notification(prioritize(draft, Utc::now())).await?;
        tracing::debug!(
            notification_id = notification.id,
            priority = %notification.priority,
            "Notification created"
        );
        Ok(notification)
    }

    /// Sends `draft` to everyone holding `role`, or to everyone when no role
    /// is given. Any target on the draft is replaced.
    pub async fn broadcast(
        &self,
        mut draft: NotificationDraft,
        role: Option<String>,
    ) -> Result<Notification> {
        draft.target = match role {
            Some(role) => NotificationTarget::Role { role },
            None => NotificationTarget::Broadcast,
        };
        self.create(draft).await
    }

    pub async fn list(&self, caller: &Caller, filter: &NotificationFilter) -> Result<NotificationPage> {
        let now = Utc::now();
        let candidates = self
            .store
            .notifications_for(&caller.user_id, caller.role())
            .await?;
        let total = candidates
            .iter()
            .filter(|n| is_visible(n, &caller.user_id, caller.role(), now) && filter.matches(n))
            .count() as u64;
        let items = select_for_user(candidates, &caller.user_id, caller.role(), filter, now);
        Ok(NotificationPage { items, total })
    }

    pub async fn mark_read(&self, id: i64, caller: &Caller) -> Result<Notification> {
        self.flag_one(id, caller, NotificationFlag::Read).await
    }

    pub async fn dismiss(&self, id: i64, caller: &Caller) -> Result<Notification> {
        self.flag_one(id, caller, NotificationFlag::Dismissed).await
    }

    pub async fn archive(&self, id: i64, caller: &Caller) -> Result<Notification> {
        self.flag_one(id, caller, NotificationFlag::Archived).await
    }

    /// Marks every visible unread notification as read, optionally limited to
    /// one category. Returns how many were marked.
    pub async fn mark_all_read(&self, caller: &Caller, category: Option<&str>) -> Result<u64> {
        let now = Utc::now();
        let ids: Vec<i64> = self
            .visible(caller, now)
            .await?
            .into_iter()
            .filter(|n| !n.is_read())
            .filter(|n| category.map_or(true, |c| n.category.eq_ignore_ascii_case(c)))
            .map(|n| n.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(self
            .store
            .flag_notifications(&ids, NotificationFlag::Read, now)
            .await?)
    }

    pub async fn unread_count(&self, caller: &Caller) -> Result<UnreadCount> {
        let visible = self.visible(caller, Utc::now()).await?;
        Ok(UnreadCount::from_visible(&visible))
    }

    pub async fn stats(&self, caller: &Caller) -> Result<NotificationStats> {
        let visible = self.visible(caller, Utc::now()).await?;
        Ok(NotificationStats::from_visible(&visible))
    }

    async fn visible(&self, caller: &Caller, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        let candidates = self
            .store
            .notifications_for(&caller.user_id, caller.role())
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|n| is_visible(n, &caller.user_id, caller.role(), now))
            .collect())
    }

    async fn flag_one(
        &self,
        id: i64,
        caller: &Caller,
        flag: NotificationFlag,
    ) -> Result<Notification> {
        let now = Utc::now();
        let visible = self
            .store
            .get_notification(id)
            .await?
            .is_some_and(|n| is_visible(&n, &caller.user_id, caller.role(), now));
        if !visible {
            return Err(EngineError::not_found("notification", id));
        }

        self.store.flag_notifications(&[id], flag, now).await?;
        self.store
            .get_notification(id)
            .await?
            .ok_or_else(|| EngineError::not_found("notification", id))
    }
}
