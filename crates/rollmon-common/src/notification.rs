use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

string_enum! {
    /// Notification priority, ordered from lowest to highest.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollmon_common::notification::NotificationPriority;
    ///
    /// assert_eq!(NotificationPriority::Urgent.rank(), 5);
    /// assert!(NotificationPriority::Critical > NotificationPriority::High);
    /// ```
    #[derive(PartialOrd, Ord)]
    NotificationPriority ("notification priority") {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
        Urgent => "urgent",
    }
}

impl NotificationPriority {
    /// Sort rank used for delivery ordering (`urgent=5` .. `low=1`).
    pub fn rank(&self) -> u8 {
        match self {
            NotificationPriority::Low => 1,
            NotificationPriority::Medium => 2,
            NotificationPriority::High => 3,
            NotificationPriority::Critical => 4,
            NotificationPriority::Urgent => 5,
        }
    }
}

/// Audience of a notification: one user, one role, or everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationTarget {
    #[default]
    Broadcast,
    User { user_id: String },
    Role { role: String },
}

impl NotificationTarget {
    /// Builds a target from the optional user/role pair used on the wire.
    ///
    /// # Errors
    ///
    /// Fails when both a user and a role are given.
    pub fn from_parts(user_id: Option<String>, role: Option<String>) -> Result<Self, String> {
        match (user_id, role) {
            (Some(_), Some(_)) => {
                Err("a notification targets a user or a role, not both".to_string())
            }
            (Some(user_id), None) => Ok(NotificationTarget::User { user_id }),
            (None, Some(role)) => Ok(NotificationTarget::Role { role }),
            (None, None) => Ok(NotificationTarget::Broadcast),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            NotificationTarget::User { user_id } => Some(user_id),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<&str> {
        match self {
            NotificationTarget::Role { role } => Some(role),
            _ => None,
        }
    }

    /// Whether a caller with `user_id` and `role` is in this audience.
    /// Expiry and flags are not considered. The SQLite store encodes the same
    /// rule in `notifications_for`.
    pub fn addresses(&self, user_id: &str, role: Option<&str>) -> bool {
        match self {
            NotificationTarget::User { user_id: target } => target == user_id,
            NotificationTarget::Role { role: target } => role == Some(target.as_str()),
            NotificationTarget::Broadcast => true,
        }
    }
}

/// A stored notification.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub priority: NotificationPriority,
    pub category: String,
    /// Producer of the notification, e.g. `template:12`.
    pub source: Option<String>,
    pub target: NotificationTarget,
    pub read_at: Option<DateTime<Utc>>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub action_required: bool,
    pub action_url: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub action_data: Option<Value>,
    /// `None` never auto-expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, Value>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed_at.is_some()
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A notification as requested by a producer. Priority and expiry may be
/// left for the prioritizer to fill in.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default = "default_notification_type")]
    pub notification_type: String,
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: NotificationTarget,
    #[serde(default)]
    pub action_required: bool,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub action_data: Option<Value>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, Value>,
}

impl Default for NotificationDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            message: String::new(),
            notification_type: default_notification_type(),
            priority: None,
            category: default_category(),
            source: None,
            target: NotificationTarget::Broadcast,
            action_required: false,
            action_url: None,
            action_data: None,
            expires_at: None,
            metadata: HashMap::new(),
        }
    }
}

fn default_notification_type() -> String {
    "info".to_string()
}

fn default_category() -> String {
    "system".to_string()
}

impl NotificationDraft {
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.message.trim().is_empty() {
            return Err("message must not be empty".to_string());
        }
        Ok(())
    }

    /// Materialises the draft once priority and expiry are decided. The id is
    /// assigned by the store.
    pub fn into_notification(
        self,
        priority: NotificationPriority,
        expires_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id: 0,
            title: self.title,
            message: self.message,
            notification_type: self.notification_type,
            priority,
            category: self.category,
            source: self.source,
            target: self.target,
            read_at: None,
            dismissed_at: None,
            archived_at: None,
            action_required: self.action_required,
            action_url: self.action_url,
            action_data: self.action_data,
            expires_at,
            created_at,
            metadata: self.metadata,
        }
    }
}

/// One equality check against the event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TriggerCondition {
    Equals {
        key: String,
        #[schema(value_type = Object)]
        value: Value,
    },
}

impl TriggerCondition {
    pub fn equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        TriggerCondition::Equals {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Reusable blueprint for notifications raised by named system events.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationTemplate {
    pub id: i64,
    pub name: String,
    pub category: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    /// When absent the prioritizer derives one from type and category.
    pub priority: Option<NotificationPriority>,
    /// Title with `{{variable}}` placeholders.
    pub title_template: String,
    pub message_template: String,
    pub action_required: bool,
    pub action_url_template: Option<String>,
    pub active: bool,
    pub trigger_event: String,
    /// All must hold; empty means always.
    pub conditions: Vec<TriggerCondition>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationTemplate {
    /// Applies a partial update in place.
    pub fn apply_update(&mut self, update: &UpdateTemplateRequest, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(category) = &update.category {
            self.category = category.clone();
        }
        if let Some(kind) = &update.notification_type {
            self.notification_type = kind.clone();
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(title) = &update.title_template {
            self.title_template = title.clone();
        }
        if let Some(message) = &update.message_template {
            self.message_template = message.clone();
        }
        if let Some(action_required) = update.action_required {
            self.action_required = action_required;
        }
        if let Some(url) = &update.action_url_template {
            self.action_url_template = url.clone();
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        if let Some(event) = &update.trigger_event {
            self.trigger_event = event.clone();
        }
        if let Some(conditions) = &update.conditions {
            self.conditions = conditions.clone();
        }
        self.updated_at = now;
    }
}

/// Template creation request.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(rename = "type", default = "default_notification_type")]
    pub notification_type: String,
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    pub title_template: String,
    pub message_template: String,
    #[serde(default)]
    pub action_required: bool,
    #[serde(default)]
    pub action_url_template: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub trigger_event: String,
    #[serde(default)]
    pub conditions: Vec<TriggerCondition>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_active() -> bool {
    true
}

impl CreateTemplateRequest {
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.title_template.trim().is_empty() {
            return Err("title_template must not be empty".to_string());
        }
        if self.trigger_event.trim().is_empty() {
            return Err("trigger_event must not be empty".to_string());
        }
        Ok(())
    }

    pub fn into_template(self, id: i64, now: DateTime<Utc>) -> NotificationTemplate {
        NotificationTemplate {
            id,
            name: self.name,
            category: self.category,
            notification_type: self.notification_type,
            priority: self.priority,
            title_template: self.title_template,
            message_template: self.message_template,
            action_required: self.action_required,
            action_url_template: self.action_url_template,
            active: self.active,
            trigger_event: self.trigger_event,
            conditions: self.conditions,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial template update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateTemplateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type", default)]
    pub notification_type: Option<String>,
    #[serde(default, with = "crate::serde_util::double_option")]
    #[schema(value_type = Option<NotificationPriority>)]
    pub priority: Option<Option<NotificationPriority>>,
    #[serde(default)]
    pub title_template: Option<String>,
    #[serde(default)]
    pub message_template: Option<String>,
    #[serde(default)]
    pub action_required: Option<bool>,
    #[serde(default, with = "crate::serde_util::double_option")]
    #[schema(value_type = Option<String>)]
    pub action_url_template: Option<Option<String>>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub trigger_event: Option<String>,
    #[serde(default)]
    pub conditions: Option<Vec<TriggerCondition>>,
}

impl UpdateTemplateRequest {
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&self.name) {
            return Err("name must not be empty".to_string());
        }
        if blank(&self.title_template) {
            return Err("title_template must not be empty".to_string());
        }
        if blank(&self.trigger_event) {
            return Err("trigger_event must not be empty".to_string());
        }
        Ok(())
    }
}
