use crate::error::{NotifyError, Result};
use rollmon_common::notification::{
    CreateTemplateRequest, NotificationDraft, NotificationTarget, NotificationTemplate,
    TriggerCondition,
};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Event payload / variable bag passed to templates.
pub type Variables = Map<String, Value>;

/// Replaces every `{{key}}` with the matching variable. No escaping, no
/// nesting; placeholders without a variable are left as written.
///
/// # Examples
///
/// ```
/// use rollmon_notify::template::render;
/// use serde_json::json;
///
/// let vars = json!({"section_id": "EXT01", "delay": 3});
/// let out = render("{{section_id}} late by {{delay}}h ({{unknown}})", vars.as_object().unwrap());
/// assert_eq!(out, "EXT01 late by 3h ({{unknown}})");
/// ```
pub fn render(template: &str, vars: &Variables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    // Single pass over the template; inserted values are never rescanned.
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after_open[..close];
        match vars.get(key) {
            Some(value) => out.push_str(&value_text(value)),
            None => out.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after_open[close + 2..];
    }
    out.push_str(rest);
    out
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Every condition must equal the corresponding payload value.
pub fn conditions_match(conditions: &[TriggerCondition], data: &Variables) -> bool {
    conditions.iter().all(|condition| match condition {
        TriggerCondition::Equals { key, value } => data.get(key) == Some(value),
    })
}

/// Expands an active template into a draft for `target`. Inactive templates
/// yield `None`.
///
/// Priority is copied from the template; when the template has none the
/// draft leaves it open for the prioritizer.
pub fn expand(
    template: &NotificationTemplate,
    vars: &Variables,
    target: NotificationTarget,
) -> Option<NotificationDraft> {
    if !template.active {
        return None;
    }

    let mut metadata = std::collections::HashMap::new();
    metadata.insert("template_id".to_string(), Value::from(template.id));
    metadata.insert(
        "trigger_event".to_string(),
        Value::from(template.trigger_event.clone()),
    );

    Some(NotificationDraft {
        title: render(&template.title_template, vars),
        message: render(&template.message_template, vars),
        notification_type: template.notification_type.clone(),
        priority: template.priority,
        category: template.category.clone(),
        source: Some(format!("template:{}", template.id)),
        target,
        action_required: template.action_required,
        action_url: template
            .action_url_template
            .as_deref()
            .map(|url| render(url, vars)),
        action_data: None,
        expires_at: None,
        metadata,
    })
}

/// Audience of an event fan-out. Exactly one mode applies per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanOut {
    Users(Vec<String>),
    Roles(Vec<String>),
    Broadcast,
}

impl FanOut {
    /// Users take precedence over roles; empty lists count as absent.
    pub fn from_lists(users: Option<Vec<String>>, roles: Option<Vec<String>>) -> Self {
        match (users, roles) {
            (Some(users), _) if !users.is_empty() => FanOut::Users(users),
            (_, Some(roles)) if !roles.is_empty() => FanOut::Roles(roles),
            _ => FanOut::Broadcast,
        }
    }

    pub fn targets(&self) -> Vec<NotificationTarget> {
        match self {
            FanOut::Users(users) => users
                .iter()
                .map(|u| NotificationTarget::User { user_id: u.clone() })
                .collect(),
            FanOut::Roles(roles) => roles
                .iter()
                .map(|r| NotificationTarget::Role { role: r.clone() })
                .collect(),
            FanOut::Broadcast => vec![NotificationTarget::Broadcast],
        }
    }
}

/// Drafts for every active template listening on `event` whose conditions
/// hold for `data`, one per audience member.
pub fn generate_from_event<'a>(
    templates: impl IntoIterator<Item = &'a NotificationTemplate>,
    event: &str,
    data: &Variables,
    fan_out: &FanOut,
) -> Vec<NotificationDraft> {
    let audience = fan_out.targets();
    let mut drafts = Vec::new();

    for template in templates {
        if !template.active
            || template.trigger_event != event
            || !conditions_match(&template.conditions, data)
        {
            continue;
        }
        drafts.extend(
            audience
                .iter()
                .filter_map(|target| expand(template, data, target.clone())),
        );
    }

    tracing::debug!(event, count = drafts.len(), "Expanded event templates");
    drafts
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedDocument {
    List(Vec<CreateTemplateRequest>),
    Wrapped { templates: Vec<CreateTemplateRequest> },
}

/// Parses a template seed file: either a bare JSON array of templates or an
/// object with a `templates` array. Every entry is validated.
///
/// # Errors
///
/// Returns [`NotifyError::JsonError`] for malformed JSON and
/// [`NotifyError::Invalid`] naming the first invalid entry.
pub fn parse_seed(json: &str) -> Result<Vec<CreateTemplateRequest>> {
    let templates = match serde_json::from_str::<SeedDocument>(json)? {
        SeedDocument::List(templates) | SeedDocument::Wrapped { templates } => templates,
    };
    for (index, template) in templates.iter().enumerate() {
        template
            .validate()
            .map_err(|e| NotifyError::Invalid(format!("template #{index} ({}): {e}", template.name)))?;
    }
    Ok(templates)
}
