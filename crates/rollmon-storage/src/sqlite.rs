use crate::{
    AlertQuery, AlertStore, MetricStore, NotificationFlag, NotificationStore, Result,
    TargetStore, TemplateStore,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rollmon_common::notification::{
    CreateTemplateRequest, Notification, NotificationPriority, NotificationTarget,
    NotificationTemplate, UpdateTemplateRequest,
};
use rollmon_common::types::{
    Alert, AlertDraft, CreateTargetRequest, MetricRecord, ProductionStage, Shift,
    SubmitMetricRequest, Target, UpdateTargetRequest,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    section_id TEXT NOT NULL,
    machine_id TEXT,
    job_order_id TEXT,
    stage TEXT NOT NULL,
    target_rate REAL NOT NULL,
    actual_rate REAL NOT NULL,
    efficiency REAL NOT NULL,
    downtime_minutes REAL,
    shift TEXT NOT NULL,
    operator_id TEXT,
    notes TEXT,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metrics_section ON metrics(section_id, recorded_at);

CREATE TABLE IF NOT EXISTS targets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    section_id TEXT NOT NULL,
    machine_id TEXT,
    stage TEXT NOT NULL,
    shift TEXT NOT NULL,
    target_rate REAL NOT NULL,
    min_efficiency REAL NOT NULL,
    max_downtime_minutes REAL NOT NULL,
    active INTEGER NOT NULL,
    effective_from TEXT NOT NULL,
    effective_to TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_targets_lookup ON targets(section_id, stage, shift);

CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    section_id TEXT NOT NULL,
    machine_id TEXT,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    affected_job_orders TEXT NOT NULL DEFAULT '[]',
    estimated_delay_hours INTEGER NOT NULL,
    suggested_actions TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL,
    detected_at TEXT NOT NULL,
    acknowledged_at TEXT,
    acknowledged_by TEXT,
    resolved_at TEXT,
    resolved_by TEXT,
    resolution_notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_alerts_status ON alerts(status);
CREATE INDEX IF NOT EXISTS idx_alerts_section ON alerts(section_id);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    type TEXT NOT NULL,
    priority TEXT NOT NULL,
    category TEXT NOT NULL,
    source TEXT,
    target_user TEXT,
    target_role TEXT,
    read_at TEXT,
    dismissed_at TEXT,
    archived_at TEXT,
    action_required INTEGER NOT NULL,
    action_url TEXT,
    action_data TEXT,
    expires_at TEXT,
    created_at TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(target_user);
CREATE INDEX IF NOT EXISTS idx_notifications_archived ON notifications(archived_at);

CREATE TABLE IF NOT EXISTS notification_templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    type TEXT NOT NULL,
    priority TEXT,
    title_template TEXT NOT NULL,
    message_template TEXT NOT NULL,
    action_required INTEGER NOT NULL,
    action_url_template TEXT,
    active INTEGER NOT NULL,
    trigger_event TEXT NOT NULL,
    conditions TEXT NOT NULL DEFAULT '[]',
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_templates_event ON notification_templates(trigger_event);
";

const METRIC_COLUMNS: &str = "id, section_id, machine_id, job_order_id, stage, target_rate, \
     actual_rate, efficiency, downtime_minutes, shift, operator_id, notes, recorded_at";

const TARGET_COLUMNS: &str = "id, section_id, machine_id, stage, shift, target_rate, \
     min_efficiency, max_downtime_minutes, active, effective_from, effective_to, created_by, \
     created_at, updated_at";

const ALERT_COLUMNS: &str = "id, alert_type, severity, section_id, machine_id, title, \
     description, affected_job_orders, estimated_delay_hours, suggested_actions, status, \
     detected_at, acknowledged_at, acknowledged_by, resolved_at, resolved_by, resolution_notes";

const NOTIFICATION_COLUMNS: &str = "id, title, message, type, priority, category, source, \
     target_user, target_role, read_at, dismissed_at, archived_at, action_required, action_url, \
     action_data, expires_at, created_at, metadata";

const TEMPLATE_COLUMNS: &str = "id, name, category, type, priority, title_template, \
     message_template, action_required, action_url_template, active, trigger_event, conditions, \
     created_by, created_at, updated_at";

/// Single-file SQLite backend. One connection, serialised by a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::init(conn)?;
        tracing::info!(path = %path.display(), "Opened SQLite store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---- column conversion ----

fn ts(value: DateTime<Utc>) -> String {
    // Fixed width so text comparison orders like time.
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn opt_ts(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(ts)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e.to_string()))
    })
    .transpose()
}

fn enum_col<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn metric_from_row(row: &Row<'_>) -> rusqlite::Result<MetricRecord> {
    Ok(MetricRecord {
        id: row.get(0)?,
        section_id: row.get(1)?,
        machine_id: row.get(2)?,
        job_order_id: row.get(3)?,
        stage: enum_col(row, 4)?,
        target_rate: row.get(5)?,
        actual_rate: row.get(6)?,
        efficiency: row.get(7)?,
        downtime_minutes: row.get(8)?,
        shift: enum_col(row, 9)?,
        operator_id: row.get(10)?,
        notes: row.get(11)?,
        recorded_at: ts_col(row, 12)?,
    })
}

fn target_from_row(row: &Row<'_>) -> rusqlite::Result<Target> {
    Ok(Target {
        id: row.get(0)?,
        section_id: row.get(1)?,
        machine_id: row.get(2)?,
        stage: enum_col(row, 3)?,
        shift: enum_col(row, 4)?,
        target_rate: row.get(5)?,
        min_efficiency: row.get(6)?,
        max_downtime_minutes: row.get(7)?,
        active: row.get(8)?,
        effective_from: ts_col(row, 9)?,
        effective_to: opt_ts_col(row, 10)?,
        created_by: row.get(11)?,
        created_at: ts_col(row, 12)?,
        updated_at: ts_col(row, 13)?,
    })
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<Alert> {
    Ok(Alert {
        id: row.get(0)?,
        alert_type: enum_col(row, 1)?,
        severity: enum_col(row, 2)?,
        section_id: row.get(3)?,
        machine_id: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        affected_job_orders: json_col(row, 7)?,
        estimated_delay_hours: row.get(8)?,
        suggested_actions: json_col(row, 9)?,
        status: enum_col(row, 10)?,
        detected_at: ts_col(row, 11)?,
        acknowledged_at: opt_ts_col(row, 12)?,
        acknowledged_by: row.get(13)?,
        resolved_at: opt_ts_col(row, 14)?,
        resolved_by: row.get(15)?,
        resolution_notes: row.get(16)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let target_user: Option<String> = row.get(7)?;
    let target_role: Option<String> = row.get(8)?;
    let target = match (target_user, target_role) {
        (Some(user_id), _) => NotificationTarget::User { user_id },
        (None, Some(role)) => NotificationTarget::Role { role },
        (None, None) => NotificationTarget::Broadcast,
    };
    let action_data: Option<String> = row.get(14)?;
    let action_data: Option<serde_json::Value> = action_data
        .map(|raw| serde_json::from_str(&raw).map_err(|e| conversion_error(14, e.to_string())))
        .transpose()?;

    Ok(Notification {
        id: row.get(0)?,
        title: row.get(1)?,
        message: row.get(2)?,
        notification_type: row.get(3)?,
        priority: enum_col(row, 4)?,
        category: row.get(5)?,
        source: row.get(6)?,
        target,
        read_at: opt_ts_col(row, 9)?,
        dismissed_at: opt_ts_col(row, 10)?,
        archived_at: opt_ts_col(row, 11)?,
        action_required: row.get(12)?,
        action_url: row.get(13)?,
        action_data,
        expires_at: opt_ts_col(row, 15)?,
        created_at: ts_col(row, 16)?,
        metadata: json_col(row, 17)?,
    })
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationTemplate> {
    let priority: Option<String> = row.get(4)?;
    let priority: Option<NotificationPriority> = priority
        .map(|raw| raw.parse().map_err(|e| conversion_error(4, e)))
        .transpose()?;

    Ok(NotificationTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        notification_type: row.get(3)?,
        priority,
        title_template: row.get(5)?,
        message_template: row.get(6)?,
        action_required: row.get(7)?,
        action_url_template: row.get(8)?,
        active: row.get(9)?,
        trigger_event: row.get(10)?,
        conditions: json_col(row, 11)?,
        created_by: row.get(12)?,
        created_at: ts_col(row, 13)?,
        updated_at: ts_col(row, 14)?,
    })
}

// ---- row access shared by several traits ----

fn load_target(conn: &Connection, id: i64) -> Result<Option<Target>> {
    let sql = format!("SELECT {TARGET_COLUMNS} FROM targets WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], target_from_row)
        .optional()?)
}

fn load_alert(conn: &Connection, id: i64) -> Result<Option<Alert>> {
    let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], alert_from_row).optional()?)
}

fn load_notification(conn: &Connection, id: i64) -> Result<Option<Notification>> {
    let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], notification_from_row)
        .optional()?)
}

fn load_template(conn: &Connection, id: i64) -> Result<Option<NotificationTemplate>> {
    let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM notification_templates WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], template_from_row)
        .optional()?)
}

fn write_alert_state(conn: &Connection, alert: &Alert) -> Result<()> {
    conn.execute(
        "UPDATE alerts SET status = ?1, acknowledged_at = ?2, acknowledged_by = ?3,
             resolved_at = ?4, resolved_by = ?5, resolution_notes = ?6
         WHERE id = ?7",
        params![
            alert.status.as_str(),
            opt_ts(alert.acknowledged_at),
            alert.acknowledged_by,
            opt_ts(alert.resolved_at),
            alert.resolved_by,
            alert.resolution_notes,
            alert.id,
        ],
    )?;
    Ok(())
}

fn write_notification_flags(conn: &Connection, n: &Notification) -> Result<()> {
    conn.execute(
        "UPDATE notifications SET read_at = ?1, dismissed_at = ?2, archived_at = ?3 WHERE id = ?4",
        params![
            opt_ts(n.read_at),
            opt_ts(n.dismissed_at),
            opt_ts(n.archived_at),
            n.id
        ],
    )?;
    Ok(())
}

#[async_trait]
impl MetricStore for SqliteStore {
    async fn insert_metric(
        &self,
        request: SubmitMetricRequest,
        recorded_at: DateTime<Utc>,
    ) -> Result<MetricRecord> {
        let mut record = request.into_record(0, recorded_at);
        let conn = self.conn();
        conn.execute(
            "INSERT INTO metrics (section_id, machine_id, job_order_id, stage, target_rate,
                 actual_rate, efficiency, downtime_minutes, shift, operator_id, notes, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.section_id,
                record.machine_id,
                record.job_order_id,
                record.stage.as_str(),
                record.target_rate,
                record.actual_rate,
                record.efficiency,
                record.downtime_minutes,
                record.shift.as_str(),
                record.operator_id,
                record.notes,
                ts(record.recorded_at),
            ],
        )?;
        record.id = conn.last_insert_rowid();
        Ok(record)
    }

    async fn list_metrics(
        &self,
        section_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MetricRecord>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {METRIC_COLUMNS} FROM metrics
             WHERE (?1 IS NULL OR section_id = ?1)
             ORDER BY recorded_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![section_id, limit as i64, offset as i64],
            metric_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[async_trait]
impl TargetStore for SqliteStore {
    async fn insert_target(
        &self,
        request: CreateTargetRequest,
        now: DateTime<Utc>,
    ) -> Result<Target> {
        let mut target = request.into_target(0, now);
        let conn = self.conn();
        conn.execute(
            "INSERT INTO targets (section_id, machine_id, stage, shift, target_rate,
                 min_efficiency, max_downtime_minutes, active, effective_from, effective_to,
                 created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                target.section_id,
                target.machine_id,
                target.stage.as_str(),
                target.shift.as_str(),
                target.target_rate,
                target.min_efficiency,
                target.max_downtime_minutes,
                target.active,
                ts(target.effective_from),
                opt_ts(target.effective_to),
                target.created_by,
                ts(target.created_at),
                ts(target.updated_at),
            ],
        )?;
        target.id = conn.last_insert_rowid();
        Ok(target)
    }

    async fn update_target(
        &self,
        id: i64,
        update: &UpdateTargetRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<Target>> {
        let conn = self.conn();
        let Some(mut target) = load_target(&conn, id)? else {
            return Ok(None);
        };
        target.apply_update(update, now);
        conn.execute(
            "UPDATE targets SET target_rate = ?1, min_efficiency = ?2, max_downtime_minutes = ?3,
                 active = ?4, effective_to = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                target.target_rate,
                target.min_efficiency,
                target.max_downtime_minutes,
                target.active,
                opt_ts(target.effective_to),
                ts(target.updated_at),
                id,
            ],
        )?;
        Ok(Some(target))
    }

    async fn get_target(&self, id: i64) -> Result<Option<Target>> {
        load_target(&self.conn(), id)
    }

    async fn list_targets(&self, section_id: Option<&str>) -> Result<Vec<Target>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE (?1 IS NULL OR section_id = ?1) ORDER BY id"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![section_id], target_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn targets_for(
        &self,
        section_id: &str,
        stage: ProductionStage,
        shift: Shift,
    ) -> Result<Vec<Target>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {TARGET_COLUMNS} FROM targets
             WHERE section_id = ?1 AND stage = ?2 AND shift = ?3 ORDER BY id"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![section_id, stage.as_str(), shift.as_str()],
            target_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[async_trait]
impl AlertStore for SqliteStore {
    async fn insert_alert(&self, draft: AlertDraft, detected_at: DateTime<Utc>) -> Result<Alert> {
        let mut alert = Alert::from_draft(0, draft, detected_at);
        let affected = serde_json::to_string(&alert.affected_job_orders)?;
        let actions = serde_json::to_string(&alert.suggested_actions)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO alerts (alert_type, severity, section_id, machine_id, title, description,
                 affected_job_orders, estimated_delay_hours, suggested_actions, status, detected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                alert.alert_type.as_str(),
                alert.severity.as_str(),
                alert.section_id,
                alert.machine_id,
                alert.title,
                alert.description,
                affected,
                alert.estimated_delay_hours,
                actions,
                alert.status.as_str(),
                ts(alert.detected_at),
            ],
        )?;
        alert.id = conn.last_insert_rowid();
        Ok(alert)
    }

    async fn get_alert(&self, id: i64) -> Result<Option<Alert>> {
        load_alert(&self.conn(), id)
    }

    async fn list_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts
             WHERE (?1 IS NULL OR section_id = ?1) AND (?2 = 0 OR status = 'active')
             ORDER BY detected_at DESC, id DESC"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![query.section_id, query.active_only],
            alert_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn acknowledge_alert(
        &self,
        id: i64,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let conn = self.conn();
        let Some(mut alert) = load_alert(&conn, id)? else {
            return Ok(None);
        };
        if alert.acknowledge(user_id, at) {
            write_alert_state(&conn, &alert)?;
        }
        Ok(Some(alert))
    }

    async fn resolve_alert(
        &self,
        id: i64,
        user_id: &str,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let conn = self.conn();
        let Some(mut alert) = load_alert(&conn, id)? else {
            return Ok(None);
        };
        alert.resolve(user_id, notes, at);
        write_alert_state(&conn, &alert)?;
        Ok(Some(alert))
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        let mut n = notification;
        let action_data = n
            .action_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let metadata = serde_json::to_string(&n.metadata)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO notifications (title, message, type, priority, category, source,
                 target_user, target_role, read_at, dismissed_at, archived_at, action_required,
                 action_url, action_data, expires_at, created_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                n.title,
                n.message,
                n.notification_type,
                n.priority.as_str(),
                n.category,
                n.source,
                n.target.user_id(),
                n.target.role(),
                opt_ts(n.read_at),
                opt_ts(n.dismissed_at),
                opt_ts(n.archived_at),
                n.action_required,
                n.action_url,
                action_data,
                opt_ts(n.expires_at),
                ts(n.created_at),
                metadata,
            ],
        )?;
        n.id = conn.last_insert_rowid();
        Ok(n)
    }

    async fn get_notification(&self, id: i64) -> Result<Option<Notification>> {
        load_notification(&self.conn(), id)
    }

    async fn notifications_for(
        &self,
        user_id: &str,
        role: Option<&str>,
    ) -> Result<Vec<Notification>> {
        let conn = self.conn();
        // Keep in step with `NotificationTarget::addresses`.
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE target_user = ?1
                OR (target_user IS NULL AND (target_role IS NULL OR target_role = ?2))
             ORDER BY id"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![user_id, role], notification_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn flag_notifications(
        &self,
        ids: &[i64],
        flag: NotificationFlag,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let mut flagged = 0;
        for &id in ids {
            if let Some(mut n) = load_notification(&tx, id)? {
                flag.apply(&mut n, at);
                write_notification_flags(&tx, &n)?;
                flagged += 1;
            }
        }
        tx.commit()?;
        Ok(flagged)
    }

    async fn archived_notifications(&self) -> Result<Vec<Notification>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE archived_at IS NOT NULL ORDER BY id"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([], notification_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn delete_notifications(&self, ids: &[i64]) -> Result<u64> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM notifications WHERE id = ?1")?;
            for &id in ids {
                deleted += stmt.execute(params![id])? as u64;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }
}

#[async_trait]
impl TemplateStore for SqliteStore {
    async fn insert_template(
        &self,
        request: CreateTemplateRequest,
        now: DateTime<Utc>,
    ) -> Result<NotificationTemplate> {
        let mut template = request.into_template(0, now);
        let conditions = serde_json::to_string(&template.conditions)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO notification_templates (name, category, type, priority, title_template,
                 message_template, action_required, action_url_template, active, trigger_event,
                 conditions, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                template.name,
                template.category,
                template.notification_type,
                template.priority.map(|p| p.as_str()),
                template.title_template,
                template.message_template,
                template.action_required,
                template.action_url_template,
                template.active,
                template.trigger_event,
                conditions,
                template.created_by,
                ts(template.created_at),
                ts(template.updated_at),
            ],
        )?;
        template.id = conn.last_insert_rowid();
        Ok(template)
    }

    async fn update_template(
        &self,
        id: i64,
        update: &UpdateTemplateRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<NotificationTemplate>> {
        let conn = self.conn();
        let Some(mut template) = load_template(&conn, id)? else {
            return Ok(None);
        };
        template.apply_update(update, now);
        let conditions = serde_json::to_string(&template.conditions)?;
        conn.execute(
            "UPDATE notification_templates SET name = ?1, category = ?2, type = ?3, priority = ?4,
                 title_template = ?5, message_template = ?6, action_required = ?7,
                 action_url_template = ?8, active = ?9, trigger_event = ?10, conditions = ?11,
                 updated_at = ?12
             WHERE id = ?13",
            params![
                template.name,
                template.category,
                template.notification_type,
                template.priority.map(|p| p.as_str()),
                template.title_template,
                template.message_template,
                template.action_required,
                template.action_url_template,
                template.active,
                template.trigger_event,
                conditions,
                ts(template.updated_at),
                id,
            ],
        )?;
        Ok(Some(template))
    }

    async fn delete_template(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM notification_templates WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    async fn get_template(&self, id: i64) -> Result<Option<NotificationTemplate>> {
        load_template(&self.conn(), id)
    }

    async fn list_templates(&self, category: Option<&str>) -> Result<Vec<NotificationTemplate>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM notification_templates
             WHERE (?1 IS NULL OR category = ?1) ORDER BY id"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![category], template_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn templates_for_event(&self, event: &str) -> Result<Vec<NotificationTemplate>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM notification_templates
             WHERE trigger_event = ?1 AND active = 1 ORDER BY id"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![event], template_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
