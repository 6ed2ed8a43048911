use std::collections::HashMap;
use std::error::Error as StdError;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result, Row};
use serde::Serialize;

use crate::domain::dependency::DependencyKind;
use crate::domain::issue_type::IssueType;
use crate::domain::review::ReviewStatus;
use crate::domain::status::ItemStatus;
use crate::events::{now_utc_rfc3339, AuditEvent, AuditEventKind, SortOrder};

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "work_item_schema_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'open',
    priority INTEGER NOT NULL DEFAULT 2 CHECK (priority BETWEEN 0 AND 4),
    issue_type TEXT NOT NULL DEFAULT 'task',
    assignee TEXT,
    review_status TEXT NOT NULL DEFAULT 'unreviewed',
    reviewed_by TEXT,
    reviewed_at TEXT,
    close_reason TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    closed_at TEXT
);

CREATE TABLE IF NOT EXISTS item_labels (
    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    PRIMARY KEY (item_id, label)
);

CREATE TABLE IF NOT EXISTS dependencies (
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (from_id, to_id, kind)
);

CREATE TABLE IF NOT EXISTS dirty_items (
    item_id TEXT PRIMARY KEY,
    marked_at TEXT NOT NULL,
    generation INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    comment TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
CREATE INDEX IF NOT EXISTS idx_items_review_status ON items(review_status);
CREATE INDEX IF NOT EXISTS idx_dependencies_to_kind ON dependencies(to_id, kind);
CREATE INDEX IF NOT EXISTS idx_events_item ON events(item_id, created_at);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at);
"#,
    },
    Migration {
        version: 2,
        name: "review_tracking_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    review_type TEXT NOT NULL DEFAULT 'plan',
    outcome TEXT NOT NULL CHECK (outcome IN ('approved', 'needs_revision', 'deferred')),
    reviewer TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS review_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    root_item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    reviewer TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    summary TEXT NOT NULL DEFAULT '',
    items_reviewed INTEGER NOT NULL DEFAULT 0,
    items_approved INTEGER NOT NULL DEFAULT 0,
    items_needs_revision INTEGER NOT NULL DEFAULT 0,
    items_deferred INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_reviews_item ON reviews(item_id);
CREATE INDEX IF NOT EXISTS idx_reviews_reviewer ON reviews(reviewer);
CREATE INDEX IF NOT EXISTS idx_reviews_created ON reviews(created_at);
CREATE INDEX IF NOT EXISTS idx_review_sessions_root ON review_sessions(root_item_id);
CREATE INDEX IF NOT EXISTS idx_review_sessions_reviewer ON review_sessions(reviewer);
"#,
    },
];

pub fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, now_utc_rfc3339()],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRecord {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: ItemStatus,
    pub priority: i64,
    pub issue_type: IssueType,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub review_status: ReviewStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub close_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub closed_at: Option<String>,
}

const ITEM_COLUMNS: &str = r#"
id, title, description, status, priority, issue_type, assignee,
review_status, reviewed_by, reviewed_at, close_reason,
created_at, updated_at, closed_at
"#;

fn item_from_row(row: &Row<'_>) -> Result<ItemRecord> {
    Ok(ItemRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_column(row, 3)?,
        priority: row.get(4)?,
        issue_type: parse_column(row, 5)?,
        assignee: row.get(6)?,
        labels: Vec::new(),
        review_status: parse_column(row, 7)?,
        reviewed_by: row.get(8)?,
        reviewed_at: row.get(9)?,
        close_reason: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        closed_at: row.get(13)?,
    })
}

/// Inserts or fully replaces the stored state of one item, labels included.
pub fn upsert_item(conn: &Connection, item: &ItemRecord) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO items (
    id, title, description, status, priority, issue_type, assignee,
    review_status, reviewed_by, reviewed_at, close_reason,
    created_at, updated_at, closed_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
ON CONFLICT(id) DO UPDATE SET
    title = excluded.title,
    description = excluded.description,
    status = excluded.status,
    priority = excluded.priority,
    issue_type = excluded.issue_type,
    assignee = excluded.assignee,
    review_status = excluded.review_status,
    reviewed_by = excluded.reviewed_by,
    reviewed_at = excluded.reviewed_at,
    close_reason = excluded.close_reason,
    created_at = excluded.created_at,
    updated_at = excluded.updated_at,
    closed_at = excluded.closed_at
"#,
        params![
            item.id,
            item.title,
            item.description,
            item.status.as_str(),
            item.priority,
            item.issue_type.as_str(),
            item.assignee,
            item.review_status.as_str(),
            item.reviewed_by,
            item.reviewed_at,
            item.close_reason,
            item.created_at,
            item.updated_at,
            item.closed_at
        ],
    )?;
    set_labels(conn, &item.id, &item.labels)
}

pub fn get_item(conn: &Connection, id: &str) -> Result<Option<ItemRecord>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
    let item = conn
        .query_row(&sql, params![id], item_from_row)
        .optional()?;
    match item {
        Some(mut item) => {
            item.labels = get_labels(conn, id)?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

pub fn item_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub fn list_items(conn: &Connection) -> Result<Vec<ItemRecord>> {
    let mut labels = all_labels(conn)?;
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut item = item_from_row(row)?;
        item.labels = labels.remove(&item.id).unwrap_or_default();
        result.push(item);
    }
    Ok(result)
}

pub fn get_labels(conn: &Connection, item_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT label FROM item_labels WHERE item_id = ?1 ORDER BY label ASC")?;
    let labels = stmt
        .query_map(params![item_id], |row| row.get(0))?
        .collect::<Result<Vec<String>>>()?;
    Ok(labels)
}

fn all_labels(conn: &Connection) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare("SELECT item_id, label FROM item_labels ORDER BY item_id, label")?;
    let mut rows = stmt.query([])?;
    let mut result: HashMap<String, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let item_id: String = row.get(0)?;
        result.entry(item_id).or_default().push(row.get(1)?);
    }
    Ok(result)
}

pub fn set_labels(conn: &Connection, item_id: &str, labels: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM item_labels WHERE item_id = ?1",
        params![item_id],
    )?;
    for label in labels {
        conn.execute(
            "INSERT OR IGNORE INTO item_labels (item_id, label) VALUES (?1, ?2)",
            params![item_id, label],
        )?;
    }
    Ok(())
}

/// `from -[kind]-> to`. For `blocks`, `to` cannot be ready while `from` is
/// open. The edge belongs to `to` in the shared log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyRecord {
    pub from: String,
    pub to: String,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Incoming,
    Outgoing,
    Both,
}

fn dependency_from_row(row: &Row<'_>) -> Result<DependencyRecord> {
    Ok(DependencyRecord {
        from: row.get(0)?,
        to: row.get(1)?,
        kind: parse_column(row, 2)?,
    })
}

/// Returns false when the identical edge already exists.
pub fn insert_dependency(
    conn: &Connection,
    edge: &DependencyRecord,
    created_at: &str,
) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO dependencies (from_id, to_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![edge.from, edge.to, edge.kind.as_str(), created_at],
    )?;
    Ok(changed > 0)
}

pub fn delete_dependency(conn: &Connection, edge: &DependencyRecord) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM dependencies WHERE from_id = ?1 AND to_id = ?2 AND kind = ?3",
        params![edge.from, edge.to, edge.kind.as_str()],
    )?;
    Ok(changed > 0)
}

pub fn list_dependencies(
    conn: &Connection,
    item_id: &str,
    direction: EdgeDirection,
) -> Result<Vec<DependencyRecord>> {
    let sql = match direction {
        EdgeDirection::Incoming => {
            "SELECT from_id, to_id, kind FROM dependencies WHERE to_id = ?1 ORDER BY from_id, to_id, kind"
        }
        EdgeDirection::Outgoing => {
            "SELECT from_id, to_id, kind FROM dependencies WHERE from_id = ?1 ORDER BY from_id, to_id, kind"
        }
        EdgeDirection::Both => {
            "SELECT from_id, to_id, kind FROM dependencies WHERE from_id = ?1 OR to_id = ?1 ORDER BY from_id, to_id, kind"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let edges = stmt
        .query_map(params![item_id], dependency_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(edges)
}

pub fn list_all_dependencies(conn: &Connection) -> Result<Vec<DependencyRecord>> {
    let mut stmt =
        conn.prepare("SELECT from_id, to_id, kind FROM dependencies ORDER BY to_id, from_id, kind")?;
    let edges = stmt
        .query_map([], dependency_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(edges)
}

/// Replaces every edge owned by `item_id` (edges pointing at it).
pub fn replace_dependencies(
    conn: &Connection,
    item_id: &str,
    edges: &[DependencyRecord],
    created_at: &str,
) -> Result<()> {
    conn.execute(
        "DELETE FROM dependencies WHERE to_id = ?1",
        params![item_id],
    )?;
    for edge in edges {
        insert_dependency(conn, edge, created_at)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyMarker {
    pub item_id: String,
    pub marked_at: String,
    pub generation: i64,
}

/// Upsert: re-marking refreshes the timestamp and bumps the generation.
pub fn mark_dirty(conn: &Connection, item_id: &str, marked_at: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO dirty_items (item_id, marked_at, generation)
VALUES (?1, ?2, 1)
ON CONFLICT(item_id) DO UPDATE SET
    marked_at = excluded.marked_at,
    generation = dirty_items.generation + 1
"#,
        params![item_id, marked_at],
    )?;
    Ok(())
}

pub fn list_dirty(conn: &Connection) -> Result<Vec<DirtyMarker>> {
    let mut stmt = conn.prepare(
        "SELECT item_id, marked_at, generation FROM dirty_items ORDER BY marked_at ASC, item_id ASC",
    )?;
    let markers = stmt
        .query_map([], |row| {
            Ok(DirtyMarker {
                item_id: row.get(0)?,
                marked_at: row.get(1)?,
                generation: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(markers)
}

pub fn get_dirty(conn: &Connection, item_id: &str) -> Result<Option<DirtyMarker>> {
    conn.query_row(
        "SELECT item_id, marked_at, generation FROM dirty_items WHERE item_id = ?1",
        params![item_id],
        |row| {
            Ok(DirtyMarker {
                item_id: row.get(0)?,
                marked_at: row.get(1)?,
                generation: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Clears a marker only if nobody re-marked the item since it was read.
pub fn clear_dirty(conn: &Connection, marker: &DirtyMarker) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM dirty_items WHERE item_id = ?1 AND generation = ?2",
        params![marker.item_id, marker.generation],
    )?;
    Ok(changed > 0)
}

pub fn insert_event(
    conn: &Connection,
    item_id: &str,
    kind: AuditEventKind,
    actor: &str,
    comment: Option<&str>,
    created_at: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (item_id, event_type, actor, comment, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![item_id, kind.as_str(), actor, comment, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

fn event_from_row(row: &Row<'_>) -> Result<AuditEvent> {
    Ok(AuditEvent {
        id: row.get(0)?,
        item_id: row.get(1)?,
        event_type: parse_column(row, 2)?,
        actor: row.get(3)?,
        comment: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn list_events(conn: &Connection, item_id: &str, order: SortOrder) -> Result<Vec<AuditEvent>> {
    let sql = format!(
        "SELECT id, item_id, event_type, actor, comment, created_at FROM events \
         WHERE item_id = ?1 ORDER BY created_at {dir}, id {dir}",
        dir = order.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let events = stmt
        .query_map(params![item_id], event_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(events)
}

/// Events with `since <= created_at < until`, oldest first.
pub fn list_events_between(conn: &Connection, since: &str, until: &str) -> Result<Vec<AuditEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, item_id, event_type, actor, comment, created_at FROM events \
         WHERE created_at >= ?1 AND created_at < ?2 ORDER BY created_at ASC, id ASC",
    )?;
    let events = stmt
        .query_map(params![since, until], event_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(events)
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO meta (key, value)
VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests;
