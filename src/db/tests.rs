use super::{
    clear_dirty, get_dirty, get_item, get_meta, insert_dependency, list_all_dependencies,
    list_dependencies, list_dirty, list_events, list_events_between, list_items, mark_dirty,
    open_connection, replace_dependencies, set_meta, upsert_item, DependencyRecord,
    EdgeDirection, ItemRecord, CURRENT_SCHEMA_VERSION,
};
use crate::domain::dependency::DependencyKind;
use crate::domain::issue_type::IssueType;
use crate::domain::review::ReviewStatus;
use crate::domain::status::ItemStatus;
use crate::events::{AuditEventKind, SortOrder};
use rusqlite::params;
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn unique_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("braid-db-{}.sqlite", Uuid::now_v7()))
}

fn cleanup_db_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let candidate = format!("{}{suffix}", path.display());
        let _ = std::fs::remove_file(candidate);
    }
}

fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table_name],
            |row| row.get(0),
        )
        .expect("table existence query should be readable");
    exists == 1
}

fn sample_item(id: &str, updated_at: &str) -> ItemRecord {
    ItemRecord {
        id: id.to_string(),
        title: format!("Item {id}"),
        description: None,
        status: ItemStatus::Open,
        priority: 2,
        issue_type: IssueType::Task,
        assignee: None,
        labels: vec!["backend".to_string()],
        review_status: ReviewStatus::Unreviewed,
        reviewed_by: None,
        reviewed_at: None,
        close_reason: None,
        created_at: "2026-02-22T10:00:00.000000Z".to_string(),
        updated_at: updated_at.to_string(),
        closed_at: None,
    }
}

#[test]
fn configures_connection_pragmas() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("foreign_keys pragma should be readable");
    assert_eq!(foreign_keys, 1);

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn migrations_create_tables_and_are_idempotent() {
    let path = unique_db_path();
    {
        let conn = open_connection(&path).expect("connection should open");
        for table in [
            "schema_migrations",
            "meta",
            "items",
            "item_labels",
            "dependencies",
            "dirty_items",
            "events",
            "reviews",
            "review_sessions",
        ] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    let conn = open_connection(&path).expect("reopen should succeed");
    let applied: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
        .expect("migration count should be readable");
    assert_eq!(applied, CURRENT_SCHEMA_VERSION);
    assert_eq!(
        get_meta(&conn, "schema_version").expect("meta should read"),
        Some(CURRENT_SCHEMA_VERSION.to_string())
    );

    cleanup_db_files(&path);
}

#[test]
fn upsert_replaces_fields_and_labels() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let mut item = sample_item("bd-1", "2026-02-22T10:00:00.000000Z");
    upsert_item(&conn, &item).expect("insert should succeed");

    item.title = "Renamed".to_string();
    item.status = ItemStatus::InProgress;
    item.labels = vec!["api".to_string(), "urgent".to_string()];
    upsert_item(&conn, &item).expect("replace should succeed");

    let stored = get_item(&conn, "bd-1")
        .expect("lookup should succeed")
        .expect("item should exist");
    assert_eq!(stored, item);
    assert_eq!(list_items(&conn).expect("list should succeed").len(), 1);
    assert!(get_item(&conn, "bd-404").expect("lookup should succeed").is_none());

    cleanup_db_files(&path);
}

#[test]
fn rejects_out_of_range_priority() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let mut item = sample_item("bd-1", "2026-02-22T10:00:00.000000Z");
    item.priority = 9;
    assert!(upsert_item(&conn, &item).is_err());

    cleanup_db_files(&path);
}

#[test]
fn duplicate_edges_are_ignored_and_listing_respects_direction() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    let stamp = "2026-02-22T10:00:00.000000Z";

    let blocks = DependencyRecord {
        from: "bd-2".to_string(),
        to: "bd-1".to_string(),
        kind: DependencyKind::Blocks,
    };
    let related = DependencyRecord {
        kind: DependencyKind::Related,
        ..blocks.clone()
    };
    assert!(insert_dependency(&conn, &blocks, stamp).expect("insert should succeed"));
    assert!(!insert_dependency(&conn, &blocks, stamp).expect("duplicate should be ignored"));
    assert!(insert_dependency(&conn, &related, stamp).expect("second kind should coexist"));

    let incoming =
        list_dependencies(&conn, "bd-1", EdgeDirection::Incoming).expect("list should succeed");
    assert_eq!(incoming.len(), 2);
    let outgoing =
        list_dependencies(&conn, "bd-1", EdgeDirection::Outgoing).expect("list should succeed");
    assert!(outgoing.is_empty());

    replace_dependencies(&conn, "bd-1", &[related.clone()], stamp)
        .expect("replace should succeed");
    assert_eq!(
        list_all_dependencies(&conn).expect("list should succeed"),
        vec![related]
    );

    cleanup_db_files(&path);
}

#[test]
fn dirty_markers_upsert_and_clear_only_matching_generation() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    mark_dirty(&conn, "bd-1", "2026-02-22T10:00:00.000000Z").expect("mark should succeed");
    let first = get_dirty(&conn, "bd-1")
        .expect("lookup should succeed")
        .expect("marker should exist");
    assert_eq!(first.generation, 1);

    mark_dirty(&conn, "bd-1", "2026-02-22T10:00:01.000000Z").expect("re-mark should succeed");
    let markers = list_dirty(&conn).expect("list should succeed");
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].generation, 2);
    assert_eq!(markers[0].marked_at, "2026-02-22T10:00:01.000000Z");

    assert!(!clear_dirty(&conn, &first).expect("stale clear should run"));
    assert!(clear_dirty(&conn, &markers[0]).expect("current clear should run"));
    assert!(list_dirty(&conn).expect("list should succeed").is_empty());

    cleanup_db_files(&path);
}

#[test]
fn events_support_order_and_time_window_queries() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    for (kind, at) in [
        (AuditEventKind::Created, "2026-02-22T10:00:00.000000Z"),
        (AuditEventKind::Updated, "2026-02-22T11:00:00.000000Z"),
        (AuditEventKind::Closed, "2026-02-22T12:00:00.000000Z"),
    ] {
        super::insert_event(&conn, "bd-1", kind, "alice", None, at).expect("insert should work");
    }

    let newest_first =
        list_events(&conn, "bd-1", SortOrder::Descending).expect("list should succeed");
    assert_eq!(newest_first[0].event_type, AuditEventKind::Closed);

    let window = list_events_between(
        &conn,
        "2026-02-22T10:30:00.000000Z",
        "2026-02-22T12:00:00.000000Z",
    )
    .expect("window should succeed");
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].event_type, AuditEventKind::Updated);

    cleanup_db_files(&path);
}

#[test]
fn meta_values_overwrite() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    set_meta(&conn, "log_content_hash", "abc").expect("set should succeed");
    set_meta(&conn, "log_content_hash", "def").expect("overwrite should succeed");
    assert_eq!(
        get_meta(&conn, "log_content_hash").expect("get should succeed"),
        Some("def".to_string())
    );

    cleanup_db_files(&path);
}
