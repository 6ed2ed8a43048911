use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

use crate::db::{self, parse_column, EdgeDirection};
use crate::domain::dependency::DependencyKind;
use crate::domain::review::{ReviewOutcome, ReviewType};

/// Immutable record of one review pass. Local only.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReviewRecord {
    pub id: i64,
    pub item_id: String,
    pub review_type: ReviewType,
    pub outcome: ReviewOutcome,
    pub reviewer: String,
    pub notes: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub item_id: String,
    pub review_type: ReviewType,
    pub outcome: ReviewOutcome,
    pub reviewer: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReviewSession {
    pub id: i64,
    pub root_item_id: String,
    pub reviewer: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub summary: String,
    pub items_reviewed: i64,
    pub items_approved: i64,
    pub items_needs_revision: i64,
    pub items_deferred: i64,
}

impl ReviewSession {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

const REVIEW_COLUMNS: &str = "id, item_id, review_type, outcome, reviewer, notes, created_at";
const SESSION_COLUMNS: &str = r#"
id, root_item_id, reviewer, started_at, completed_at, summary,
items_reviewed, items_approved, items_needs_revision, items_deferred
"#;

fn review_from_row(row: &Row<'_>) -> Result<ReviewRecord> {
    Ok(ReviewRecord {
        id: row.get(0)?,
        item_id: row.get(1)?,
        review_type: parse_column(row, 2)?,
        outcome: parse_column(row, 3)?,
        reviewer: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn session_from_row(row: &Row<'_>) -> Result<ReviewSession> {
    Ok(ReviewSession {
        id: row.get(0)?,
        root_item_id: row.get(1)?,
        reviewer: row.get(2)?,
        started_at: row.get(3)?,
        completed_at: row.get(4)?,
        summary: row.get(5)?,
        items_reviewed: row.get(6)?,
        items_approved: row.get(7)?,
        items_needs_revision: row.get(8)?,
        items_deferred: row.get(9)?,
    })
}

pub fn insert_review(
    conn: &Connection,
    review: &NewReview,
    created_at: &str,
) -> Result<ReviewRecord> {
    conn.execute(
        r#"
INSERT INTO reviews (item_id, review_type, outcome, reviewer, notes, created_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#,
        params![
            review.item_id,
            review.review_type.as_str(),
            review.outcome.as_str(),
            review.reviewer,
            review.notes,
            created_at
        ],
    )?;
    Ok(ReviewRecord {
        id: conn.last_insert_rowid(),
        item_id: review.item_id.clone(),
        review_type: review.review_type,
        outcome: review.outcome,
        reviewer: review.reviewer.clone(),
        notes: review.notes.clone(),
        created_at: created_at.to_string(),
    })
}

/// Reviews of one item, oldest first.
pub fn list_reviews(conn: &Connection, item_id: &str) -> Result<Vec<ReviewRecord>> {
    let sql = format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE item_id = ?1 ORDER BY created_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let reviews = stmt
        .query_map(params![item_id], review_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(reviews)
}

/// Most recent reviews first, optionally restricted to one reviewer.
pub fn review_history(
    conn: &Connection,
    reviewer: Option<&str>,
    limit: usize,
) -> Result<Vec<ReviewRecord>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let sql = format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE (?1 IS NULL OR reviewer = ?1) \
         ORDER BY created_at DESC, id DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let reviews = stmt
        .query_map(params![reviewer, limit], review_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(reviews)
}

pub fn insert_session(
    conn: &Connection,
    root_item_id: &str,
    reviewer: &str,
    started_at: &str,
) -> Result<ReviewSession> {
    conn.execute(
        "INSERT INTO review_sessions (root_item_id, reviewer, started_at) VALUES (?1, ?2, ?3)",
        params![root_item_id, reviewer, started_at],
    )?;
    Ok(ReviewSession {
        id: conn.last_insert_rowid(),
        root_item_id: root_item_id.to_string(),
        reviewer: reviewer.to_string(),
        started_at: started_at.to_string(),
        completed_at: None,
        summary: String::new(),
        items_reviewed: 0,
        items_approved: 0,
        items_needs_revision: 0,
        items_deferred: 0,
    })
}

/// Returns false when no session has this id.
pub fn update_session(conn: &Connection, session: &ReviewSession) -> Result<bool> {
    let changed = conn.execute(
        r#"
UPDATE review_sessions SET
    completed_at = ?2,
    summary = ?3,
    items_reviewed = ?4,
    items_approved = ?5,
    items_needs_revision = ?6,
    items_deferred = ?7
WHERE id = ?1
"#,
        params![
            session.id,
            session.completed_at,
            session.summary,
            session.items_reviewed,
            session.items_approved,
            session.items_needs_revision,
            session.items_deferred
        ],
    )?;
    Ok(changed > 0)
}

pub fn get_session(conn: &Connection, id: i64) -> Result<Option<ReviewSession>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM review_sessions WHERE id = ?1");
    conn.query_row(&sql, params![id], session_from_row).optional()
}

pub fn sessions_by_reviewer(
    conn: &Connection,
    reviewer: &str,
    limit: usize,
) -> Result<Vec<ReviewSession>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM review_sessions WHERE reviewer = ?1 \
         ORDER BY started_at DESC, id DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
        .query_map(params![reviewer, limit], session_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(sessions)
}

/// The root plus every descendant reachable through `parent-child` edges
/// (`from` is the parent).
pub fn session_scope(conn: &Connection, root_item_id: &str) -> Result<BTreeSet<String>> {
    let mut scope = BTreeSet::from([root_item_id.to_string()]);
    let mut queue = VecDeque::from([root_item_id.to_string()]);
    while let Some(parent) = queue.pop_front() {
        for edge in db::list_dependencies(conn, &parent, EdgeDirection::Outgoing)? {
            if edge.kind == DependencyKind::ParentChild && scope.insert(edge.to.clone()) {
                queue.push_back(edge.to);
            }
        }
    }
    Ok(scope)
}

/// Tallies the reviewer's reviews created since `since` on the scoped
/// items. Each item counts once, by its most recent outcome.
pub fn tally_session(
    conn: &Connection,
    reviewer: &str,
    since: &str,
    scope: &BTreeSet<String>,
) -> Result<SessionCounts> {
    let sql = format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE reviewer = ?1 AND created_at >= ?2 \
         ORDER BY created_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut latest: BTreeMap<String, ReviewOutcome> = BTreeMap::new();
    for review in stmt.query_map(params![reviewer, since], review_from_row)? {
        let review = review?;
        if scope.contains(&review.item_id) {
            latest.insert(review.item_id, review.outcome);
        }
    }

    let mut counts = SessionCounts::default();
    for outcome in latest.values() {
        counts.reviewed += 1;
        match outcome {
            ReviewOutcome::Approved => counts.approved += 1,
            ReviewOutcome::NeedsRevision => counts.needs_revision += 1,
            ReviewOutcome::Deferred => counts.deferred += 1,
        }
    }
    Ok(counts)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounts {
    pub reviewed: i64,
    pub approved: i64,
    pub needs_revision: i64,
    pub deferred: i64,
}

impl SessionCounts {
    pub fn apply_to(self, session: &mut ReviewSession) {
        session.items_reviewed = self.reviewed;
        session.items_approved = self.approved;
        session.items_needs_revision = self.needs_revision;
        session.items_deferred = self.deferred;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        get_session, insert_review, insert_session, list_reviews, review_history,
        session_scope, sessions_by_reviewer, tally_session, update_session, NewReview,
    };
    use crate::db::{self, DependencyRecord};
    use crate::domain::dependency::DependencyKind;
    use crate::domain::review::{ReviewOutcome, ReviewType};
    use rusqlite::Connection;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn unique_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("braid-reviews-{}.sqlite", Uuid::now_v7()))
    }

    fn seed_items(conn: &Connection, ids: &[&str]) {
        for id in ids {
            conn.execute(
                "INSERT INTO items (id, title, created_at, updated_at) VALUES (?1, 'x', ?2, ?2)",
                rusqlite::params![id, "2026-02-22T10:00:00.000000Z"],
            )
            .expect("seed item should insert");
        }
    }

    fn review(item_id: &str, reviewer: &str, outcome: ReviewOutcome) -> NewReview {
        NewReview {
            item_id: item_id.to_string(),
            review_type: ReviewType::Plan,
            outcome,
            reviewer: reviewer.to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn item_reviews_are_chronological_and_history_is_newest_first() {
        let path = unique_db_path();
        let conn = db::open_connection(&path).expect("db should open");
        seed_items(&conn, &["bd-1", "bd-2"]);

        insert_review(&conn, &review("bd-1", "alice", ReviewOutcome::Approved), "2026-02-22T10:00:00.000000Z")
            .expect("first review");
        insert_review(&conn, &review("bd-1", "bob", ReviewOutcome::NeedsRevision), "2026-02-22T11:00:00.000000Z")
            .expect("second review");
        insert_review(&conn, &review("bd-2", "alice", ReviewOutcome::Deferred), "2026-02-22T12:00:00.000000Z")
            .expect("third review");

        let for_item = list_reviews(&conn, "bd-1").expect("list should succeed");
        assert_eq!(for_item.len(), 2);
        assert_eq!(for_item[0].outcome, ReviewOutcome::Approved);

        let history = review_history(&conn, Some("alice"), 10).expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].item_id, "bd-2");
        assert_eq!(review_history(&conn, None, 1).expect("history").len(), 1);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn sessions_round_trip_and_tally_descendants() {
        let path = unique_db_path();
        let conn = db::open_connection(&path).expect("db should open");
        seed_items(&conn, &["epic", "child", "grandchild", "outside"]);
        for (from, to) in [("epic", "child"), ("child", "grandchild")] {
            db::insert_dependency(
                &conn,
                &DependencyRecord {
                    from: from.to_string(),
                    to: to.to_string(),
                    kind: DependencyKind::ParentChild,
                },
                "2026-02-22T10:00:00.000000Z",
            )
            .expect("edge should insert");
        }

        let mut session = insert_session(&conn, "epic", "alice", "2026-02-22T10:00:00.000000Z")
            .expect("session should insert");
        insert_review(&conn, &review("child", "alice", ReviewOutcome::NeedsRevision), "2026-02-22T10:30:00.000000Z")
            .expect("review");
        insert_review(&conn, &review("child", "alice", ReviewOutcome::Approved), "2026-02-22T10:40:00.000000Z")
            .expect("review");
        insert_review(&conn, &review("grandchild", "alice", ReviewOutcome::Deferred), "2026-02-22T10:50:00.000000Z")
            .expect("review");
        insert_review(&conn, &review("outside", "alice", ReviewOutcome::Approved), "2026-02-22T10:50:00.000000Z")
            .expect("review");
        insert_review(&conn, &review("epic", "bob", ReviewOutcome::Approved), "2026-02-22T10:50:00.000000Z")
            .expect("review");

        let scope = session_scope(&conn, "epic").expect("scope");
        assert_eq!(scope.len(), 3);
        let counts = tally_session(&conn, "alice", &session.started_at, &scope).expect("tally");
        assert_eq!(counts.reviewed, 2);
        assert_eq!(counts.approved, 1);
        assert_eq!(counts.deferred, 1);
        assert_eq!(counts.needs_revision, 0);

        counts.apply_to(&mut session);
        session.completed_at = Some("2026-02-22T11:00:00.000000Z".to_string());
        session.summary = "looks good".to_string();
        assert!(update_session(&conn, &session).expect("update"));
        assert_eq!(get_session(&conn, session.id).expect("get"), Some(session.clone()));
        assert_eq!(sessions_by_reviewer(&conn, "alice", 5).expect("list"), vec![session]);
        assert!(get_session(&conn, 999).expect("get").is_none());

        let _ = std::fs::remove_file(path);
    }
}
