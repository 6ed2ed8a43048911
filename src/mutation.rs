use std::collections::BTreeSet;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db;
use crate::events::{now_utc_rfc3339, AuditEventKind, PendingEvent};

/// Side effects collected while a mutation runs. They are written by the
/// same transaction as the field changes, after the closure returns.
#[derive(Debug)]
pub struct MutationContext {
    actor: String,
    now: String,
    events: Vec<PendingEvent>,
    dirty_ids: BTreeSet<String>,
}

impl MutationContext {
    fn new(actor: &str) -> Self {
        Self {
            actor: actor.to_string(),
            now: now_utc_rfc3339(),
            events: Vec::new(),
            dirty_ids: BTreeSet::new(),
        }
    }

    /// Single timestamp shared by every row the mutation touches.
    pub fn now(&self) -> &str {
        &self.now
    }

    /// Records one audit event and marks the item dirty.
    pub fn record(&mut self, item_id: &str, kind: AuditEventKind, comment: Option<String>) {
        self.events.push(PendingEvent {
            item_id: item_id.to_string(),
            kind,
            comment,
        });
        self.dirty_ids.insert(item_id.to_string());
    }
}

/// Result of a committed mutation: the closure's value plus whether any
/// item was marked dirty (and so a flush should be scheduled).
#[derive(Debug)]
pub struct Committed<R> {
    pub value: R,
    pub touched: bool,
}

/// Runs `apply` inside one IMMEDIATE transaction, then writes the recorded
/// audit events and dirty markers before committing. Any error rolls back
/// everything, including the events.
pub fn mutate<F, R, E>(conn: &Connection, actor: &str, apply: F) -> Result<Committed<R>, E>
where
    F: FnOnce(&Transaction<'_>, &mut MutationContext) -> Result<R, E>,
    E: From<rusqlite::Error>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut ctx = MutationContext::new(actor);

    let value = apply(&tx, &mut ctx)?;

    for event in &ctx.events {
        db::insert_event(
            &tx,
            &event.item_id,
            event.kind,
            &ctx.actor,
            event.comment.as_deref(),
            &ctx.now,
        )?;
    }
    for item_id in &ctx.dirty_ids {
        db::mark_dirty(&tx, item_id, &ctx.now)?;
    }
    let touched = !ctx.dirty_ids.is_empty();

    tx.commit()?;
    if touched {
        tracing::debug!(
            events = ctx.events.len(),
            dirty = ctx.dirty_ids.len(),
            "mutation committed"
        );
    }
    Ok(Committed { value, touched })
}

#[cfg(test)]
mod tests {
    use super::mutate;
    use crate::db::{self, list_dirty, list_events};
    use crate::events::{AuditEventKind, SortOrder};
    use std::path::PathBuf;
    use uuid::Uuid;

    fn unique_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("braid-mutation-{}.sqlite", Uuid::now_v7()))
    }

    #[test]
    fn commit_writes_events_and_markers_together() {
        let path = unique_db_path();
        let conn = db::open_connection(&path).expect("connection should open");

        let committed = mutate::<_, _, rusqlite::Error>(&conn, "alice", |_tx, ctx| {
            ctx.record("bd-1", AuditEventKind::Updated, Some("title".to_string()));
            Ok(ctx.now().to_string())
        })
        .expect("mutation should commit");
        assert!(committed.touched);

        let events = list_events(&conn, "bd-1", SortOrder::Ascending).expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "alice");
        assert_eq!(events[0].created_at, committed.value);
        let markers = list_dirty(&conn).expect("markers");
        assert_eq!(markers.len(), 1);
        assert!(markers[0].marked_at >= events[0].created_at);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn failure_rolls_back_every_side_effect() {
        let path = unique_db_path();
        let conn = db::open_connection(&path).expect("connection should open");

        let result = mutate::<_, (), rusqlite::Error>(&conn, "alice", |tx, ctx| {
            ctx.record("bd-1", AuditEventKind::Created, None);
            db::set_meta(tx, "rollback-marker", "written")?;
            Err(rusqlite::Error::QueryReturnedNoRows)
        });
        assert!(result.is_err());

        assert!(list_events(&conn, "bd-1", SortOrder::Ascending)
            .expect("events")
            .is_empty());
        assert!(list_dirty(&conn).expect("markers").is_empty());
        assert_eq!(db::get_meta(&conn, "rollback-marker").expect("meta"), None);

        let _ = std::fs::remove_file(path);
    }
}
