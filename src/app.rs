use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, Transaction};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::db::{self, DependencyRecord, EdgeDirection, ItemRecord};
use crate::domain::dependency::{DependencyKind, ParseDependencyKindError};
use crate::domain::issue_type::{IssueType, ParseIssueTypeError};
use crate::domain::review::{
    ParseReviewValueError, ReviewOutcome, ReviewStatus, ReviewType, ReviewValidationError,
};
use crate::domain::status::{InvalidStatusTransition, ItemStatus, ParseStatusError};
use crate::events::{
    format_timestamp, now_utc_rfc3339, parse_timestamp, AuditEvent, AuditEventKind, SortOrder,
};
use crate::export::{self, ExportError, ExportScope, FlushScheduler, FlushSummary};
use crate::graph::{BlockedItem, DependencyGraph, ParseSortPolicyError, SortPolicy};
use crate::imports::{ImportError, ImportService, ImportSummary};
use crate::item_id::{generate_item_id, is_valid_item_id};
use crate::listing::{apply_filters, normalize_labels, ItemListFilter, ReadyFilter};
use crate::mutation::{mutate, Committed, MutationContext};
use crate::reviews::{self, NewReview, ReviewRecord, ReviewSession};

/// Explicitly opened handle on one clone's store. Every operation goes
/// through it; `close` stops the background flush worker.
pub struct App {
    conn: Connection,
    config: Config,
    flusher: Option<FlushScheduler>,
}

#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub issue_type: IssueType,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub status: Option<ItemStatus>,
    pub issue_type: Option<IssueType>,
    /// An empty string clears the assignee.
    pub assignee: Option<String>,
    pub add_labels: Vec<String>,
    pub remove_labels: Vec<String>,
}

impl ItemPatch {
    fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.priority.is_some()
            || self.status.is_some()
            || self.issue_type.is_some()
            || self.assignee.is_some()
            || !self.add_labels.is_empty()
            || !self.remove_labels.is_empty()
    }
}

/// Item state after a write, plus the items that became ready when the
/// write closed it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ItemChange {
    pub item: ItemRecord,
    pub unblocked: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: ItemRecord,
    pub dependencies: Vec<DependencyRecord>,
    pub ready: bool,
    pub cyclic: bool,
    pub blocked_by: Vec<String>,
    pub pending_export: bool,
}

/// One item's reviews, oldest first, with its current review summary.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ItemReviewHistory {
    pub item_id: String,
    pub title: String,
    pub review_status: ReviewStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub reviews: Vec<ReviewRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EdgeChange {
    pub edge: DependencyRecord,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BlockedReport {
    pub blocked: Vec<BlockedItem>,
    pub cycles: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Stats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub ready: usize,
    pub blocked: usize,
    pub cyclic: usize,
    pub average_lead_time_hours: Option<f64>,
}

impl App {
    pub fn open(config: Config) -> Result<Self, AppError> {
        ensure_parent_dir(&config.db_path)?;
        let conn = db::open_connection(&config.db_path)?;
        tracing::debug!(
            repo = %config.repo_root.display(),
            db = %config.db_path.display(),
            log = %config.log_path.display(),
            "store opened"
        );
        let flusher = if config.auto_flush {
            Some(FlushScheduler::spawn(
                &config.db_path,
                config.shared_log(),
                config.flush_debounce,
            )?)
        } else {
            None
        };
        let app = Self {
            conn,
            config,
            flusher,
        };

        if app.config.auto_import {
            let summary = app.import_if_stale()?;
            for warning in &summary.warnings {
                tracing::warn!(log = %summary.log_path, "{warning}");
            }
        }
        Ok(app)
    }

    /// Stops the flush worker, running a pending debounced flush first.
    pub fn close(mut self) {
        if let Some(flusher) = self.flusher.take() {
            flusher.shutdown();
        }
    }

    pub fn create_item(&self, input: NewItem) -> Result<ItemRecord, AppError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::InvalidArgument("title cannot be empty".to_string()));
        }
        let priority = input.priority.unwrap_or(2);
        validate_priority(priority)?;
        if let Some(id) = input.id.as_deref() {
            if !is_valid_item_id(id) {
                return Err(AppError::InvalidArgument(format!("invalid item id '{id}'")));
            }
        }

        self.write(|tx, ctx| {
            let id = match input.id {
                Some(id) => id,
                None => generate_item_id(&self.config.id_prefix, |candidate| {
                    db::item_exists(tx, candidate).unwrap_or(true)
                }),
            };
            if db::item_exists(tx, &id)? {
                return Err(AppError::InvalidArgument(format!("item '{id}' already exists")));
            }
            let item = ItemRecord {
                id,
                title,
                description: input.description.as_deref().and_then(non_empty),
                status: ItemStatus::Open,
                priority,
                issue_type: input.issue_type,
                assignee: input.assignee.as_deref().and_then(non_empty),
                labels: normalize_labels(&input.labels),
                review_status: ReviewStatus::Unreviewed,
                reviewed_by: None,
                reviewed_at: None,
                close_reason: None,
                created_at: ctx.now().to_string(),
                updated_at: ctx.now().to_string(),
                closed_at: None,
            };
            db::upsert_item(tx, &item)?;
            ctx.record(&item.id, AuditEventKind::Created, None);
            Ok(item)
        })
    }

    pub fn update_item(&self, id: &str, patch: ItemPatch) -> Result<ItemChange, AppError> {
        if !patch.has_changes() {
            return Err(AppError::InvalidArgument(
                "update requires at least one field change".to_string(),
            ));
        }

        self.write(|tx, ctx| {
            let mut item = require_item(tx, id)?;
            let closing = patch.status == Some(ItemStatus::Closed) && !item.status.is_closed();
            if let Some(next) = patch.status.filter(|_| !closing) {
                item.status.validate_update(next)?;
            }
            let changed = apply_patch(&mut item, &patch)?;

            if closing {
                return close_in(tx, ctx, item, None, &changed);
            }
            if changed.is_empty() {
                return Ok(ItemChange {
                    item,
                    unblocked: Vec::new(),
                });
            }
            item.updated_at = ctx.now().to_string();
            db::upsert_item(tx, &item)?;
            ctx.record(id, AuditEventKind::Updated, Some(changed.join(", ")));
            Ok(ItemChange {
                item,
                unblocked: Vec::new(),
            })
        })
    }

    /// Closes the item and reports which items become ready as a result.
    pub fn close_item(&self, id: &str, reason: Option<&str>) -> Result<ItemChange, AppError> {
        self.write(|tx, ctx| {
            let item = require_item(tx, id)?;
            if item.status.is_closed() {
                return Err(AppError::InvalidArgument(format!("item '{id}' is already closed")));
            }
            close_in(tx, ctx, item, reason.and_then(non_empty), &[])
        })
    }

    pub fn reopen_item(&self, id: &str, reason: Option<&str>) -> Result<ItemRecord, AppError> {
        self.write(|tx, ctx| {
            let mut item = require_item(tx, id)?;
            if !item.status.is_closed() {
                return Err(AppError::InvalidArgument(format!(
                    "item '{id}' is not closed (status {})",
                    item.status
                )));
            }
            item.status = ItemStatus::Open;
            item.closed_at = None;
            item.close_reason = None;
            item.updated_at = ctx.now().to_string();
            db::upsert_item(tx, &item)?;
            ctx.record(id, AuditEventKind::Reopened, reason.and_then(non_empty));
            Ok(item)
        })
    }

    pub fn get_item(&self, id: &str) -> Result<ItemDetail, AppError> {
        let item = require_item(&self.conn, id)?;
        let dependencies = db::list_dependencies(&self.conn, id, EdgeDirection::Both)?;
        let graph = self.graph()?;
        Ok(ItemDetail {
            ready: graph.is_ready(id),
            cyclic: graph.is_cyclic(id),
            blocked_by: graph.blockers_of(id),
            pending_export: db::get_dirty(&self.conn, id)?.is_some(),
            item,
            dependencies,
        })
    }

    pub fn list_items(&self, filter: &ItemListFilter) -> Result<Vec<ItemRecord>, AppError> {
        Ok(apply_filters(db::list_items(&self.conn)?, filter))
    }

    /// Adds `from --kind--> to`. The `to` item owns the edge in the shared
    /// log, so it is the one stamped, audited and marked dirty. Adding an
    /// edge that already exists changes nothing.
    pub fn add_dependency(
        &self,
        from: &str,
        kind: DependencyKind,
        to: &str,
    ) -> Result<EdgeChange, AppError> {
        self.change_edge(from, kind, to, true)
    }

    pub fn remove_dependency(
        &self,
        from: &str,
        kind: DependencyKind,
        to: &str,
    ) -> Result<EdgeChange, AppError> {
        self.change_edge(from, kind, to, false)
    }

    pub fn list_dependencies(
        &self,
        id: &str,
        direction: EdgeDirection,
    ) -> Result<Vec<DependencyRecord>, AppError> {
        require_item(&self.conn, id)?;
        Ok(db::list_dependencies(&self.conn, id, direction)?)
    }

    fn change_edge(
        &self,
        from: &str,
        kind: DependencyKind,
        to: &str,
        add: bool,
    ) -> Result<EdgeChange, AppError> {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(AppError::InvalidArgument("from and to are required".to_string()));
        }
        if from == to {
            return Err(AppError::InvalidArgument(format!(
                "item '{from}' cannot depend on itself"
            )));
        }
        let edge = DependencyRecord {
            from: from.to_string(),
            to: to.to_string(),
            kind,
        };

        self.write(|tx, ctx| {
            require_item(tx, from)?;
            let mut owner = require_item(tx, to)?;
            let changed = if add {
                db::insert_dependency(tx, &edge, ctx.now())?
            } else {
                db::delete_dependency(tx, &edge)?
            };
            if !changed {
                return Ok(EdgeChange {
                    edge: edge.clone(),
                    changed,
                });
            }

            owner.updated_at = ctx.now().to_string();
            db::upsert_item(tx, &owner)?;
            let kind_event = if add {
                AuditEventKind::DependencyAdded
            } else {
                AuditEventKind::DependencyRemoved
            };
            ctx.record(to, kind_event, Some(format!("{} {}", kind, from)));
            Ok(EdgeChange {
                edge: edge.clone(),
                changed,
            })
        })
    }

    fn graph(&self) -> Result<DependencyGraph, AppError> {
        let items = db::list_items(&self.conn)?;
        let edges = db::list_all_dependencies(&self.conn)?;
        Ok(DependencyGraph::build(items, &edges))
    }

    pub fn compute_ready(
        &self,
        filter: &ReadyFilter,
        policy: SortPolicy,
    ) -> Result<Vec<ItemRecord>, AppError> {
        Ok(self.graph()?.ready(filter, policy))
    }

    pub fn blocked_items(&self, filter: &ReadyFilter) -> Result<BlockedReport, AppError> {
        let graph = self.graph()?;
        Ok(BlockedReport {
            blocked: graph.blocked(filter),
            cycles: graph.cycles().to_vec(),
        })
    }

    pub fn execution_order(&self, policy: SortPolicy) -> Result<Vec<ItemRecord>, AppError> {
        Ok(self.graph()?.topological_order(policy))
    }

    pub fn stats(&self) -> Result<Stats, AppError> {
        let graph = self.graph()?;
        let items = db::list_items(&self.conn)?;
        let mut by_status = ItemStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect::<BTreeMap<_, _>>();
        let mut lead_times = Vec::new();
        for item in &items {
            *by_status.entry(item.status.as_str().to_string()).or_default() += 1;
            if let Some(hours) = lead_time_hours(item) {
                lead_times.push(hours);
            }
        }
        let average_lead_time_hours = if lead_times.is_empty() {
            None
        } else {
            Some(lead_times.iter().sum::<f64>() / lead_times.len() as f64)
        };

        Ok(Stats {
            total: items.len(),
            by_status,
            ready: graph.ready_count(),
            blocked: graph.blocked_count(),
            cyclic: graph.cyclic_count(),
            average_lead_time_hours,
        })
    }

    /// Records a review, moves the item's review summary to the outcome and
    /// appends the `reviewed` audit event, all in one transaction.
    pub fn create_review(
        &self,
        item_id: &str,
        review_type: ReviewType,
        outcome: ReviewOutcome,
        reviewer: &str,
        notes: &str,
    ) -> Result<ReviewRecord, AppError> {
        let reviewer = reviewer.trim();
        if reviewer.is_empty() {
            return Err(ReviewValidationError::MissingReviewer.into());
        }
        let review = NewReview {
            item_id: item_id.to_string(),
            review_type,
            outcome,
            reviewer: reviewer.to_string(),
            notes: notes.trim().to_string(),
        };

        self.write(|tx, ctx| {
            let mut item = require_item(tx, item_id)?;
            let record = reviews::insert_review(tx, &review, ctx.now())?;
            item.review_status = ReviewStatus::from(outcome);
            item.reviewed_by = Some(review.reviewer.clone());
            item.reviewed_at = Some(ctx.now().to_string());
            item.updated_at = ctx.now().to_string();
            db::upsert_item(tx, &item)?;
            ctx.record(
                item_id,
                AuditEventKind::Reviewed,
                Some(format!("Review: {} by {}", outcome, review.reviewer)),
            );
            Ok(record)
        })
    }

    pub fn list_reviews(&self, item_id: &str) -> Result<Vec<ReviewRecord>, AppError> {
        require_item(&self.conn, item_id)?;
        Ok(reviews::list_reviews(&self.conn, item_id)?)
    }

    pub fn item_review_history(&self, item_id: &str) -> Result<ItemReviewHistory, AppError> {
        let reviews = self.list_reviews(item_id)?;
        let item = require_item(&self.conn, item_id)?;
        Ok(ItemReviewHistory {
            item_id: item.id,
            title: item.title,
            review_status: item.review_status,
            reviewed_by: item.reviewed_by,
            reviewed_at: item.reviewed_at,
            reviews,
        })
    }

    pub fn review_history(
        &self,
        reviewer: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ReviewRecord>, AppError> {
        Ok(reviews::review_history(
            &self.conn,
            reviewer.and_then(non_empty).as_deref(),
            limit,
        )?)
    }

    pub fn start_session(
        &self,
        root_item_id: &str,
        reviewer: &str,
    ) -> Result<ReviewSession, AppError> {
        let reviewer = reviewer.trim();
        if reviewer.is_empty() {
            return Err(ReviewValidationError::MissingReviewer.into());
        }
        require_item(&self.conn, root_item_id)?;
        Ok(reviews::insert_session(
            &self.conn,
            root_item_id,
            reviewer,
            &now_utc_rfc3339(),
        )?)
    }

    pub fn update_session(&self, session: &ReviewSession) -> Result<(), AppError> {
        if !reviews::update_session(&self.conn, session)? {
            return Err(AppError::NotFound(format!("review session {}", session.id)));
        }
        Ok(())
    }

    pub fn get_session(&self, id: i64) -> Result<Option<ReviewSession>, AppError> {
        Ok(reviews::get_session(&self.conn, id)?)
    }

    pub fn sessions_by_reviewer(
        &self,
        reviewer: &str,
        limit: usize,
    ) -> Result<Vec<ReviewSession>, AppError> {
        Ok(reviews::sessions_by_reviewer(&self.conn, reviewer.trim(), limit)?)
    }

    /// Tallies the reviewer's reviews on the root and its descendants since
    /// the session started, then stamps it complete.
    pub fn finish_session(&self, id: i64, summary: &str) -> Result<ReviewSession, AppError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut session = reviews::get_session(&tx, id)?
            .ok_or_else(|| AppError::NotFound(format!("review session {id}")))?;
        if session.is_complete() {
            return Err(AppError::InvalidArgument(format!(
                "review session {id} is already complete"
            )));
        }
        let scope = reviews::session_scope(&tx, &session.root_item_id)?;
        reviews::tally_session(&tx, &session.reviewer, &session.started_at, &scope)?
            .apply_to(&mut session);
        session.summary = summary.trim().to_string();
        session.completed_at = Some(now_utc_rfc3339());
        reviews::update_session(&tx, &session)?;
        tx.commit()?;
        Ok(session)
    }

    pub fn audit_events(
        &self,
        item_id: &str,
        order: SortOrder,
    ) -> Result<Vec<AuditEvent>, AppError> {
        Ok(db::list_events(&self.conn, item_id, order)?)
    }

    /// Events with `since <= created_at < until`, oldest first.
    pub fn audit_events_between(
        &self,
        since: &str,
        until: &str,
    ) -> Result<Vec<AuditEvent>, AppError> {
        let since = normalize_bound(since)?;
        let until = normalize_bound(until)?;
        Ok(db::list_events_between(&self.conn, &since, &until)?)
    }

    /// Marks existing items for re-export and restarts the flush timer.
    pub fn mark_dirty_and_schedule_flush(&self, item_ids: &[String]) -> Result<usize, AppError> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_utc_rfc3339();
        for id in item_ids {
            require_item(&tx, id)?;
            db::mark_dirty(&tx, id, &now)?;
        }
        tx.commit()?;
        if !item_ids.is_empty() {
            self.schedule_flush();
        }
        Ok(item_ids.len())
    }

    /// Flushes dirty items now, through the worker when one is running.
    pub fn flush(&self) -> Result<FlushSummary, AppError> {
        let summary = match &self.flusher {
            Some(flusher) => flusher.flush_now()?,
            None => export::flush(&self.conn, &self.config.shared_log(), ExportScope::Dirty)?,
        };
        Ok(summary)
    }

    pub fn export_all(&self) -> Result<FlushSummary, AppError> {
        Ok(export::flush(
            &self.conn,
            &self.config.shared_log(),
            ExportScope::All,
        )?)
    }

    pub fn import_if_stale(&self) -> Result<ImportSummary, AppError> {
        Ok(ImportService::new(&self.conn, &self.config.log_path).import_if_stale()?)
    }

    pub fn import_force(&self) -> Result<ImportSummary, AppError> {
        Ok(ImportService::new(&self.conn, &self.config.log_path).import_force()?)
    }

    fn write<F, R>(&self, apply: F) -> Result<R, AppError>
    where
        F: FnOnce(&Transaction<'_>, &mut MutationContext) -> Result<R, AppError>,
    {
        let Committed { value, touched } = mutate(&self.conn, &self.config.actor, apply)?;
        if touched {
            self.schedule_flush();
        }
        Ok(value)
    }

    fn schedule_flush(&self) {
        if let Some(flusher) = &self.flusher {
            flusher.schedule();
        }
    }
}

fn close_in(
    tx: &Transaction<'_>,
    ctx: &mut MutationContext,
    mut item: ItemRecord,
    reason: Option<String>,
    changed: &[&str],
) -> Result<ItemChange, AppError> {
    let graph = DependencyGraph::build(db::list_items(tx)?, &db::list_all_dependencies(tx)?);
    let unblocked = graph.unblocked_by_closure(&item.id);

    item.status = ItemStatus::Closed;
    item.closed_at = Some(ctx.now().to_string());
    item.close_reason = reason.clone();
    item.updated_at = ctx.now().to_string();
    db::upsert_item(tx, &item)?;

    let comment = match (reason, changed.is_empty()) {
        (Some(reason), true) => Some(reason),
        (Some(reason), false) => Some(format!("{reason} ({})", changed.join(", "))),
        (None, false) => Some(changed.join(", ")),
        (None, true) => None,
    };
    ctx.record(&item.id, AuditEventKind::Closed, comment);
    Ok(ItemChange { item, unblocked })
}

/// Applies field changes in place and returns the names of the fields that
/// actually changed. Status is left to the caller.
fn apply_patch(item: &mut ItemRecord, patch: &ItemPatch) -> Result<Vec<&'static str>, AppError> {
    let mut changed = Vec::new();

    if let Some(raw) = patch.title.as_deref() {
        let title = raw.trim();
        if title.is_empty() {
            return Err(AppError::InvalidArgument("title cannot be empty".to_string()));
        }
        if title != item.title {
            item.title = title.to_string();
            changed.push("title");
        }
    }
    if let Some(raw) = patch.description.as_deref() {
        let description = non_empty(raw);
        if description != item.description {
            item.description = description;
            changed.push("description");
        }
    }
    if let Some(priority) = patch.priority {
        validate_priority(priority)?;
        if priority != item.priority {
            item.priority = priority;
            changed.push("priority");
        }
    }
    if let Some(status) = patch.status.filter(|status| !status.is_closed()) {
        if status != item.status {
            item.status = status;
            changed.push("status");
        }
    }
    if let Some(issue_type) = patch.issue_type {
        if issue_type != item.issue_type {
            item.issue_type = issue_type;
            changed.push("type");
        }
    }
    if let Some(raw) = patch.assignee.as_deref() {
        let assignee = non_empty(raw);
        if assignee != item.assignee {
            item.assignee = assignee;
            changed.push("assignee");
        }
    }
    if !patch.add_labels.is_empty() || !patch.remove_labels.is_empty() {
        let removed = normalize_labels(&patch.remove_labels);
        let mut labels = item.labels.clone();
        labels.extend(normalize_labels(&patch.add_labels));
        labels.retain(|label| !removed.contains(label));
        let labels = normalize_labels(&labels);
        if labels != item.labels {
            item.labels = labels;
            changed.push("labels");
        }
    }
    Ok(changed)
}

fn require_item(conn: &Connection, id: &str) -> Result<ItemRecord, AppError> {
    db::get_item(conn, id)?.ok_or_else(|| AppError::NotFound(format!("item '{id}'")))
}

fn validate_priority(priority: i64) -> Result<(), AppError> {
    if !(0..=4).contains(&priority) {
        return Err(AppError::InvalidArgument(
            "priority must be between 0 and 4".to_string(),
        ));
    }
    Ok(())
}

fn lead_time_hours(item: &ItemRecord) -> Option<f64> {
    let created = parse_timestamp(&item.created_at)?;
    let closed = parse_timestamp(item.closed_at.as_deref()?)?;
    Some((closed - created).as_seconds_f64() / 3600.0)
}

fn normalize_bound(raw: &str) -> Result<String, AppError> {
    parse_timestamp(raw)
        .map(format_timestamp)
        .ok_or_else(|| AppError::InvalidArgument(format!("'{raw}' is not an RFC 3339 timestamp")))
}

fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn parse_edge_direction(raw: &str) -> Result<EdgeDirection, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "incoming" | "in" => Ok(EdgeDirection::Incoming),
        "outgoing" | "out" => Ok(EdgeDirection::Outgoing),
        "both" | "all" => Ok(EdgeDirection::Both),
        _ => Err(AppError::InvalidArgument(format!(
            "unsupported edge direction '{}'; use incoming|outgoing|both",
            raw
        ))),
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
    #[error("import error: {0}")]
    Import(#[from] ImportError),
    #[error(transparent)]
    Review(#[from] ReviewValidationError),
    #[error(transparent)]
    ParseStatus(#[from] ParseStatusError),
    #[error(transparent)]
    ParseIssueType(#[from] ParseIssueTypeError),
    #[error(transparent)]
    ParseDependencyKind(#[from] ParseDependencyKindError),
    #[error(transparent)]
    ParseReviewValue(#[from] ParseReviewValueError),
    #[error(transparent)]
    ParseSortPolicy(#[from] ParseSortPolicyError),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidStatusTransition),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0} not found in local store")]
    NotFound(String),
}
