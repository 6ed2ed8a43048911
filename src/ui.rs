use std::io::{self, IsTerminal};

use crate::app::{BlockedReport, ItemDetail, ItemReviewHistory, Stats};
use crate::db::ItemRecord;
use crate::events::AuditEvent;
use crate::export::FlushSummary;
use crate::graph::SortPolicy;
use crate::imports::ImportSummary;
use crate::listing::ItemListFilter;
use crate::reviews::{ReviewRecord, ReviewSession};

pub fn print_item_list(items: &[ItemRecord], filter: &ItemListFilter) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Items"));
    if let Some(summary) = filter_summary(filter) {
        println!("{}", palette.dim(&format!("filters: {summary}")));
    }
    print_rows(items, &palette, "no items matched");
}

pub fn print_ready(items: &[ItemRecord], policy: SortPolicy) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Ready"));
    println!("{}", palette.dim(&format!("sort: {policy}")));
    print_rows(items, &palette, "nothing is ready");
}

pub fn print_plan(items: &[ItemRecord]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Plan"));
    if items.is_empty() {
        println!("{}", palette.dim("nothing to schedule"));
        return;
    }
    for (step, item) in items.iter().enumerate() {
        println!("{:>3}. {}", step + 1, format_item_row(item, &palette));
    }
}

fn print_rows(items: &[ItemRecord], palette: &Palette, empty: &str) {
    if items.is_empty() {
        println!("{}", palette.dim(empty));
        return;
    }
    for item in items {
        println!("{}", format_item_row(item, palette));
    }
    println!("{}", palette.dim(&format!("{} item(s)", items.len())));
}

pub fn print_blocked(report: &BlockedReport) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Blocked"));
    if report.blocked.is_empty() {
        println!("{}", palette.dim("nothing is blocked"));
    }
    for entry in &report.blocked {
        println!(
            "{} {}",
            format_item_row(&entry.item, &palette),
            palette.dim(&format!("<- {}", entry.blocked_by.join(", ")))
        );
    }
    if !report.cycles.is_empty() {
        println!("{}", palette.heading("Cycles"));
        for group in &report.cycles {
            println!("  {}", palette.warn(&group.join(" -> ")));
        }
    }
}

pub fn print_item_detail(detail: &ItemDetail) {
    let palette = Palette::auto();
    let item = &detail.item;
    println!("{}", format_item_row(item, &palette));
    if let Some(description) = item.description.as_deref() {
        println!("{description}");
    }
    let stamps = format!("created {}  updated {}", item.created_at, item.updated_at);
    println!("{}", palette.dim(&stamps));
    if let Some(assignee) = item.assignee.as_deref() {
        println!("assignee: {assignee}");
    }
    println!("review: {}", review_line(item));
    if detail.cyclic {
        println!("{}", palette.dim("part of a dependency cycle"));
    } else if !detail.blocked_by.is_empty() {
        println!("blocked by: {}", detail.blocked_by.join(", "));
    } else if detail.ready {
        println!("ready to work");
    }
    if detail.pending_export {
        println!("{}", palette.dim("pending export to shared log"));
    }
    if let Some(closed_at) = item.closed_at.as_deref() {
        match item.close_reason.as_deref() {
            Some(reason) => println!("closed {closed_at}: {reason}"),
            None => println!("closed {closed_at}"),
        }
    }
    for edge in &detail.dependencies {
        println!(
            "{}",
            palette.dim(&format!("{} --{}--> {}", edge.from, edge.kind, edge.to))
        );
    }
}

pub fn print_reviews(reviews: &[ReviewRecord]) {
    let palette = Palette::auto();
    if reviews.is_empty() {
        println!("{}", palette.dim("no reviews recorded"));
        return;
    }
    for review in reviews {
        println!("{}", format_review_row(review));
    }
}

pub fn print_item_review_history(history: &ItemReviewHistory) {
    let palette = Palette::auto();
    println!();
    println!("{}: {}", palette.id(&history.item_id), history.title);
    println!("Review History:");
    if history.reviews.is_empty() {
        println!("  (no reviews yet)");
    }
    for review in &history.reviews {
        println!("  {}", format_history_row(review));
    }
    println!();
    println!("{}", format_current_status(history));
    println!();
}

pub fn print_session(session: &ReviewSession) {
    let palette = Palette::auto();
    println!(
        "{} {} on {} by {}",
        palette.id(&format!("session {}", session.id)),
        if session.is_complete() { "[COMPLETE]" } else { "[OPEN]" },
        session.root_item_id,
        session.reviewer
    );
    println!("started {}", session.started_at);
    if let Some(completed_at) = session.completed_at.as_deref() {
        println!("completed {completed_at}");
        println!(
            "reviewed {} (approved {}, needs revision {}, deferred {})",
            session.items_reviewed,
            session.items_approved,
            session.items_needs_revision,
            session.items_deferred
        );
    }
    if !session.summary.is_empty() {
        println!("{}", session.summary);
    }
}

pub fn print_events(events: &[AuditEvent]) {
    let palette = Palette::auto();
    if events.is_empty() {
        println!("{}", palette.dim("no events"));
        return;
    }
    for event in events {
        let mut line = format!(
            "{} {} {} by {}",
            palette.dim(&event.created_at),
            palette.id(&event.item_id),
            event.event_type,
            event.actor
        );
        if let Some(comment) = event.comment.as_deref() {
            line.push_str(&format!(": {comment}"));
        }
        println!("{line}");
    }
}

pub fn print_stats(stats: &Stats) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Stats"));
    println!("total    {}", stats.total);
    for (status, count) in &stats.by_status {
        println!("{status:<12} {count}");
    }
    println!("ready    {}", stats.ready);
    println!("blocked  {}", stats.blocked);
    println!("cyclic   {}", stats.cyclic);
    if let Some(hours) = stats.average_lead_time_hours {
        println!("avg lead time {hours:.1}h");
    }
}

pub fn print_flush_summary(summary: &FlushSummary) {
    let palette = Palette::auto();
    if summary.written {
        println!(
            "flushed {} item(s); log holds {} record(s)",
            summary.exported, summary.total_records
        );
    } else {
        println!("nothing to flush");
    }
    if !summary.superseded.is_empty() {
        println!(
            "{}",
            palette.warn(&format!(
                "kept newer log versions of: {}",
                summary.superseded.join(", ")
            ))
        );
    }
    if summary.pending_import {
        println!("{}", palette.dim("shared log has changes from other clones; run `braid import`"));
    }
}

pub fn print_import_summary(summary: &ImportSummary) {
    println!(
        "import {}: processed={} created={} updated={} unchanged={} skipped={}",
        summary.status.as_str(),
        summary.processed_count,
        summary.created_count,
        summary.updated_count,
        summary.unchanged_count,
        summary.skipped_count
    );
    for warning in &summary.warnings {
        println!("warning: {warning}");
    }
}

fn format_item_row(item: &ItemRecord, palette: &Palette) -> String {
    let mut line = format!(
        "{} {} {} {}",
        palette.id(&item.id),
        palette.status(item.status.as_str()),
        palette.priority(item.priority),
        item.title
    );
    line.push(' ');
    line.push_str(&palette.type_label(item.issue_type.as_str()));
    if let Some(assignee) = item.assignee.as_deref() {
        line.push_str(&format!(" @{assignee}"));
    }
    if !item.labels.is_empty() {
        line.push(' ');
        line.push_str(&palette.labels(&format!("#{}", item.labels.join(" #"))));
    }
    line
}

fn format_review_row(review: &ReviewRecord) -> String {
    let mut line = format!(
        "{} {} {} {} by {}",
        review.created_at, review.item_id, review.review_type, review.outcome, review.reviewer
    );
    if !review.notes.is_empty() {
        line.push_str(&format!(": {}", review.notes));
    }
    line
}

fn format_history_row(review: &ReviewRecord) -> String {
    let mut line = format!(
        "{} | {} | {} | {}",
        short_stamp(&review.created_at),
        review.reviewer,
        review.review_type,
        review.outcome
    );
    if !review.notes.is_empty() {
        line.push_str(&format!(" | {:?}", review.notes));
    }
    line
}

fn format_current_status(history: &ItemReviewHistory) -> String {
    let mut line = format!("Current status: {}", history.review_status);
    if let Some(by) = history.reviewed_by.as_deref() {
        line.push_str(&format!(" by {by}"));
    }
    if let Some(at) = history.reviewed_at.as_deref() {
        line.push_str(&format!(" on {}", short_stamp(at)));
    }
    line
}

/// `2026-02-22T10:15:00.000000Z` -> `2026-02-22 10:15`.
fn short_stamp(raw: &str) -> String {
    match raw.get(..16) {
        Some(head) => head.replacen('T', " ", 1),
        None => raw.to_string(),
    }
}

fn review_line(item: &ItemRecord) -> String {
    match (item.reviewed_by.as_deref(), item.reviewed_at.as_deref()) {
        (Some(by), Some(at)) => format!("{} by {by} at {at}", item.review_status),
        _ => item.review_status.to_string(),
    }
}

fn filter_summary(filter: &ItemListFilter) -> Option<String> {
    let mut parts = Vec::new();
    if filter.include_closed {
        parts.push("all=true".to_string());
    }
    if let Some(status) = filter.status {
        parts.push(format!("status={status}"));
    }
    if let Some(priority) = filter.priority {
        parts.push(format!("priority={priority}"));
    }
    if let Some(kind) = filter.issue_type {
        parts.push(format!("type={kind}"));
    }
    if let Some(assignee) = filter.assignee.as_deref().and_then(non_empty) {
        parts.push(format!("assignee={assignee}"));
    }
    if filter.unassigned {
        parts.push("unassigned=true".to_string());
    }
    for (key, labels) in [("labels", &filter.labels), ("labels_any", &filter.labels_any)] {
        let labels = labels
            .iter()
            .filter_map(|label| non_empty(label))
            .collect::<Vec<_>>();
        if !labels.is_empty() {
            parts.push(format!("{key}={}", labels.join(",")));
        }
    }
    if let Some(query) = filter.query.as_deref().and_then(non_empty) {
        parts.push(format!("query={query}"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn warn(&self, text: &str) -> String {
        self.paint("31", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn status(&self, status: &str) -> String {
        let upper = status.to_ascii_uppercase();
        self.paint(status_color_code(status), &format!("[{upper}]"))
    }

    fn priority(&self, priority: i64) -> String {
        let code = if priority <= 1 { "1;33" } else { "37" };
        self.paint(code, &format!("P{priority}"))
    }

    fn type_label(&self, issue_type: &str) -> String {
        self.paint("35", &format!("({issue_type})"))
    }

    fn labels(&self, text: &str) -> String {
        self.paint("90", text)
    }
}

fn status_color_code(status: &str) -> &'static str {
    match status {
        "open" => "36",
        "in_progress" => "33",
        "blocked" => "31",
        "deferred" => "34",
        "closed" => "32",
        _ => "37",
    }
}

#[cfg(test)]
mod tests {
    use super::{
        filter_summary, format_current_status, format_history_row, format_item_row,
        format_review_row, Palette,
    };
    use crate::app::ItemReviewHistory;
    use crate::domain::review::ReviewStatus;
    use crate::db::ItemRecord;
    use crate::domain::issue_type::IssueType;
    use crate::domain::review::{ReviewOutcome, ReviewType};
    use crate::domain::status::ItemStatus;
    use crate::listing::ItemListFilter;
    use crate::reviews::ReviewRecord;

    fn plain() -> Palette {
        Palette { enabled: false }
    }

    #[test]
    fn filter_summary_formats_only_active_filters() {
        let filter = ItemListFilter {
            status: Some(ItemStatus::InProgress),
            issue_type: Some(IssueType::Bug),
            labels: vec!["release".to_string(), "".to_string()],
            query: Some("sync".to_string()),
            ..ItemListFilter::default()
        };
        assert_eq!(
            filter_summary(&filter).as_deref(),
            Some("status=in_progress type=bug labels=release query=sync")
        );
        assert!(filter_summary(&ItemListFilter::default()).is_none());
    }

    #[test]
    fn item_row_shows_status_priority_type_and_labels() {
        let item = ItemRecord {
            id: "bd-1".to_string(),
            title: "Fix login".to_string(),
            description: None,
            status: ItemStatus::Open,
            priority: 1,
            issue_type: IssueType::Bug,
            assignee: Some("alice".to_string()),
            labels: vec!["auth".to_string(), "web".to_string()],
            review_status: Default::default(),
            reviewed_by: None,
            reviewed_at: None,
            close_reason: None,
            created_at: "2026-02-22T10:00:00.000000Z".to_string(),
            updated_at: "2026-02-22T10:00:00.000000Z".to_string(),
            closed_at: None,
        };
        assert_eq!(
            format_item_row(&item, &plain()),
            "bd-1 [OPEN] P1 Fix login (bug) @alice #auth #web"
        );
    }

    #[test]
    fn review_row_appends_notes_when_present() {
        let mut review = ReviewRecord {
            id: 1,
            item_id: "bd-1".to_string(),
            review_type: ReviewType::Plan,
            outcome: ReviewOutcome::NeedsRevision,
            reviewer: "bob".to_string(),
            notes: String::new(),
            created_at: "2026-02-22T10:00:00.000000Z".to_string(),
        };
        assert_eq!(
            format_review_row(&review),
            "2026-02-22T10:00:00.000000Z bd-1 plan needs_revision by bob"
        );
        review.notes = "split the migration".to_string();
        assert!(format_review_row(&review).ends_with(": split the migration"));
    }

    #[test]
    fn history_rows_and_current_status_use_short_stamps() {
        let review = ReviewRecord {
            id: 2,
            item_id: "bd-1".to_string(),
            review_type: ReviewType::Security,
            outcome: ReviewOutcome::NeedsRevision,
            reviewer: "bob".to_string(),
            notes: "split it".to_string(),
            created_at: "2026-02-22T10:15:30.000000Z".to_string(),
        };
        assert_eq!(
            format_history_row(&review),
            "2026-02-22 10:15 | bob | security | needs_revision | \"split it\""
        );

        let mut history = ItemReviewHistory {
            item_id: "bd-1".to_string(),
            title: "Plan".to_string(),
            review_status: ReviewStatus::NeedsRevision,
            reviewed_by: Some("bob".to_string()),
            reviewed_at: Some("2026-02-22T10:15:30.000000Z".to_string()),
            reviews: vec![review],
        };
        assert_eq!(
            format_current_status(&history),
            "Current status: needs_revision by bob on 2026-02-22 10:15"
        );
        history.review_status = ReviewStatus::Unreviewed;
        history.reviewed_by = None;
        history.reviewed_at = None;
        assert_eq!(format_current_status(&history), "Current status: unreviewed");
    }
}
