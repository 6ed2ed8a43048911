use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "braid")]
#[command(bin_name = "braid")]
#[command(version)]
#[command(about = "A local-first work-item tracker with a dependency-aware scheduler")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'C',
        long,
        env = "BRAID_REPO_ROOT",
        default_value = ".",
        global = true,
        help = "Repository root that contains .braid/."
    )]
    pub repo_root: PathBuf,

    #[arg(
        short = 'd',
        long,
        env = "BRAID_DB_PATH",
        global = true,
        help = "Path to the local SQLite store."
    )]
    pub db: Option<PathBuf>,

    #[arg(long, env = "BRAID_LOG_PATH", global = true, help = "Path to the shared JSONL log.")]
    pub log: Option<PathBuf>,

    #[arg(long, env = "BRAID_ACTOR", global = true, help = "Name recorded on audit events.")]
    pub actor: Option<String>,

    #[arg(
        long,
        env = "BRAID_FLUSH_DEBOUNCE_MS",
        global = true,
        help = "Delay after the last write before the shared log is flushed."
    )]
    pub flush_debounce_ms: Option<u64>,

    #[arg(
        long,
        env = "BRAID_AUTO_IMPORT",
        global = true,
        value_parser = BoolishValueParser::new(),
        help = "Import the shared log on startup when it changed (true/false)."
    )]
    pub auto_import: Option<bool>,

    #[arg(
        long,
        env = "BRAID_AUTO_FLUSH",
        global = true,
        value_parser = BoolishValueParser::new(),
        help = "Flush local changes to the shared log after writes (true/false)."
    )]
    pub auto_flush: Option<bool>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            db_path: self.db.clone(),
            log_path: self.log.clone(),
            actor: self.actor.clone(),
            flush_debounce_ms: self.flush_debounce_ms,
            auto_import: self.auto_import,
            auto_flush: self.auto_flush,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Create a work item.")]
    Create(CreateArgs),
    #[command(about = "Update work item fields in one command.")]
    Update(UpdateArgs),
    #[command(about = "Close a work item and report what became ready.")]
    Close(CloseArgs),
    #[command(about = "Reopen a closed work item.")]
    Reopen(CloseArgs),
    #[command(about = "Show one work item with its dependencies.")]
    Show(ShowArgs),
    #[command(about = "List work items with filtering.")]
    List(ListArgs),
    #[command(about = "Manage dependency edges.")]
    Dep(DepArgs),
    #[command(about = "List items with no open blockers.")]
    Ready(ReadyArgs),
    #[command(about = "List blocked items and dependency cycles.")]
    Blocked(BlockedArgs),
    #[command(about = "Print open items in dependency order.")]
    Plan(PlanArgs),
    #[command(about = "Record a review outcome for a work item.")]
    Review(ReviewArgs),
    #[command(about = "List recent reviews across items, newest first.")]
    Reviews(ReviewFeedArgs),
    #[command(about = "Show one item's reviews in chronological order and its current status.")]
    ReviewHistory(ShowArgs),
    #[command(about = "Manage review sessions.")]
    Session(SessionArgs),
    #[command(about = "Show local audit events.")]
    Events(EventsArgs),
    #[command(about = "Mark items for re-export on the next flush.")]
    Touch(TouchArgs),
    #[command(about = "Write pending changes to the shared log.")]
    Flush(FlushArgs),
    #[command(about = "Merge the shared log into the local store.")]
    Import(ImportArgs),
    #[command(about = "Summarize item counts and lead time.")]
    Stats(JsonArgs),
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(help = "Item title.")]
    pub title: String,

    #[arg(short = 'd', long = "description", help = "Optional description text.")]
    pub description: Option<String>,

    #[arg(short = 'p', long, help = "Priority 0 (highest) to 4; defaults to 2.")]
    pub priority: Option<i64>,

    #[arg(short = 't', long = "type", default_value = "task", help = "Issue type.")]
    pub issue_type: String,

    #[arg(short = 'a', long, help = "Assignee.")]
    pub assignee: Option<String>,

    #[arg(short = 'l', long = "label", help = "Label (repeatable).")]
    pub labels: Vec<String>,

    #[arg(long, help = "Explicit item id instead of a generated one.")]
    pub id: Option<String>,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(help = "Item id.")]
    pub id: String,

    #[arg(long, help = "Set title.")]
    pub title: Option<String>,

    #[arg(short = 'd', long, help = "Set description.")]
    pub description: Option<String>,

    #[arg(short = 'p', long, help = "Set priority (0-4).")]
    pub priority: Option<i64>,

    #[arg(short = 's', long, help = "Set status (closing routes through close).")]
    pub status: Option<String>,

    #[arg(short = 't', long = "type", help = "Set issue type.")]
    pub issue_type: Option<String>,

    #[arg(short = 'a', long, help = "Set assignee; an empty value clears it.")]
    pub assignee: Option<String>,

    #[arg(long = "add-label", help = "Add label (repeatable).")]
    pub add_labels: Vec<String>,

    #[arg(long = "remove-label", help = "Remove label (repeatable).")]
    pub remove_labels: Vec<String>,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CloseArgs {
    #[arg(help = "Item id.")]
    pub id: String,

    #[arg(short = 'r', long, help = "Reason recorded with the change.")]
    pub reason: Option<String>,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Item id.")]
    pub id: String,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, help = "Include closed items.")]
    pub all: bool,

    #[arg(short = 's', long, help = "Filter by status.")]
    pub status: Option<String>,

    #[arg(short = 'q', long, help = "Substring match over id, title and description.")]
    pub query: Option<String>,

    #[arg(long, help = "Maximum rows to print.")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

/// Candidate pre-filters shared by list, ready and blocked.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    #[arg(short = 'p', long, help = "Filter by priority.")]
    pub priority: Option<i64>,

    #[arg(short = 't', long = "type", help = "Filter by issue type.")]
    pub issue_type: Option<String>,

    #[arg(short = 'a', long, help = "Filter by assignee.")]
    pub assignee: Option<String>,

    #[arg(long, conflicts_with = "assignee", help = "Only unassigned items.")]
    pub unassigned: bool,

    #[arg(short = 'l', long = "label", help = "Require label (repeatable, all must match).")]
    pub labels: Vec<String>,

    #[arg(long = "label-any", help = "Require any of these labels (repeatable).")]
    pub labels_any: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ReadyArgs {
    #[arg(long, default_value = "hybrid", help = "Sort policy: priority, oldest or hybrid.")]
    pub sort: String,

    #[arg(long, help = "Maximum rows to print.")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct BlockedArgs {
    #[arg(long, help = "Maximum rows to print.")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[arg(long, default_value = "hybrid", help = "Tie-break policy: priority, oldest or hybrid.")]
    pub sort: String,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DepArgs {
    #[command(subcommand)]
    pub command: DepSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum DepSubcommands {
    #[command(about = "Add an edge: <from> --type--> <to>.")]
    Add(DepEdgeArgs),
    #[command(about = "Remove an edge.")]
    Remove(DepEdgeArgs),
    #[command(about = "List edges for an item.")]
    List(DepListArgs),
}

#[derive(Debug, Args)]
pub struct DepEdgeArgs {
    #[arg(help = "Source item id (for blocks: the blocker).")]
    pub from: String,

    #[arg(help = "Target item id (for blocks: the blocked item).")]
    pub to: String,

    #[arg(
        short = 't',
        long = "type",
        default_value = "blocks",
        help = "Edge type: blocks, related, parent-child or discovered-from."
    )]
    pub kind: String,
}

#[derive(Debug, Args)]
pub struct DepListArgs {
    #[arg(help = "Item id.")]
    pub id: String,

    #[arg(long, default_value = "both", help = "incoming, outgoing or both.")]
    pub direction: String,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ReviewArgs {
    #[arg(help = "Item id.")]
    pub id: String,

    #[arg(long, help = "Approve the item.")]
    pub approve: bool,

    #[arg(long, help = "Request revision.")]
    pub revise: bool,

    #[arg(long, help = "Defer the review.")]
    pub defer: bool,

    #[arg(long, help = "Reviewer name (required).")]
    pub reviewer: Option<String>,

    #[arg(long, default_value = "", help = "Review notes.")]
    pub notes: String,

    #[arg(
        long = "type",
        default_value = "plan",
        help = "Review type: plan, implementation, security or custom."
    )]
    pub review_type: String,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ReviewFeedArgs {
    #[arg(long, help = "Only reviews by this reviewer.")]
    pub reviewer: Option<String>,

    #[arg(long, default_value_t = 20, help = "Maximum rows to print.")]
    pub limit: usize,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum SessionSubcommands {
    #[command(about = "Start a review session over an item and its children.")]
    Start(SessionStartArgs),
    #[command(about = "Tally the session's reviews and mark it complete.")]
    Finish(SessionFinishArgs),
    #[command(about = "Overwrite a session's summary or counts.")]
    Update(SessionUpdateArgs),
    #[command(about = "Show one session.")]
    Show(SessionShowArgs),
    #[command(about = "List a reviewer's sessions, newest first.")]
    List(SessionListArgs),
}

#[derive(Debug, Args)]
pub struct SessionStartArgs {
    #[arg(help = "Root item id.")]
    pub root: String,

    #[arg(long, help = "Reviewer name (required).")]
    pub reviewer: Option<String>,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SessionFinishArgs {
    #[arg(help = "Session id.")]
    pub id: i64,

    #[arg(long, default_value = "", help = "Free-text summary.")]
    pub summary: String,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SessionUpdateArgs {
    #[arg(help = "Session id.")]
    pub id: i64,

    #[arg(long, help = "Replace the summary.")]
    pub summary: Option<String>,

    #[arg(long, help = "Items reviewed.")]
    pub reviewed: Option<i64>,

    #[arg(long, help = "Items approved.")]
    pub approved: Option<i64>,

    #[arg(long = "needs-revision", help = "Items sent back for revision.")]
    pub needs_revision: Option<i64>,

    #[arg(long, help = "Items deferred.")]
    pub deferred: Option<i64>,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SessionShowArgs {
    #[arg(help = "Session id.")]
    pub id: i64,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SessionListArgs {
    #[arg(long, help = "Reviewer name.")]
    pub reviewer: String,

    #[arg(long, default_value_t = 20, help = "Maximum rows to print.")]
    pub limit: usize,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    #[arg(help = "Item id; omit to query a time window.")]
    pub id: Option<String>,

    #[arg(long, conflicts_with = "id", help = "Window start (RFC 3339, inclusive).")]
    pub since: Option<String>,

    #[arg(long, conflicts_with = "id", help = "Window end (RFC 3339, exclusive).")]
    pub until: Option<String>,

    #[arg(long, help = "Newest first (item history only).")]
    pub desc: bool,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct TouchArgs {
    #[arg(required = true, help = "Item ids.")]
    pub ids: Vec<String>,
}

#[derive(Debug, Args)]
pub struct FlushArgs {
    #[arg(long, help = "Rewrite every stored item, not only dirty ones.")]
    pub all: bool,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[arg(long, help = "Import even when the log matches the last watermark.")]
    pub force: bool,

    #[arg(long, help = "Render JSON output.")]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, DepSubcommands, SessionSubcommands};
    use clap::Parser;

    #[test]
    fn review_flags_parse_and_type_defaults_to_plan() {
        let cli = Cli::try_parse_from([
            "braid", "review", "bd-1", "--approve", "--reviewer", "alice",
        ])
        .expect("review should parse");
        let Commands::Review(args) = cli.command else {
            panic!("expected review command");
        };
        assert!(args.approve && !args.revise && !args.defer);
        assert_eq!(args.review_type, "plan");
        assert_eq!(args.reviewer.as_deref(), Some("alice"));
    }

    #[test]
    fn global_flags_feed_config_overrides() {
        let cli = Cli::try_parse_from([
            "braid",
            "ready",
            "--actor",
            "bob",
            "--auto-flush",
            "off",
            "--flush-debounce-ms",
            "25",
            "--label",
            "api",
        ])
        .expect("ready should parse");
        let overrides = cli.overrides();
        assert_eq!(overrides.actor.as_deref(), Some("bob"));
        assert_eq!(overrides.auto_flush, Some(false));
        assert_eq!(overrides.flush_debounce_ms, Some(25));
        let Commands::Ready(args) = cli.command else {
            panic!("expected ready command");
        };
        assert_eq!(args.filter.labels, vec!["api".to_string()]);
        assert_eq!(args.sort, "hybrid");
    }

    #[test]
    fn nested_subcommands_parse() {
        let cli = Cli::try_parse_from(["braid", "dep", "add", "bd-2", "bd-1"])
            .expect("dep add should parse");
        let Commands::Dep(dep) = cli.command else {
            panic!("expected dep command");
        };
        let DepSubcommands::Add(edge) = dep.command else {
            panic!("expected dep add");
        };
        assert_eq!(
            (edge.from.as_str(), edge.to.as_str(), edge.kind.as_str()),
            ("bd-2", "bd-1", "blocks")
        );

        let cli = Cli::try_parse_from(["braid", "session", "finish", "3", "--summary", "ok"])
            .expect("session finish should parse");
        let Commands::Session(session) = cli.command else {
            panic!("expected session command");
        };
        assert!(matches!(session.command, SessionSubcommands::Finish(args) if args.id == 3));

        let cli = Cli::try_parse_from([
            "braid", "session", "update", "3", "--approved", "2", "--summary", "midway",
        ])
        .expect("session update should parse");
        let Commands::Session(session) = cli.command else {
            panic!("expected session command");
        };
        let SessionSubcommands::Update(args) = session.command else {
            panic!("expected session update");
        };
        assert_eq!((args.id, args.approved, args.reviewed), (3, Some(2), None));
        assert_eq!(args.summary.as_deref(), Some("midway"));
    }

    #[test]
    fn review_history_takes_an_item_and_reviews_take_a_reviewer() {
        let cli = Cli::try_parse_from(["braid", "review-history", "bd-1", "--json"])
            .expect("review-history should parse");
        assert!(matches!(
            cli.command,
            Commands::ReviewHistory(args) if args.id == "bd-1" && args.json
        ));

        let cli = Cli::try_parse_from(["braid", "reviews", "--reviewer", "alice", "--limit", "5"])
            .expect("reviews should parse");
        assert!(matches!(
            cli.command,
            Commands::Reviews(args) if args.reviewer.as_deref() == Some("alice") && args.limit == 5
        ));
    }

    #[test]
    fn unassigned_conflicts_with_assignee() {
        let result = Cli::try_parse_from([
            "braid", "list", "--assignee", "alice", "--unassigned",
        ]);
        assert!(result.is_err());
    }
}
