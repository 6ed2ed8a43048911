mod app;
mod cli;
mod config;
mod db;
mod domain;
mod events;
mod export;
mod graph;
mod imports;
mod item_id;
mod listing;
mod locks;
mod mutation;
mod reviews;
mod ui;

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use app::{App, AppError};
use domain::issue_type::IssueType;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BRAID_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run() -> Result<(), AppError> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    let config = config::Config::load(&cli.repo_root, cli.overrides())?;
    let app = App::open(config)?;
    let result = dispatch(&app, cli.command);
    app.close();
    result
}

fn dispatch(app: &App, command: cli::Commands) -> Result<(), AppError> {
    use cli::{Commands, DepSubcommands};
    use domain::dependency::DependencyKind;
    use domain::review::{ReviewOutcome, ReviewType};
    use events::SortOrder;
    use graph::SortPolicy;

    match command {
        Commands::Create(args) => {
            let item = app.create_item(app::NewItem {
                id: args.id,
                title: args.title,
                description: args.description,
                priority: args.priority,
                issue_type: IssueType::from_str(&args.issue_type)?,
                assignee: args.assignee,
                labels: args.labels,
            })?;
            if args.json {
                print_json(&item)?;
            } else {
                println!("created {} {}", item.id, item.title);
            }
        }
        Commands::Update(args) => {
            let patch = app::ItemPatch {
                title: args.title,
                description: args.description,
                priority: args.priority,
                status: args.status.as_deref().map(str::parse).transpose()?,
                issue_type: args.issue_type.as_deref().map(str::parse).transpose()?,
                assignee: args.assignee,
                add_labels: args.add_labels,
                remove_labels: args.remove_labels,
            };
            let change = app.update_item(&args.id, patch)?;
            if args.json {
                print_json(&change)?;
            } else {
                println!(
                    "updated {} [{}] {}",
                    change.item.id, change.item.status, change.item.title
                );
                print_unblocked(&change.unblocked);
            }
        }
        Commands::Close(args) => {
            let change = app.close_item(&args.id, args.reason.as_deref())?;
            if args.json {
                print_json(&change)?;
            } else {
                println!("closed {} {}", change.item.id, change.item.title);
                print_unblocked(&change.unblocked);
            }
        }
        Commands::Reopen(args) => {
            let item = app.reopen_item(&args.id, args.reason.as_deref())?;
            if args.json {
                print_json(&item)?;
            } else {
                println!("reopened {} {}", item.id, item.title);
            }
        }
        Commands::Show(args) => {
            let detail = app.get_item(&args.id)?;
            if args.json {
                print_json(&detail)?;
            } else {
                ui::print_item_detail(&detail);
            }
        }
        Commands::List(args) => {
            let filter = listing::ItemListFilter {
                include_closed: args.all,
                status: args.status.as_deref().map(str::parse).transpose()?,
                priority: args.filter.priority,
                issue_type: parse_issue_type(args.filter.issue_type.as_deref())?,
                assignee: args.filter.assignee.clone(),
                unassigned: args.filter.unassigned,
                labels: args.filter.labels.clone(),
                labels_any: args.filter.labels_any.clone(),
                query: args.query,
                limit: args.limit,
            };
            let items = app.list_items(&filter)?;
            if args.json {
                print_json(&items)?;
            } else {
                ui::print_item_list(&items, &filter);
            }
        }
        Commands::Dep(args) => match args.command {
            DepSubcommands::Add(edge) => {
                let kind = DependencyKind::from_str(&edge.kind)?;
                let change = app.add_dependency(&edge.from, kind, &edge.to)?;
                let verb = if change.changed { "added" } else { "already present" };
                println!("edge {verb}: {} --{}--> {}", edge.from, kind, edge.to);
            }
            DepSubcommands::Remove(edge) => {
                let kind = DependencyKind::from_str(&edge.kind)?;
                let change = app.remove_dependency(&edge.from, kind, &edge.to)?;
                let verb = if change.changed { "removed" } else { "not present" };
                println!("edge {verb}: {} --{}--> {}", edge.from, kind, edge.to);
            }
            DepSubcommands::List(list) => {
                let direction = app::parse_edge_direction(&list.direction)?;
                let edges = app.list_dependencies(&list.id, direction)?;
                if list.json {
                    print_json(&edges)?;
                } else if edges.is_empty() {
                    println!("no edges for {}", list.id);
                } else {
                    for edge in edges {
                        println!("{} --{}--> {}", edge.from, edge.kind, edge.to);
                    }
                }
            }
        },
        Commands::Ready(args) => {
            let policy = SortPolicy::from_str(&args.sort)?;
            let filter = ready_filter(&args.filter, args.limit)?;
            let items = app.compute_ready(&filter, policy)?;
            if args.json {
                print_json(&items)?;
            } else {
                ui::print_ready(&items, policy);
            }
        }
        Commands::Blocked(args) => {
            let filter = ready_filter(&args.filter, args.limit)?;
            let report = app.blocked_items(&filter)?;
            if args.json {
                print_json(&report)?;
            } else {
                ui::print_blocked(&report);
            }
        }
        Commands::Plan(args) => {
            let items = app.execution_order(SortPolicy::from_str(&args.sort)?)?;
            if args.json {
                print_json(&items)?;
            } else {
                ui::print_plan(&items);
            }
        }
        Commands::Review(args) => {
            let outcome = ReviewOutcome::from_flags(args.approve, args.revise, args.defer)?;
            let review_type = ReviewType::from_str(&args.review_type)?;
            let record = app.create_review(
                &args.id,
                review_type,
                outcome,
                args.reviewer.as_deref().unwrap_or_default(),
                &args.notes,
            )?;
            if args.json {
                print_json(&record)?;
            } else {
                println!(
                    "reviewed {} ({}): {} by {}",
                    record.item_id, record.review_type, record.outcome, record.reviewer
                );
            }
        }
        Commands::Reviews(args) => {
            let reviews = app.review_history(args.reviewer.as_deref(), args.limit)?;
            if args.json {
                print_json(&reviews)?;
            } else {
                ui::print_reviews(&reviews);
            }
        }
        Commands::ReviewHistory(args) => {
            let history = app.item_review_history(&args.id)?;
            if args.json {
                print_json(&history)?;
            } else {
                ui::print_item_review_history(&history);
            }
        }
        Commands::Session(args) => run_session(app, args.command)?,
        Commands::Events(args) => {
            let events = match args.id.as_deref() {
                Some(id) => {
                    let order = if args.desc {
                        SortOrder::Descending
                    } else {
                        SortOrder::Ascending
                    };
                    app.audit_events(id, order)?
                }
                None => app.audit_events_between(
                    args.since.as_deref().unwrap_or("1970-01-01T00:00:00Z"),
                    args.until.as_deref().unwrap_or("9999-12-31T23:59:59Z"),
                )?,
            };
            if args.json {
                print_json(&events)?;
            } else {
                ui::print_events(&events);
            }
        }
        Commands::Touch(args) => {
            let marked = app.mark_dirty_and_schedule_flush(&args.ids)?;
            println!("marked {marked} item(s) for export");
        }
        Commands::Flush(args) => {
            let summary = if args.all {
                app.export_all()?
            } else {
                app.flush()?
            };
            if args.json {
                print_json(&summary)?;
            } else {
                ui::print_flush_summary(&summary);
            }
        }
        Commands::Import(args) => {
            let summary = if args.force {
                app.import_force()?
            } else {
                app.import_if_stale()?
            };
            if args.json {
                print_json(&summary)?;
            } else {
                ui::print_import_summary(&summary);
            }
        }
        Commands::Stats(args) => {
            let stats = app.stats()?;
            if args.json {
                print_json(&stats)?;
            } else {
                ui::print_stats(&stats);
            }
        }
    }

    Ok(())
}

fn run_session(app: &App, command: cli::SessionSubcommands) -> Result<(), AppError> {
    use cli::SessionSubcommands;

    let (session, json) = match command {
        SessionSubcommands::Start(args) => (
            app.start_session(&args.root, args.reviewer.as_deref().unwrap_or_default())?,
            args.json,
        ),
        SessionSubcommands::Finish(args) => {
            (app.finish_session(args.id, &args.summary)?, args.json)
        }
        SessionSubcommands::Update(args) => {
            let mut session = app
                .get_session(args.id)?
                .ok_or_else(|| AppError::NotFound(format!("review session {}", args.id)))?;
            if let Some(summary) = args.summary {
                session.summary = summary;
            }
            for (field, value) in [
                (&mut session.items_reviewed, args.reviewed),
                (&mut session.items_approved, args.approved),
                (&mut session.items_needs_revision, args.needs_revision),
                (&mut session.items_deferred, args.deferred),
            ] {
                if let Some(value) = value {
                    *field = value;
                }
            }
            app.update_session(&session)?;
            (session, args.json)
        }
        SessionSubcommands::Show(args) => (
            app.get_session(args.id)?
                .ok_or_else(|| AppError::NotFound(format!("review session {}", args.id)))?,
            args.json,
        ),
        SessionSubcommands::List(args) => {
            let sessions = app.sessions_by_reviewer(&args.reviewer, args.limit)?;
            if args.json {
                return print_json(&sessions);
            }
            if sessions.is_empty() {
                println!("no sessions for {}", args.reviewer);
            }
            for session in &sessions {
                ui::print_session(session);
            }
            return Ok(());
        }
    };
    if json {
        print_json(&session)
    } else {
        ui::print_session(&session);
        Ok(())
    }
}

fn ready_filter(
    args: &cli::FilterArgs,
    limit: Option<usize>,
) -> Result<listing::ReadyFilter, AppError> {
    Ok(listing::ReadyFilter {
        priority: args.priority,
        issue_type: parse_issue_type(args.issue_type.as_deref())?,
        assignee: args.assignee.clone(),
        unassigned: args.unassigned,
        labels: args.labels.clone(),
        labels_any: args.labels_any.clone(),
        limit,
    })
}

fn parse_issue_type(raw: Option<&str>) -> Result<Option<IssueType>, AppError> {
    Ok(raw.map(IssueType::from_str).transpose()?)
}

fn print_unblocked(ids: &[String]) {
    if !ids.is_empty() {
        println!("now ready: {}", ids.join(", "));
    }
}
