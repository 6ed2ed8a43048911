use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use uuid::Uuid;

fn unique_workspace(prefix: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&path).expect("workspace should be creatable");
    path
}

fn run_braid(repo_root: &Path, db_name: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_braid"))
        .env_remove("BRAID_DB_PATH")
        .env_remove("BRAID_LOG_PATH")
        .env_remove("BRAID_AUTO_IMPORT")
        .env_remove("BRAID_AUTO_FLUSH")
        .env("BRAID_ACTOR", "cli-tester")
        .env("BRAID_FLUSH_DEBOUNCE_MS", "5")
        .arg("--repo-root")
        .arg(repo_root)
        .arg("--db")
        .arg(repo_root.join(db_name))
        .args(args)
        .output()
        .expect("braid command should run")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "expected success but failed.\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn assert_failure(output: &Output) {
    assert!(
        !output.status.success(),
        "expected failure but command succeeded.\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn parse_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn ready_ids(root: &Path) -> Vec<String> {
    let output = run_braid(root, "state.sqlite", &["ready", "--sort", "priority", "--json"]);
    assert_success(&output);
    parse_json(&output)
        .as_array()
        .expect("ready output should be an array")
        .iter()
        .map(|item| item["id"].as_str().expect("id should be a string").to_string())
        .collect()
}

#[test]
fn blocker_lifecycle_round_trips_through_the_cli() {
    let root = unique_workspace("braid-cli-lifecycle");
    for (id, priority) in [("bd-1", "1"), ("bd-2", "2")] {
        let output = run_braid(
            &root,
            "state.sqlite",
            &["create", "Item", "--id", id, "-p", priority],
        );
        assert_success(&output);
    }
    assert_eq!(ready_ids(&root), vec!["bd-1", "bd-2"]);

    assert_success(&run_braid(&root, "state.sqlite", &["dep", "add", "bd-2", "bd-1"]));
    assert_eq!(ready_ids(&root), vec!["bd-2"]);

    let blocked = run_braid(&root, "state.sqlite", &["blocked", "--json"]);
    assert_success(&blocked);
    let blocked = parse_json(&blocked);
    assert_eq!(blocked["blocked"][0]["id"], "bd-1");
    assert_eq!(blocked["blocked"][0]["blocked_by"][0], "bd-2");

    let shown = run_braid(&root, "state.sqlite", &["show", "bd-1", "--json"]);
    assert_success(&shown);
    let shown = parse_json(&shown);
    assert_eq!(shown["ready"], false);
    assert_eq!(shown["blocked_by"][0], "bd-2");
    assert_eq!(shown["dependencies"][0]["from"], "bd-2");

    let closed = run_braid(&root, "state.sqlite", &["close", "bd-2", "--json"]);
    assert_success(&closed);
    assert_eq!(parse_json(&closed)["unblocked"][0], "bd-1");
    assert_eq!(ready_ids(&root), vec!["bd-1"]);

    let events = run_braid(&root, "state.sqlite", &["events", "bd-2", "--json"]);
    assert_success(&events);
    let events = parse_json(&events);
    let kinds = events
        .as_array()
        .expect("events should be an array")
        .iter()
        .map(|event| event["event_type"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["created", "closed"]);
    assert_eq!(events[0]["actor"], "cli-tester");

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn review_requires_exactly_one_outcome_and_a_reviewer() {
    let root = unique_workspace("braid-cli-review");
    assert_success(&run_braid(&root, "state.sqlite", &["create", "Plan", "--id", "bd-1"]));

    let none = run_braid(&root, "state.sqlite", &["review", "bd-1", "--reviewer", "alice"]);
    assert_failure(&none);
    assert!(String::from_utf8_lossy(&none.stderr).contains("must specify one of"));

    let both = run_braid(
        &root,
        "state.sqlite",
        &["review", "bd-1", "--approve", "--defer", "--reviewer", "alice"],
    );
    assert_failure(&both);

    let anonymous = run_braid(&root, "state.sqlite", &["review", "bd-1", "--approve"]);
    assert_failure(&anonymous);
    assert!(String::from_utf8_lossy(&anonymous.stderr).contains("--reviewer is required"));

    let bad_type = run_braid(
        &root,
        "state.sqlite",
        &["review", "bd-1", "--approve", "--reviewer", "alice", "--type", "style"],
    );
    assert_failure(&bad_type);

    assert_success(&run_braid(
        &root,
        "state.sqlite",
        &["review", "bd-1", "--approve", "--reviewer", "alice"],
    ));
    assert_success(&run_braid(
        &root,
        "state.sqlite",
        &["review", "bd-1", "--revise", "--reviewer", "bob", "--notes", "split it"],
    ));

    let history = run_braid(&root, "state.sqlite", &["review-history", "bd-1", "--json"]);
    assert_success(&history);
    let history = parse_json(&history);
    assert_eq!(history["item_id"], "bd-1");
    assert_eq!(history["title"], "Plan");
    let reviews = &history["reviews"];
    assert_eq!(reviews.as_array().map(Vec::len), Some(2));
    assert_eq!(reviews[0]["outcome"], "approved");
    assert_eq!(reviews[1]["outcome"], "needs_revision");
    assert_eq!(reviews[1]["review_type"], "plan");

    let printed = run_braid(&root, "state.sqlite", &["review-history", "bd-1"]);
    assert_success(&printed);
    let printed = String::from_utf8_lossy(&printed.stdout);
    assert!(printed.contains("Review History:"));
    assert!(printed.contains("| alice | plan | approved"));
    assert!(printed.contains("Current status: needs_revision by bob on "));

    let feed = run_braid(&root, "state.sqlite", &["reviews", "--reviewer", "bob", "--json"]);
    assert_success(&feed);
    let feed = parse_json(&feed);
    assert_eq!(feed.as_array().map(Vec::len), Some(1));
    assert_eq!(feed[0]["notes"], "split it");

    let shown = run_braid(&root, "state.sqlite", &["show", "bd-1", "--json"]);
    assert_success(&shown);
    let shown = parse_json(&shown);
    assert_eq!(shown["review_status"], "needs_revision");
    assert_eq!(shown["reviewed_by"], "bob");

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn shared_log_carries_items_between_clones() {
    let root = unique_workspace("braid-cli-clones");
    assert_success(&run_braid(
        &root,
        "first.sqlite",
        &["create", "Shared work", "--id", "bd-1", "-l", "sync"],
    ));
    let flushed = run_braid(&root, "first.sqlite", &["flush", "--json"]);
    assert_success(&flushed);

    let log = std::fs::read_to_string(root.join(".braid/items.jsonl"))
        .expect("shared log should exist");
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("\"id\":\"bd-1\""));
    assert!(!log.contains("created\""), "audit events must stay local");

    let listed = run_braid(&root, "second.sqlite", &["list", "--json"]);
    assert_success(&listed);
    let listed = parse_json(&listed);
    assert_eq!(listed[0]["id"], "bd-1");
    assert_eq!(listed[0]["labels"][0], "sync");

    let imported = run_braid(&root, "second.sqlite", &["import", "--json"]);
    assert_success(&imported);
    assert_eq!(parse_json(&imported)["status"], "unchanged");

    let events = run_braid(&root, "second.sqlite", &["events", "bd-1", "--json"]);
    assert_success(&events);
    assert_eq!(parse_json(&events).as_array().map(Vec::len), Some(0));

    assert_success(&run_braid(
        &root,
        "second.sqlite",
        &["create", "Reply work", "--id", "bd-2"],
    ));
    let listed = run_braid(&root, "first.sqlite", &["list", "--json"]);
    assert_success(&listed);
    let ids = parse_json(&listed)
        .as_array()
        .expect("list output should be an array")
        .iter()
        .map(|item| item["id"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["bd-1", "bd-2"]);
    assert!(!root.join(".braid/items.jsonl.lock").exists());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn unknown_items_and_bad_values_fail_cleanly() {
    let root = unique_workspace("braid-cli-errors");
    let missing = run_braid(&root, "state.sqlite", &["show", "bd-404"]);
    assert_failure(&missing);
    assert!(String::from_utf8_lossy(&missing.stderr).starts_with("error:"));

    assert_failure(&run_braid(&root, "state.sqlite", &["create", "X", "-t", "story"]));
    assert_failure(&run_braid(&root, "state.sqlite", &["ready", "--sort", "random"]));
    assert_failure(&run_braid(&root, "state.sqlite", &["create", "X", "-p", "9"]));

    let _ = std::fs::remove_dir_all(root);
}
