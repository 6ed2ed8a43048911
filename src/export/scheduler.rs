use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use rusqlite::Connection;

use super::{flush, ExportError, ExportScope, FlushSummary, SharedLog};
use crate::db;

type FlushReply = Sender<Result<FlushSummary, ExportError>>;

enum Command {
    Schedule,
    FlushNow(FlushReply),
    Shutdown,
}

/// Single-owner debounce timer for the shared log. One worker thread owns
/// its own connection and is the only flush writer in the process, so
/// flushes never overlap. `schedule` restarts the deadline; there is never
/// more than one pending timer.
pub struct FlushScheduler {
    tx: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl FlushScheduler {
    pub fn spawn(
        db_path: &Path,
        log: SharedLog,
        debounce: Duration,
    ) -> Result<Self, ExportError> {
        let conn = db::open_connection(db_path)?;
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("braid-flush".to_string())
            .spawn(move || run_worker(conn, log, debounce, rx))?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    pub fn schedule(&self) {
        if self.tx.send(Command::Schedule).is_err() {
            tracing::warn!("flush worker is gone; dirty items stay marked until the next flush");
        }
    }

    /// Flushes immediately and waits for the result. Requests queued while a
    /// flush is being prepared share its result.
    pub fn flush_now(&self) -> Result<FlushSummary, ExportError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(Command::FlushNow(reply_tx))
            .map_err(|_| ExportError::Worker("flush worker is not running".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| ExportError::Worker("flush worker exited before replying".to_string()))?
    }

    /// Runs any pending flush, then stops the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.tx.send(Command::Shutdown);
        if handle.join().is_err() {
            tracing::warn!("flush worker panicked");
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(conn: Connection, log: SharedLog, debounce: Duration, rx: Receiver<Command>) {
    let mut deadline: Option<Instant> = None;
    // Set when a timed flush failed; shutdown retries it.
    let mut retry_pending = false;

    loop {
        let command = match deadline {
            Some(at) => match rx.recv_deadline(at) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(Command::Shutdown),
            },
            None => Some(rx.recv().unwrap_or(Command::Shutdown)),
        };

        match command {
            None => {
                deadline = None;
                retry_pending = run_logged(&conn, &log).is_err();
            }
            Some(Command::Schedule) => {
                deadline = Some(Instant::now() + debounce);
            }
            Some(Command::FlushNow(reply)) => {
                let mut replies = vec![reply];
                let mut shutdown = false;
                for queued in rx.try_iter() {
                    match queued {
                        Command::FlushNow(reply) => replies.push(reply),
                        Command::Schedule => {}
                        Command::Shutdown => shutdown = true,
                    }
                }
                deadline = None;
                let result = flush(&conn, &log, ExportScope::Dirty);
                retry_pending = result.is_err();
                answer(replies, result);
                if shutdown {
                    break;
                }
            }
            Some(Command::Shutdown) => {
                if deadline.is_some() || retry_pending {
                    let _ = run_logged(&conn, &log);
                }
                break;
            }
        }
    }
    tracing::debug!("flush worker stopped");
}

fn run_logged(conn: &Connection, log: &SharedLog) -> Result<FlushSummary, ExportError> {
    let result = flush(conn, log, ExportScope::Dirty);
    if let Err(err) = &result {
        tracing::warn!(error = %err, "debounced flush failed; dirty markers kept for retry");
    }
    result
}

fn answer(replies: Vec<FlushReply>, result: Result<FlushSummary, ExportError>) {
    match result {
        Ok(summary) => {
            for reply in replies {
                let _ = reply.send(Ok(summary.clone()));
            }
        }
        Err(err) => {
            let mut replies = replies.into_iter();
            let message = err.to_string();
            if let Some(first) = replies.next() {
                let _ = first.send(Err(err));
            }
            for reply in replies {
                let _ = reply.send(Err(ExportError::Worker(message.clone())));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FlushScheduler;
    use crate::export::SharedLog;
    use crate::db::{self, ItemRecord};
    use crate::domain::issue_type::IssueType;
    use crate::domain::review::ReviewStatus;
    use crate::domain::status::ItemStatus;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;
    use uuid::Uuid;

    fn unique_workspace() -> PathBuf {
        let root = std::env::temp_dir().join(format!("braid-flush-worker-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&root).expect("workspace should be creatable");
        root
    }

    fn shared_log(root: &std::path::Path) -> SharedLog {
        SharedLog {
            path: root.join("items.jsonl"),
            lock_path: root.join("cache").join("export.lock"),
        }
    }

    fn seed_dirty_item(db_path: &std::path::Path, id: &str) {
        let conn = db::open_connection(db_path).expect("db should open");
        let stamp = "2026-02-22T10:00:00.000000Z";
        db::upsert_item(
            &conn,
            &ItemRecord {
                id: id.to_string(),
                title: "Flush me".to_string(),
                description: None,
                status: ItemStatus::Open,
                priority: 2,
                issue_type: IssueType::Task,
                assignee: None,
                labels: Vec::new(),
                review_status: ReviewStatus::Unreviewed,
                reviewed_by: None,
                reviewed_at: None,
                close_reason: None,
                created_at: stamp.to_string(),
                updated_at: stamp.to_string(),
                closed_at: None,
            },
        )
        .expect("seed item should insert");
        db::mark_dirty(&conn, id, stamp).expect("seed marker should insert");
    }

    #[test]
    fn scheduled_flush_fires_after_debounce() {
        let root = unique_workspace();
        let db_path = root.join("state.sqlite");
        let log_path = root.join("items.jsonl");
        seed_dirty_item(&db_path, "bd-1");

        let scheduler =
            FlushScheduler::spawn(&db_path, shared_log(&root), Duration::from_millis(20))
                .expect("worker should start");
        scheduler.schedule();
        scheduler.schedule();

        let mut waited = 0;
        while !log_path.exists() && waited < 100 {
            thread::sleep(Duration::from_millis(20));
            waited += 1;
        }
        assert!(log_path.exists(), "debounced flush should write the log");
        scheduler.shutdown();

        let conn = db::open_connection(&db_path).expect("db should reopen");
        assert!(db::list_dirty(&conn).expect("markers").is_empty());
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn shutdown_runs_pending_flush() {
        let root = unique_workspace();
        let db_path = root.join("state.sqlite");
        let log_path = root.join("items.jsonl");
        seed_dirty_item(&db_path, "bd-1");

        let scheduler = FlushScheduler::spawn(&db_path, shared_log(&root), Duration::from_secs(60))
            .expect("worker should start");
        scheduler.schedule();
        scheduler.shutdown();

        let content = std::fs::read_to_string(&log_path).expect("log should exist after shutdown");
        assert!(content.contains("\"id\":\"bd-1\""));
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn flush_now_returns_summary() {
        let root = unique_workspace();
        let db_path = root.join("state.sqlite");
        seed_dirty_item(&db_path, "bd-1");

        let scheduler = FlushScheduler::spawn(&db_path, shared_log(&root), Duration::from_secs(60))
            .expect("worker should start");
        let summary = scheduler.flush_now().expect("flush should succeed");
        assert_eq!(summary.exported, 1);
        assert_eq!(summary.cleared_markers, 1);

        let again = scheduler.flush_now().expect("second flush should succeed");
        assert!(!again.written);
        drop(scheduler);
        let _ = std::fs::remove_dir_all(root);
    }
}
