pub mod record;
mod scheduler;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DirtyMarker, EdgeDirection};
use crate::events::{now_utc_rfc3339, parse_timestamp};
use crate::locks::{FileLock, LockError};

pub use record::{LogDependency, LogRecord};
pub use scheduler::FlushScheduler;

pub const META_LOG_HASH: &str = "log_content_hash";
pub const META_LAST_EXPORT: &str = "last_export_at";
pub const META_LAST_IMPORT: &str = "last_import_at";

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing shared log: {0}")]
    Io(#[from] io::Error),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("flush worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    Dirty,
    All,
}

/// Where a clone's shared log lives, and the lock file that serializes
/// writers to it. The lock sits in the local cache, not next to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLog {
    pub path: PathBuf,
    pub lock_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FlushSummary {
    pub exported: usize,
    pub total_records: usize,
    pub cleared_markers: usize,
    /// Dirty items whose log line carries a strictly later `updated_at`.
    /// Their lines are left alone and their markers kept.
    pub superseded: Vec<String>,
    /// True when the log held content this store had not imported, so the
    /// import watermark was left where it was.
    pub pending_import: bool,
    pub written: bool,
    pub content_hash: Option<String>,
}

/// Writes local item state into the shared log. Markers are cleared only
/// after the new file is durable and in place, and only for markers whose
/// generation did not move while the flush ran.
///
/// The import watermark advances to the written hash only when the log we
/// rewrote was already fully merged into this store. Otherwise the foreign
/// lines are kept verbatim and the next import picks them up.
pub fn flush(
    conn: &Connection,
    log: &SharedLog,
    scope: ExportScope,
) -> Result<FlushSummary, ExportError> {
    let _lock = FileLock::acquire(&log.lock_path, LOCK_TIMEOUT)?;

    let markers = db::list_dirty(conn)?;
    let ids = match scope {
        ExportScope::Dirty => markers
            .iter()
            .map(|marker| marker.item_id.clone())
            .collect::<Vec<_>>(),
        ExportScope::All => db::list_items(conn)?
            .into_iter()
            .map(|item| item.id)
            .collect(),
    };
    if scope == ExportScope::Dirty && ids.is_empty() {
        return Ok(FlushSummary::default());
    }

    let mut existing = read_existing_lines(&log.path)?;
    let watermark = db::get_meta(conn, META_LOG_HASH)?;
    let in_sync = existing.is_empty() || existing.observed_hash == watermark;

    let mut exported = 0;
    let mut superseded = Vec::new();
    for id in &ids {
        let Some(item) = db::get_item(conn, id)? else {
            tracing::warn!(item_id = %id, "dirty marker for unknown item");
            continue;
        };
        if existing.is_newer_than(id, &item.updated_at) {
            tracing::info!(
                item_id = %id,
                local = %item.updated_at,
                "shared log holds a newer version; keeping it until imported"
            );
            superseded.push(id.clone());
            continue;
        }
        let owned = db::list_dependencies(conn, id, EdgeDirection::Incoming)?;
        let line = serde_json::to_string(&LogRecord::from_item(item.clone(), &owned))?;
        existing.records.insert(
            id.clone(),
            LogLine {
                text: line,
                updated_at: Some(item.updated_at),
            },
        );
        exported += 1;
    }

    let content = existing.render();
    write_atomically(&log.path, content.as_bytes())?;
    let hash = content_hash(content.as_bytes());

    let advance = in_sync && superseded.is_empty();
    let cleared = clear_markers(conn, &markers, &superseded, advance.then_some(hash.as_str()))?;
    tracing::debug!(
        exported,
        cleared,
        superseded = superseded.len(),
        watermark_advanced = advance,
        total = existing.records.len(),
        path = %log.path.display(),
        "shared log flushed"
    );

    Ok(FlushSummary {
        exported,
        total_records: existing.records.len(),
        cleared_markers: cleared,
        superseded,
        pending_import: !advance,
        written: true,
        content_hash: Some(hash),
    })
}

fn clear_markers(
    conn: &Connection,
    markers: &[DirtyMarker],
    keep: &[String],
    watermark: Option<&str>,
) -> Result<usize, ExportError> {
    let tx = conn.unchecked_transaction()?;
    let mut cleared = 0;
    for marker in markers.iter().filter(|marker| !keep.contains(&marker.item_id)) {
        if db::clear_dirty(&tx, marker)? {
            cleared += 1;
        }
    }
    if let Some(hash) = watermark {
        db::set_meta(&tx, META_LOG_HASH, hash)?;
    }
    db::set_meta(&tx, META_LAST_EXPORT, &now_utc_rfc3339())?;
    tx.commit()?;
    Ok(cleared)
}

struct LogLine {
    text: String,
    updated_at: Option<String>,
}

/// Current log lines keyed by id. Lines that do not carry an id are kept
/// verbatim after the records so a flush never drops data it cannot read.
struct ExistingLog {
    records: BTreeMap<String, LogLine>,
    unparsed: Vec<String>,
    observed_hash: Option<String>,
}

impl ExistingLog {
    fn is_empty(&self) -> bool {
        self.records.is_empty() && self.unparsed.is_empty()
    }

    /// Last-writer-wins seen from the export side: a strictly later log
    /// timestamp must not be overwritten by older local state.
    fn is_newer_than(&self, id: &str, local_updated_at: &str) -> bool {
        let Some(remote) = self
            .records
            .get(id)
            .and_then(|line| line.updated_at.as_deref())
            .and_then(parse_timestamp)
        else {
            return false;
        };
        match parse_timestamp(local_updated_at) {
            Some(local) => remote > local,
            None => false,
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let records = self.records.values().map(|line| line.text.as_str());
        for line in records.chain(self.unparsed.iter().map(String::as_str)) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

fn read_existing_lines(log_path: &Path) -> Result<ExistingLog, ExportError> {
    let mut log = ExistingLog {
        records: BTreeMap::new(),
        unparsed: Vec::new(),
        observed_hash: None,
    };
    let raw = match fs::read_to_string(log_path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(log),
        Err(err) => return Err(err.into()),
    };
    log.observed_hash = Some(content_hash(raw.as_bytes()));

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = serde_json::from_str::<serde_json::Value>(trimmed).ok();
        let field = |name: &str| {
            value
                .as_ref()
                .and_then(|value| value.get(name))
                .and_then(|field| field.as_str())
                .map(str::to_string)
        };
        match field("id") {
            Some(id) => {
                let updated_at = field("updated_at");
                log.records.insert(
                    id,
                    LogLine {
                        text: trimmed.to_string(),
                        updated_at,
                    },
                );
            }
            None => {
                tracing::warn!(line = %trimmed, "preserving unreadable shared log line");
                log.unparsed.push(trimmed.to_string());
            }
        }
    }
    Ok(log)
}

/// Writes to a sibling temp file, fsyncs, then renames over the target so a
/// concurrent reader sees either the old or the new file.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_path_for(path);
    let result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(format!(".tmp-{}", Uuid::now_v7().simple()));
    PathBuf::from(raw)
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
