use std::fs;
use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use crate::db;
use crate::events::now_utc_rfc3339;
use crate::export::{content_hash, META_LAST_IMPORT, META_LOG_HASH};

use super::errors::ImportError;
use super::parse::{parse_log, ParsedLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Missing,
    Unchanged,
    Imported,
}

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::Missing => "missing",
            ImportStatus::Unchanged => "unchanged",
            ImportStatus::Imported => "imported",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub log_path: String,
    pub status: ImportStatus,
    pub processed_count: u64,
    pub created_count: u64,
    pub updated_count: u64,
    pub unchanged_count: u64,
    pub skipped_count: u64,
    pub warnings: Vec<String>,
}

impl ImportSummary {
    fn empty(log_path: &Path, status: ImportStatus) -> Self {
        Self {
            log_path: log_path.display().to_string(),
            status,
            processed_count: 0,
            created_count: 0,
            updated_count: 0,
            unchanged_count: 0,
            skipped_count: 0,
            warnings: Vec::new(),
        }
    }
}

/// Merges the shared log into the local store. Imported changes are not
/// local mutations: no audit events, no dirty markers.
pub struct ImportService<'a> {
    conn: &'a Connection,
    log_path: &'a Path,
}

impl<'a> ImportService<'a> {
    pub fn new(conn: &'a Connection, log_path: &'a Path) -> Self {
        Self { conn, log_path }
    }

    /// Imports only when the log's content hash differs from the watermark
    /// left by the last import or export.
    pub fn import_if_stale(&self) -> Result<ImportSummary, ImportError> {
        let Some(bytes) = self.read_log()? else {
            return Ok(ImportSummary::empty(self.log_path, ImportStatus::Missing));
        };
        let hash = content_hash(&bytes);
        if db::get_meta(self.conn, META_LOG_HASH)?.as_deref() == Some(hash.as_str()) {
            return Ok(ImportSummary::empty(self.log_path, ImportStatus::Unchanged));
        }
        self.merge(&bytes, &hash)
    }

    /// Imports regardless of the stored watermark.
    pub fn import_force(&self) -> Result<ImportSummary, ImportError> {
        let Some(bytes) = self.read_log()? else {
            return Ok(ImportSummary::empty(self.log_path, ImportStatus::Missing));
        };
        let hash = content_hash(&bytes);
        self.merge(&bytes, &hash)
    }

    fn read_log(&self) -> Result<Option<Vec<u8>>, ImportError> {
        match fs::read(self.log_path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn merge(&self, bytes: &[u8], hash: &str) -> Result<ImportSummary, ImportError> {
        let content = std::str::from_utf8(bytes).map_err(|_| ImportError::Encoding)?;
        let ParsedLog {
            records,
            processed,
            skipped,
            warnings,
        } = parse_log(content);

        let mut summary = ImportSummary::empty(self.log_path, ImportStatus::Imported);
        summary.processed_count = processed;
        summary.skipped_count = skipped;
        summary.warnings = warnings;

        let tx = self.conn.unchecked_transaction()?;
        for record in records.into_values() {
            let local = db::get_item(&tx, &record.item.id)?;
            match local {
                None => summary.created_count += 1,
                // Strictly later wins; ties keep the local copy.
                Some(local) if record.item.updated_at > local.updated_at => {
                    summary.updated_count += 1
                }
                Some(_) => {
                    summary.unchanged_count += 1;
                    continue;
                }
            }
            db::upsert_item(&tx, &record.item)?;
            db::replace_dependencies(&tx, &record.item.id, &record.edges, &record.item.updated_at)?;
        }
        tx.commit()?;

        db::set_meta(self.conn, META_LOG_HASH, hash)?;
        db::set_meta(self.conn, META_LAST_IMPORT, &now_utc_rfc3339())?;

        tracing::debug!(
            created = summary.created_count,
            updated = summary.updated_count,
            unchanged = summary.unchanged_count,
            skipped = summary.skipped_count,
            "shared log imported"
        );
        Ok(summary)
    }
}
