use std::collections::BTreeMap;

use crate::db::{DependencyRecord, ItemRecord};
use crate::events::{format_timestamp, parse_timestamp};
use crate::export::LogRecord;
use crate::listing::normalize_labels;

const CONFLICT_MARKERS: [&str; 3] = ["<<<<<<<", "=======", ">>>>>>>"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedRecord {
    pub item: ItemRecord,
    pub edges: Vec<DependencyRecord>,
}

#[derive(Debug, Default)]
pub(crate) struct ParsedLog {
    pub records: BTreeMap<String, ParsedRecord>,
    pub processed: u64,
    pub skipped: u64,
    pub warnings: Vec<String>,
}

impl ParsedLog {
    fn skip(&mut self, line_number: usize, message: impl std::fmt::Display) {
        let warning = format!("line {line_number}: {message}");
        tracing::warn!(%warning, "skipping shared log line");
        self.skipped += 1;
        self.warnings.push(warning);
    }
}

/// Parses every line of the shared log. A bad line never aborts the pass:
/// it is counted as skipped and described in `warnings`. When an id appears
/// twice the record with the later `updated_at` is kept.
pub(crate) fn parse_log(content: &str) -> ParsedLog {
    let mut parsed = ParsedLog::default();

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        parsed.processed += 1;

        if CONFLICT_MARKERS
            .iter()
            .any(|marker| trimmed.starts_with(marker))
        {
            parsed.skip(line_number, "unresolved merge conflict marker");
            continue;
        }

        let record: LogRecord = match serde_json::from_str(trimmed) {
            Ok(record) => record,
            Err(err) => {
                parsed.skip(line_number, format_args!("invalid JSON: {err}"));
                continue;
            }
        };

        let record = match validate(record) {
            Ok(record) => record,
            Err(message) => {
                parsed.skip(line_number, message);
                continue;
            }
        };

        match parsed.records.get(&record.item.id) {
            Some(previous) if previous.item.updated_at >= record.item.updated_at => {
                parsed.skip(
                    line_number,
                    format_args!("duplicate id '{}' with an older timestamp", record.item.id),
                );
            }
            Some(_) => {
                parsed.warnings.push(format!(
                    "line {line_number}: duplicate id '{}' supersedes an earlier line",
                    record.item.id
                ));
                parsed.records.insert(record.item.id.clone(), record);
            }
            None => {
                parsed.records.insert(record.item.id.clone(), record);
            }
        }
    }

    parsed
}

fn validate(record: LogRecord) -> Result<ParsedRecord, String> {
    let (mut item, edges) = record.into_parts();

    item.id = item.id.trim().to_string();
    if item.id.is_empty() {
        return Err("record has an empty id".to_string());
    }
    if item.title.trim().is_empty() {
        return Err(format!("record '{}' has an empty title", item.id));
    }
    if !(0..=4).contains(&item.priority) {
        return Err(format!(
            "record '{}' has priority {} outside 0-4",
            item.id, item.priority
        ));
    }

    item.created_at = normalize_required(&item.id, "created_at", &item.created_at)?;
    item.updated_at = normalize_required(&item.id, "updated_at", &item.updated_at)?;
    item.reviewed_at = normalize_optional(&item.id, "reviewed_at", item.reviewed_at)?;
    item.closed_at = normalize_optional(&item.id, "closed_at", item.closed_at)?;
    item.labels = normalize_labels(&item.labels);

    let edges = edges
        .into_iter()
        .filter(|edge| !edge.from.trim().is_empty() && edge.from != edge.to)
        .collect();

    Ok(ParsedRecord { item, edges })
}

fn normalize_required(id: &str, field: &str, raw: &str) -> Result<String, String> {
    parse_timestamp(raw)
        .map(format_timestamp)
        .ok_or_else(|| format!("record '{id}' has invalid {field} '{raw}'"))
}

fn normalize_optional(
    id: &str,
    field: &str,
    raw: Option<String>,
) -> Result<Option<String>, String> {
    match raw {
        Some(value) if !value.trim().is_empty() => normalize_required(id, field, &value).map(Some),
        _ => Ok(None),
    }
}
