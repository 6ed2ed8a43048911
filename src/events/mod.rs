use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

/// One row per state-changing operation on a work item. Audit events are
/// local to the clone and never written to the shared log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEventKind {
    Created,
    Updated,
    Closed,
    Reopened,
    DependencyAdded,
    DependencyRemoved,
    Reviewed,
}

impl AuditEventKind {
    pub const ALL: [AuditEventKind; 7] = [
        AuditEventKind::Created,
        AuditEventKind::Updated,
        AuditEventKind::Closed,
        AuditEventKind::Reopened,
        AuditEventKind::DependencyAdded,
        AuditEventKind::DependencyRemoved,
        AuditEventKind::Reviewed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditEventKind::Created => "created",
            AuditEventKind::Updated => "updated",
            AuditEventKind::Closed => "closed",
            AuditEventKind::Reopened => "reopened",
            AuditEventKind::DependencyAdded => "dependency_added",
            AuditEventKind::DependencyRemoved => "dependency_removed",
            AuditEventKind::Reviewed => "reviewed",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventKind {
    type Err = ParseEventKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AuditEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| ParseEventKindError {
                value: value.to_string(),
            })
    }
}

impl Serialize for AuditEventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditEventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        AuditEventKind::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown audit event type '{value}'")]
pub struct ParseEventKindError {
    value: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuditEvent {
    pub id: i64,
    pub item_id: String,
    pub event_type: AuditEventKind,
    pub actor: String,
    pub comment: Option<String>,
    pub created_at: String,
}

/// Pending audit row collected during a mutation and written by the
/// transaction that commits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub item_id: String,
    pub kind: AuditEventKind,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// UTC timestamp with fixed microsecond precision, so lexical order of the
/// stored strings matches chronological order.
pub fn now_utc_rfc3339() -> String {
    format_timestamp(OffsetDateTime::now_utc())
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .to_offset(time::UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        ))
        .expect("fixed UTC timestamp formatting should never fail")
}

pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()
}
