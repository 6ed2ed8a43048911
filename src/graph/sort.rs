use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::db::ItemRecord;

/// Ordering applied to the ready set after graph evaluation. Every policy
/// ends on the item id so the output is deterministic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortPolicy {
    Priority,
    Oldest,
    #[default]
    Hybrid,
}

impl SortPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SortPolicy::Priority => "priority",
            SortPolicy::Oldest => "oldest",
            SortPolicy::Hybrid => "hybrid",
        }
    }

    pub fn compare(self, left: &ItemRecord, right: &ItemRecord) -> Ordering {
        match self {
            SortPolicy::Priority => left
                .priority
                .cmp(&right.priority)
                .then_with(|| left.id.cmp(&right.id)),
            SortPolicy::Oldest => left
                .created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id)),
            SortPolicy::Hybrid => left
                .priority
                .cmp(&right.priority)
                .then_with(|| left.created_at.cmp(&right.created_at))
                .then_with(|| left.id.cmp(&right.id)),
        }
    }

    pub fn sort(self, items: &mut [ItemRecord]) {
        items.sort_by(|left, right| self.compare(left, right));
    }
}

impl fmt::Display for SortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortPolicy {
    type Err = ParseSortPolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(SortPolicy::Priority),
            "oldest" => Ok(SortPolicy::Oldest),
            "" | "hybrid" => Ok(SortPolicy::Hybrid),
            _ => Err(ParseSortPolicyError {
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid sort policy '{value}': expected one of priority, oldest, hybrid")]
pub struct ParseSortPolicyError {
    value: String,
}
