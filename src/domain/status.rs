use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    #[default]
    Open,
    InProgress,
    Blocked,
    Deferred,
    Closed,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 5] = [
        ItemStatus::Open,
        ItemStatus::InProgress,
        ItemStatus::Blocked,
        ItemStatus::Deferred,
        ItemStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Open => "open",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Blocked => "blocked",
            ItemStatus::Deferred => "deferred",
            ItemStatus::Closed => "closed",
        }
    }

    pub fn is_closed(self) -> bool {
        self == ItemStatus::Closed
    }

    /// Items in these states are candidates for the ready and blocked sets.
    /// A manually `blocked` or `deferred` item is never offered as ready work,
    /// but it still blocks its dependents until closed.
    pub fn is_schedulable(self) -> bool {
        matches!(self, ItemStatus::Open | ItemStatus::InProgress)
    }

    /// Status changes through a field update. Closing and reopening have
    /// their own operations because they carry extra bookkeeping.
    pub fn validate_update(self, next: ItemStatus) -> Result<(), InvalidStatusTransition> {
        if self == next {
            return Ok(());
        }
        if self.is_closed() || next.is_closed() {
            return Err(InvalidStatusTransition {
                from: self,
                to: next,
            });
        }
        Ok(())
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        let status = match normalized.as_str() {
            "open" => ItemStatus::Open,
            "in_progress" | "inprogress" | "active" => ItemStatus::InProgress,
            "blocked" => ItemStatus::Blocked,
            "deferred" => ItemStatus::Deferred,
            "closed" | "done" => ItemStatus::Closed,
            _ => {
                return Err(ParseStatusError {
                    value: value.to_string(),
                });
            }
        };
        Ok(status)
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ItemStatus::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status '{value}': expected one of {}", expected_statuses())]
pub struct ParseStatusError {
    value: String,
}

fn expected_statuses() -> String {
    ItemStatus::ALL
        .iter()
        .map(|status| status.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status change: {from} -> {to} (use close or reopen)")]
pub struct InvalidStatusTransition {
    pub from: ItemStatus,
    pub to: ItemStatus,
}
