use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Typed relation between two work items. Only `Blocks` participates in
/// scheduling; the other kinds are informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKind {
    Blocks,
    Related,
    ParentChild,
    DiscoveredFrom,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::Blocks,
        DependencyKind::Related,
        DependencyKind::ParentChild,
        DependencyKind::DiscoveredFrom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::Blocks => "blocks",
            DependencyKind::Related => "related",
            DependencyKind::ParentChild => "parent-child",
            DependencyKind::DiscoveredFrom => "discovered-from",
        }
    }

    pub fn affects_scheduling(self) -> bool {
        match self {
            DependencyKind::Blocks => true,
            DependencyKind::Related
            | DependencyKind::ParentChild
            | DependencyKind::DiscoveredFrom => false,
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyKind {
    type Err = ParseDependencyKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "blocks" | "blocked-by" => Ok(DependencyKind::Blocks),
            "related" | "relates-to" => Ok(DependencyKind::Related),
            "parent-child" | "parent-of" => Ok(DependencyKind::ParentChild),
            "discovered-from" => Ok(DependencyKind::DiscoveredFrom),
            _ => Err(ParseDependencyKindError {
                value: value.to_string(),
            }),
        }
    }
}

impl Serialize for DependencyKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DependencyKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DependencyKind::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid dependency type '{value}': expected one of {}", expected_kinds())]
pub struct ParseDependencyKindError {
    value: String,
}

fn expected_kinds() -> String {
    DependencyKind::ALL
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
