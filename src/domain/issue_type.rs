use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IssueType {
    #[default]
    Task,
    Bug,
    Feature,
    Epic,
    Chore,
}

impl IssueType {
    pub const ALL: [IssueType; 5] = [
        IssueType::Task,
        IssueType::Bug,
        IssueType::Feature,
        IssueType::Epic,
        IssueType::Chore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::Task => "task",
            IssueType::Bug => "bug",
            IssueType::Feature => "feature",
            IssueType::Epic => "epic",
            IssueType::Chore => "chore",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = ParseIssueTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "task" | "work" | "" => Ok(IssueType::Task),
            "bug" => Ok(IssueType::Bug),
            "feature" => Ok(IssueType::Feature),
            "epic" => Ok(IssueType::Epic),
            "chore" => Ok(IssueType::Chore),
            _ => Err(ParseIssueTypeError {
                value: value.to_string(),
            }),
        }
    }
}

impl Serialize for IssueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IssueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        IssueType::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid issue type '{value}': expected one of {}", expected_types())]
pub struct ParseIssueTypeError {
    value: String,
}

fn expected_types() -> String {
    IssueType::ALL
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::IssueType;
    use std::str::FromStr;

    #[test]
    fn empty_and_legacy_work_map_to_task() {
        assert_eq!(IssueType::from_str("").unwrap(), IssueType::Task);
        assert_eq!(IssueType::from_str("work").unwrap(), IssueType::Task);
    }

    #[test]
    fn invalid_value_returns_error() {
        let err = IssueType::from_str("story").expect_err("unknown type should fail");
        assert!(err.to_string().contains("invalid issue type 'story'"));
        assert!(err.to_string().contains("epic"));
    }
}
