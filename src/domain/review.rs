use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Summary review state carried on a work item and exported with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReviewStatus {
    #[default]
    Unreviewed,
    Approved,
    NeedsRevision,
    Deferred,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Unreviewed => "unreviewed",
            ReviewStatus::Approved => "approved",
            ReviewStatus::NeedsRevision => "needs_revision",
            ReviewStatus::Deferred => "deferred",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = ParseReviewValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "unreviewed" => Ok(ReviewStatus::Unreviewed),
            other => ReviewOutcome::from_str(other)
                .map(ReviewStatus::from)
                .map_err(|_| ParseReviewValueError {
                    field: "review status",
                    value: value.to_string(),
                }),
        }
    }
}

impl From<ReviewOutcome> for ReviewStatus {
    fn from(value: ReviewOutcome) -> Self {
        match value {
            ReviewOutcome::Approved => ReviewStatus::Approved,
            ReviewOutcome::NeedsRevision => ReviewStatus::NeedsRevision,
            ReviewOutcome::Deferred => ReviewStatus::Deferred,
        }
    }
}

/// Result of one review pass. There is no terminal outcome: a later review
/// may move an item to any other outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewOutcome {
    Approved,
    NeedsRevision,
    Deferred,
}

impl ReviewOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewOutcome::Approved => "approved",
            ReviewOutcome::NeedsRevision => "needs_revision",
            ReviewOutcome::Deferred => "deferred",
        }
    }

    /// Maps the three mutually exclusive CLI flags onto one outcome.
    pub fn from_flags(
        approve: bool,
        revise: bool,
        defer: bool,
    ) -> Result<Self, ReviewValidationError> {
        let selected = [
            (approve, ReviewOutcome::Approved),
            (revise, ReviewOutcome::NeedsRevision),
            (defer, ReviewOutcome::Deferred),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .map(|(_, outcome)| outcome)
        .collect::<Vec<_>>();

        match selected.as_slice() {
            [] => Err(ReviewValidationError::MissingOutcome),
            [outcome] => Ok(*outcome),
            _ => Err(ReviewValidationError::MultipleOutcomes),
        }
    }
}

impl fmt::Display for ReviewOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewOutcome {
    type Err = ParseReviewValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "approved" | "approve" => Ok(ReviewOutcome::Approved),
            "needs_revision" | "revise" => Ok(ReviewOutcome::NeedsRevision),
            "deferred" | "defer" => Ok(ReviewOutcome::Deferred),
            _ => Err(ParseReviewValueError {
                field: "review outcome",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReviewType {
    #[default]
    Plan,
    Implementation,
    Security,
    Custom,
}

impl ReviewType {
    pub const ALL: [ReviewType; 4] = [
        ReviewType::Plan,
        ReviewType::Implementation,
        ReviewType::Security,
        ReviewType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewType::Plan => "plan",
            ReviewType::Implementation => "implementation",
            ReviewType::Security => "security",
            ReviewType::Custom => "custom",
        }
    }
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewType {
    type Err = ReviewValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ReviewType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim().to_ascii_lowercase())
            .ok_or_else(|| ReviewValidationError::UnknownType(value.to_string()))
    }
}

macro_rules! serde_as_str {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                <$ty>::from_str(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_as_str!(ReviewStatus);
serde_as_str!(ReviewOutcome);
serde_as_str!(ReviewType);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field} '{value}'")]
pub struct ParseReviewValueError {
    field: &'static str,
    value: String,
}

/// Caller errors rejected before any store transaction begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewValidationError {
    #[error("must specify one of --approve, --revise, or --defer")]
    MissingOutcome,
    #[error("can only specify one of --approve, --revise, or --defer")]
    MultipleOutcomes,
    #[error("--reviewer is required")]
    MissingReviewer,
    #[error("invalid review type '{0}' (valid: plan, implementation, security, custom)")]
    UnknownType(String),
}

#[cfg(test)]
mod tests {
    use super::{ReviewOutcome, ReviewStatus, ReviewType, ReviewValidationError};
    use std::str::FromStr;

    #[test]
    fn exactly_one_outcome_flag_is_required() {
        assert_eq!(
            ReviewOutcome::from_flags(false, false, false),
            Err(ReviewValidationError::MissingOutcome)
        );
        assert_eq!(
            ReviewOutcome::from_flags(true, true, false),
            Err(ReviewValidationError::MultipleOutcomes)
        );
        assert_eq!(
            ReviewOutcome::from_flags(true, true, true),
            Err(ReviewValidationError::MultipleOutcomes)
        );
        assert_eq!(
            ReviewOutcome::from_flags(false, true, false),
            Ok(ReviewOutcome::NeedsRevision)
        );
    }

    #[test]
    fn review_status_accepts_legacy_empty_value() {
        assert_eq!(
            ReviewStatus::from_str("").unwrap(),
            ReviewStatus::Unreviewed
        );
        assert_eq!(
            ReviewStatus::from_str("needs_revision").unwrap(),
            ReviewStatus::NeedsRevision
        );
        assert!(ReviewStatus::from_str("rejected").is_err());
    }

    #[test]
    fn unknown_review_type_is_a_validation_error() {
        assert_eq!(ReviewType::from_str("Security").unwrap(), ReviewType::Security);
        let err = ReviewType::from_str("style").expect_err("unknown type should fail");
        assert_eq!(err, ReviewValidationError::UnknownType("style".to_string()));
    }
}
