use serde::{Deserialize, Serialize};

use crate::db::{DependencyRecord, ItemRecord};
use crate::domain::dependency::DependencyKind;
use crate::domain::issue_type::IssueType;
use crate::domain::review::ReviewStatus;
use crate::domain::status::ItemStatus;

/// One line of the shared log: the full current state of a work item plus
/// the edges it owns (edges pointing at it). Reviews, sessions and audit
/// events never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub issue_type: IssueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<LogDependency>,
    #[serde(default)]
    pub review_status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogDependency {
    pub depends_on: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
}

fn default_priority() -> i64 {
    2
}

impl LogRecord {
    /// `owned_edges` are the edges whose `to` is this item.
    pub fn from_item(item: ItemRecord, owned_edges: &[DependencyRecord]) -> Self {
        let mut dependencies = owned_edges
            .iter()
            .filter(|edge| edge.to == item.id)
            .map(|edge| LogDependency {
                depends_on: edge.from.clone(),
                kind: edge.kind,
            })
            .collect::<Vec<_>>();
        dependencies.sort();
        dependencies.dedup();

        Self {
            id: item.id,
            title: item.title,
            description: item.description,
            status: item.status,
            priority: item.priority,
            issue_type: item.issue_type,
            assignee: item.assignee,
            labels: item.labels,
            dependencies,
            review_status: item.review_status,
            reviewed_by: item.reviewed_by,
            reviewed_at: item.reviewed_at,
            close_reason: item.close_reason,
            created_at: item.created_at,
            updated_at: item.updated_at,
            closed_at: item.closed_at,
        }
    }

    pub fn into_parts(self) -> (ItemRecord, Vec<DependencyRecord>) {
        let edges = self
            .dependencies
            .into_iter()
            .map(|dep| DependencyRecord {
                from: dep.depends_on,
                to: self.id.clone(),
                kind: dep.kind,
            })
            .collect();
        let item = ItemRecord {
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            issue_type: self.issue_type,
            assignee: self.assignee,
            labels: self.labels,
            review_status: self.review_status,
            reviewed_by: self.reviewed_by,
            reviewed_at: self.reviewed_at,
            close_reason: self.close_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
        };
        (item, edges)
    }
}
