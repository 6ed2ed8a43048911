use crate::db::ItemRecord;
use crate::domain::issue_type::IssueType;
use crate::domain::status::ItemStatus;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemListFilter {
    pub include_closed: bool,
    pub status: Option<ItemStatus>,
    pub priority: Option<i64>,
    pub issue_type: Option<IssueType>,
    pub assignee: Option<String>,
    pub unassigned: bool,
    pub labels: Vec<String>,
    pub labels_any: Vec<String>,
    pub query: Option<String>,
    pub limit: Option<usize>,
}

/// Pre-filter over the ready/blocked candidate set. Applied before graph
/// evaluation, so it never hides an item's blockers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadyFilter {
    pub priority: Option<i64>,
    pub issue_type: Option<IssueType>,
    pub assignee: Option<String>,
    pub unassigned: bool,
    pub labels: Vec<String>,
    pub labels_any: Vec<String>,
    pub limit: Option<usize>,
}

impl ReadyFilter {
    pub fn matches(&self, item: &ItemRecord) -> bool {
        matches_filter(item, &NormalizedFilter::from(self))
    }
}

pub fn apply_filters(items: Vec<ItemRecord>, filter: &ItemListFilter) -> Vec<ItemRecord> {
    let normalized = NormalizedFilter::from(filter);
    let limit = filter.limit.unwrap_or(usize::MAX);

    items
        .into_iter()
        .filter(|item| matches_filter(item, &normalized))
        .take(limit)
        .collect()
}

#[derive(Debug, Clone, Default)]
struct NormalizedFilter {
    include_closed: bool,
    status: Option<ItemStatus>,
    priority: Option<i64>,
    issue_type: Option<IssueType>,
    assignee: Option<String>,
    unassigned: bool,
    labels: Vec<String>,
    labels_any: Vec<String>,
    query: Option<String>,
}

impl From<&ItemListFilter> for NormalizedFilter {
    fn from(value: &ItemListFilter) -> Self {
        Self {
            include_closed: value.include_closed,
            status: value.status,
            priority: value.priority,
            issue_type: value.issue_type,
            assignee: normalize_scalar(value.assignee.as_deref()),
            unassigned: value.unassigned,
            labels: normalize_labels(&value.labels),
            labels_any: normalize_labels(&value.labels_any),
            query: normalize_scalar(value.query.as_deref()),
        }
    }
}

impl From<&ReadyFilter> for NormalizedFilter {
    fn from(value: &ReadyFilter) -> Self {
        Self {
            include_closed: true,
            status: None,
            priority: value.priority,
            issue_type: value.issue_type,
            assignee: normalize_scalar(value.assignee.as_deref()),
            unassigned: value.unassigned,
            labels: normalize_labels(&value.labels),
            labels_any: normalize_labels(&value.labels_any),
            query: None,
        }
    }
}

fn matches_filter(item: &ItemRecord, filter: &NormalizedFilter) -> bool {
    match filter.status {
        Some(expected) if item.status != expected => return false,
        None if !filter.include_closed && item.status.is_closed() => return false,
        _ => {}
    }

    if filter.priority.is_some_and(|expected| item.priority != expected) {
        return false;
    }

    if filter
        .issue_type
        .is_some_and(|expected| item.issue_type != expected)
    {
        return false;
    }

    if filter.unassigned && item.assignee.is_some() {
        return false;
    }

    if let Some(expected) = filter.assignee.as_deref() {
        let actual = item.assignee.as_deref().unwrap_or("").to_ascii_lowercase();
        if actual != expected {
            return false;
        }
    }

    if !filter
        .labels
        .iter()
        .all(|label| item.labels.iter().any(|existing| existing == label))
    {
        return false;
    }

    if !filter.labels_any.is_empty()
        && !filter
            .labels_any
            .iter()
            .any(|label| item.labels.iter().any(|existing| existing == label))
    {
        return false;
    }

    if let Some(query) = filter.query.as_deref() {
        return matches_query(item, query);
    }

    true
}

fn matches_query(item: &ItemRecord, query: &str) -> bool {
    let description = item
        .description
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();

    item.id.to_ascii_lowercase().contains(query)
        || item.title.to_ascii_lowercase().contains(query)
        || description.contains(query)
}

fn normalize_scalar(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_lowercase())
    }
}

/// Trimmed, lowercased, sorted and deduplicated; empty labels are dropped.
pub fn normalize_labels(raw: &[String]) -> Vec<String> {
    let mut labels = raw
        .iter()
        .filter_map(|label| normalize_scalar(Some(label)))
        .collect::<Vec<_>>();
    labels.sort();
    labels.dedup();
    labels
}
