mod sort;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::db::{DependencyRecord, ItemRecord};
use crate::listing::ReadyFilter;

pub use sort::{ParseSortPolicyError, SortPolicy};

/// Blocked item annotated with the open items blocking it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BlockedItem {
    #[serde(flatten)]
    pub item: ItemRecord,
    pub blocked_by: Vec<String>,
}

/// In-memory view of the `blocks` edges between non-closed items. Built on
/// demand from the store and never persisted.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    items: BTreeMap<String, ItemRecord>,
    blockers: BTreeMap<String, BTreeSet<String>>,
    dependents: BTreeMap<String, BTreeSet<String>>,
    cyclic: BTreeSet<String>,
    cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn build(items: Vec<ItemRecord>, edges: &[DependencyRecord]) -> Self {
        let items = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect::<BTreeMap<_, _>>();
        let mut blockers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for edge in edges.iter().filter(|edge| edge.kind.affects_scheduling()) {
            let (Some(from), Some(to)) = (items.get(&edge.from), items.get(&edge.to)) else {
                tracing::warn!(from = %edge.from, to = %edge.to, "ignoring edge to unknown item");
                continue;
            };
            if from.status.is_closed() || to.status.is_closed() {
                continue;
            }
            blockers
                .entry(edge.to.clone())
                .or_default()
                .insert(edge.from.clone());
            dependents
                .entry(edge.from.clone())
                .or_default()
                .insert(edge.to.clone());
        }

        let cycles = find_cycles(&dependents);
        let cyclic = cycles.iter().flatten().cloned().collect::<BTreeSet<_>>();
        if !cycles.is_empty() {
            tracing::debug!(
                groups = cycles.len(),
                items = cyclic.len(),
                "dependency cycles detected"
            );
        }

        Self {
            items,
            blockers,
            dependents,
            cyclic,
            cycles,
        }
    }

    /// Open blockers of `id`, sorted.
    pub fn blockers_of(&self, id: &str) -> Vec<String> {
        self.blockers
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_cyclic(&self, id: &str) -> bool {
        self.cyclic.contains(id)
    }

    /// Each group is one strongly connected set of items, sorted by id.
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    fn is_candidate(&self, item: &ItemRecord) -> bool {
        item.status.is_schedulable() && !self.cyclic.contains(&item.id)
    }

    fn has_open_blockers(&self, id: &str) -> bool {
        self.blockers.get(id).is_some_and(|set| !set.is_empty())
    }

    pub fn is_ready(&self, id: &str) -> bool {
        self.items
            .get(id)
            .is_some_and(|item| self.is_candidate(item) && !self.has_open_blockers(id))
    }

    pub fn ready(&self, filter: &ReadyFilter, policy: SortPolicy) -> Vec<ItemRecord> {
        let mut ready = self
            .items
            .values()
            .filter(|item| self.is_candidate(item) && !self.has_open_blockers(&item.id))
            .filter(|item| filter.matches(item))
            .cloned()
            .collect::<Vec<_>>();
        policy.sort(&mut ready);
        if let Some(limit) = filter.limit {
            ready.truncate(limit);
        }
        ready
    }

    pub fn blocked(&self, filter: &ReadyFilter) -> Vec<BlockedItem> {
        let mut blocked = self
            .items
            .values()
            .filter(|item| self.is_candidate(item) && self.has_open_blockers(&item.id))
            .filter(|item| filter.matches(item))
            .cloned()
            .collect::<Vec<_>>();
        SortPolicy::Hybrid.sort(&mut blocked);
        if let Some(limit) = filter.limit {
            blocked.truncate(limit);
        }
        blocked
            .into_iter()
            .map(|item| {
                let blocked_by = self.blockers_of(&item.id);
                BlockedItem { item, blocked_by }
            })
            .collect()
    }

    /// Items whose only open blocker is `id`, i.e. the ones that become
    /// ready once `id` closes. Evaluated against the graph before the close.
    pub fn unblocked_by_closure(&self, id: &str) -> Vec<String> {
        let Some(dependents) = self.dependents.get(id) else {
            return Vec::new();
        };
        dependents
            .iter()
            .filter(|dependent| {
                self.items
                    .get(dependent.as_str())
                    .is_some_and(|item| item.status.is_schedulable())
            })
            .filter(|dependent| {
                self.blockers
                    .get(dependent.as_str())
                    .is_some_and(|set| set.len() == 1 && set.contains(id))
            })
            .cloned()
            .collect()
    }

    /// Non-closed items in an order where every blocker precedes the items it
    /// blocks. Cyclic items and everything downstream of them are left out.
    pub fn topological_order(&self, policy: SortPolicy) -> Vec<ItemRecord> {
        let mut remaining = self
            .items
            .values()
            .filter(|item| !item.status.is_closed())
            .map(|item| {
                let degree = self.blockers.get(&item.id).map_or(0, BTreeSet::len);
                (item.id.as_str(), degree)
            })
            .collect::<HashMap<_, _>>();

        let mut frontier = remaining
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .filter_map(|(id, _)| self.items.get(*id).cloned())
            .collect::<Vec<_>>();
        let mut order = Vec::with_capacity(remaining.len());

        while !frontier.is_empty() {
            policy.sort(&mut frontier);
            let next = frontier.remove(0);
            remaining.remove(next.id.as_str());
            if let Some(dependents) = self.dependents.get(&next.id) {
                for dependent in dependents {
                    if let Some(degree) = remaining.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            if let Some(item) = self.items.get(dependent) {
                                frontier.push(item.clone());
                            }
                        }
                    }
                }
            }
            order.push(next);
        }
        order
    }

    pub fn ready_count(&self) -> usize {
        self.ready(&ReadyFilter::default(), SortPolicy::Hybrid).len()
    }

    pub fn blocked_count(&self) -> usize {
        self.items
            .values()
            .filter(|item| self.is_candidate(item) && self.has_open_blockers(&item.id))
            .count()
    }

    pub fn cyclic_count(&self) -> usize {
        self.cyclic.len()
    }
}

fn neighbors_of<'g>(edges: &'g BTreeMap<String, BTreeSet<String>>, node: &str) -> Vec<&'g str> {
    edges
        .get(node)
        .map(|set| set.iter().map(String::as_str).collect())
        .unwrap_or_default()
}

struct Frame<'g> {
    node: &'g str,
    neighbors: Vec<&'g str>,
    pos: usize,
}

/// Depth-first traversal with an explicit stack, tracking which nodes are
/// still being visited. A node reached again while on the stack closes a
/// cycle; lowlinks group every item of the same strongly connected set.
fn find_cycles(edges: &BTreeMap<String, BTreeSet<String>>) -> Vec<Vec<String>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut lowlink: HashMap<&str, usize> = HashMap::new();
    let mut visiting: HashSet<&str> = HashSet::new();
    let mut path: Vec<&str> = Vec::new();
    let mut next_index = 0usize;
    let mut groups = Vec::new();

    for root in edges.keys().map(String::as_str) {
        if index.contains_key(root) {
            continue;
        }

        index.insert(root, next_index);
        lowlink.insert(root, next_index);
        next_index += 1;
        visiting.insert(root);
        path.push(root);
        let mut stack = vec![Frame {
            node: root,
            neighbors: neighbors_of(edges, root),
            pos: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            if let Some(&next) = frame.neighbors.get(frame.pos) {
                frame.pos += 1;
                match index.get(next).copied() {
                    None => {
                        index.insert(next, next_index);
                        lowlink.insert(next, next_index);
                        next_index += 1;
                        visiting.insert(next);
                        path.push(next);
                        stack.push(Frame {
                            node: next,
                            neighbors: neighbors_of(edges, next),
                            pos: 0,
                        });
                    }
                    Some(next_idx) if visiting.contains(next) => {
                        let low = lowlink.entry(node).or_insert(next_idx);
                        *low = (*low).min(next_idx);
                    }
                    Some(_) => {}
                }
                continue;
            }

            stack.pop();
            let node_low = lowlink.get(node).copied().unwrap_or(usize::MAX);
            if let Some(parent) = stack.last() {
                let parent_low = lowlink.entry(parent.node).or_insert(node_low);
                *parent_low = (*parent_low).min(node_low);
            }

            if index.get(node).copied() == Some(node_low) {
                let mut group = Vec::new();
                while let Some(member) = path.pop() {
                    visiting.remove(member);
                    group.push(member.to_string());
                    if member == node {
                        break;
                    }
                }
                let self_loop = edges.get(node).is_some_and(|set| set.contains(node));
                if group.len() > 1 || self_loop {
                    group.sort();
                    groups.push(group);
                }
            }
        }
    }

    groups.sort();
    groups
}
