//! Descendant and ancestor computation.
//!
//! # Responsibility
//! - Build a per-operation snapshot of live items: an id-indexed arena plus a
//!   parent-to-ordered-children multimap, so one operation scans the table once.
//! - Compute bounded and unbounded descendant sets.
//! - Answer ancestor membership by walking parent pointers upward.
//!
//! # Invariants
//! - Every walk is capped by `TreeConfig::max_traversal_depth`, so malformed
//!   data containing a parent cycle terminates.
//! - Snapshots are never kept between operations.

use crate::model::id::ItemId;
use crate::model::item::Item;
use crate::repo::tag_repo::TagRepository;
use crate::repo::tree_repo::TreeRepository;
use crate::service::tree_service::{EntityKind, TreeService, TreeServiceResult};
use log::warn;
use std::collections::{HashMap, HashSet};

/// Outcome of a parent-chain walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ancestry {
    /// The ancestor is on the chain.
    Found,
    /// The chain ended at a root, an orphan, or a soft-deleted row.
    RootReached,
    /// The ceiling or a stored cycle stopped the walk before an answer.
    Truncated,
}

/// Snapshot of live items keyed by id with ordered child lists.
#[derive(Debug, Default)]
pub struct TreeIndex {
    items: HashMap<ItemId, Item>,
    children: HashMap<Option<ItemId>, Vec<ItemId>>,
}

impl TreeIndex {
    /// Builds the index; children are ordered by `sort_order`, then id.
    pub fn from_items(items: Vec<Item>) -> Self {
        let mut index = Self::default();
        for item in items.into_iter().filter(Item::is_live) {
            index
                .children
                .entry(item.parent_id.clone())
                .or_default()
                .push(item.id.clone());
            index.items.insert(item.id.clone(), item);
        }

        let items = &index.items;
        for siblings in index.children.values_mut() {
            siblings.sort_by(|left, right| {
                let left_order = items.get(left).map_or(0, |item| item.sort_order);
                let right_order = items.get(right).map_or(0, |item| item.sort_order);
                left_order.cmp(&right_order).then_with(|| left.cmp(right))
            });
        }
        index
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Live children of `parent_id` in display order.
    pub fn children(&self, parent_id: Option<&ItemId>) -> &[ItemId] {
        self.children
            .get(&parent_id.cloned())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Breadth-first descendants of `root`, excluding `root`.
    ///
    /// `max_depth = Some(1)` yields direct children only; `None` is unbounded
    /// up to `ceiling` levels.
    pub fn descendants(
        &self,
        root: &ItemId,
        max_depth: Option<usize>,
        ceiling: usize,
    ) -> Vec<ItemId> {
        let limit = max_depth.map_or(ceiling, |depth| depth.min(ceiling));
        let mut visited: HashSet<&ItemId> = HashSet::from([root]);
        let mut frontier: Vec<&ItemId> = vec![root];
        let mut result = Vec::new();
        let mut depth = 0;

        while !frontier.is_empty() && depth < limit {
            depth += 1;
            let mut next = Vec::new();
            for node in frontier {
                for child in self.children(Some(node)) {
                    if visited.insert(child) {
                        result.push(child.clone());
                        next.push(child);
                    }
                }
            }
            frontier = next;
        }

        if depth == ceiling && !frontier.is_empty() && max_depth.map_or(true, |d| d > ceiling) {
            warn!(
                "event=tree_descendants module=tree status=truncated root_id={} ceiling={}",
                root, ceiling
            );
        }
        result
    }
}

impl<R: TreeRepository + TagRepository> TreeService<R> {
    /// Returns live descendants of `root` down to `max_depth` levels.
    pub fn descendants(
        &self,
        root: &ItemId,
        max_depth: Option<usize>,
    ) -> TreeServiceResult<Vec<ItemId>> {
        self.require_live(root, EntityKind::Item)?;
        let index = self.load_tree_index()?;
        Ok(index.descendants(root, max_depth, self.config.max_traversal_depth))
    }

    /// Returns whether `ancestor` appears on `candidate`'s parent chain.
    ///
    /// An item is not its own descendant. Chains ending at an orphaned or
    /// soft-deleted row answer `false`, as do chains cut off by the ceiling.
    pub fn is_descendant_of(
        &self,
        candidate: &ItemId,
        ancestor: &ItemId,
    ) -> TreeServiceResult<bool> {
        self.require_live(candidate, EntityKind::Item)?;
        self.require_live(ancestor, EntityKind::Item)?;
        Ok(self.walk_ancestry(candidate, ancestor)? == Ancestry::Found)
    }

    /// Parent-chain walk without existence checks on the endpoints.
    pub(crate) fn walk_ancestry(
        &self,
        candidate: &ItemId,
        ancestor: &ItemId,
    ) -> TreeServiceResult<Ancestry> {
        let ceiling = self.config.max_traversal_depth;
        let mut visited = HashSet::new();
        let mut cursor = self.repo.parent_of(candidate)?.flatten();
        let mut steps = 0;

        while let Some(current) = cursor {
            if &current == ancestor {
                return Ok(Ancestry::Found);
            }
            steps += 1;
            if steps > ceiling || !visited.insert(current.clone()) {
                warn!(
                    "event=tree_ancestry module=tree status=truncated item_id={} steps={}",
                    candidate, steps
                );
                return Ok(Ancestry::Truncated);
            }
            cursor = self.repo.parent_of(&current)?.flatten();
        }
        Ok(Ancestry::RootReached)
    }

    pub(crate) fn load_tree_index(&self) -> TreeServiceResult<TreeIndex> {
        Ok(TreeIndex::from_items(self.repo.list_live_items()?))
    }
}

#[cfg(test)]
mod tests {
    use super::TreeIndex;
    use crate::model::id::ItemId;
    use crate::model::item::{Item, ItemKind};
    use std::collections::HashSet;

    fn node(id: &str, parent: Option<&str>, order: i64) -> Item {
        let mut item = Item::new(parent.map(ItemId::from), id, ItemKind::Folder);
        item.id = ItemId::from(id);
        item.sort_order = order;
        item
    }

    fn ids(values: &[&str]) -> HashSet<ItemId> {
        values.iter().map(|value| ItemId::from(*value)).collect()
    }

    #[test]
    fn children_are_ordered_by_sort_order_then_id() {
        let index = TreeIndex::from_items(vec![
            node("r", None, 0),
            node("c", Some("r"), 1),
            node("b", Some("r"), 1),
            node("a", Some("r"), 5),
        ]);
        let order: Vec<&str> = index
            .children(Some(&ItemId::from("r")))
            .iter()
            .map(ItemId::as_str)
            .collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn bounded_descendants_stop_at_depth() {
        let index = TreeIndex::from_items(vec![
            node("r", None, 0),
            node("a", Some("r"), 0),
            node("b", Some("a"), 0),
            node("c", Some("b"), 0),
        ]);
        let root = ItemId::from("r");
        let two: HashSet<ItemId> = index.descendants(&root, Some(2), 100).into_iter().collect();
        let all: HashSet<ItemId> = index.descendants(&root, None, 100).into_iter().collect();
        assert_eq!(two, ids(&["a", "b"]));
        assert_eq!(all, ids(&["a", "b", "c"]));
        assert!(all.is_superset(&two));
    }

    #[test]
    fn cycles_in_malformed_data_terminate() {
        let index = TreeIndex::from_items(vec![node("a", Some("b"), 0), node("b", Some("a"), 0)]);
        let found: HashSet<ItemId> = index
            .descendants(&ItemId::from("a"), None, 100)
            .into_iter()
            .collect();
        assert_eq!(found, ids(&["b"]));
    }

    #[test]
    fn ceiling_caps_unbounded_walks() {
        let mut items = vec![node("n0", None, 0)];
        for level in 1..10 {
            let parent = format!("n{}", level - 1);
            let id = format!("n{level}");
            items.push(node(&id, Some(parent.as_str()), 0));
        }
        let index = TreeIndex::from_items(items);
        assert_eq!(index.descendants(&ItemId::from("n0"), None, 3).len(), 3);
        assert_eq!(index.descendants(&ItemId::from("n0"), Some(50), 3).len(), 3);
    }

    #[test]
    fn soft_deleted_rows_are_not_indexed() {
        let mut gone = node("gone", Some("r"), 0);
        gone.deleted_at = Some(1);
        let index = TreeIndex::from_items(vec![node("r", None, 0), gone]);
        assert!(index.children(Some(&ItemId::from("r"))).is_empty());
        assert_eq!(index.len(), 1);
    }
}
